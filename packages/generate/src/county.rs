//! County crash tallies and per-county crash extracts.
//!
//! Written from the full crash table, matched or not.

use std::collections::BTreeMap;
use std::path::Path;

use road_safety_analytics::county::{
    crashes_by_county, crashes_per_county, crashes_per_county_by_year,
};
use road_safety_segment_models::crash::CrashEvent;

use crate::{ExportError, ensure_dir, sanitize_file_name, write_csv};

/// Overall crashes-per-county table.
pub const COUNTY_TOTALS: &str = "crashes-per-county.csv";

/// Directory of per-county crash extracts.
pub const COUNTY_EXTRACTS_DIR: &str = "crashes-by-county";

fn county_file_name(county: &str) -> String {
    format!("{}.csv", sanitize_file_name(county).replace(' ', "_"))
}

fn write_extracts(dir: &Path, groups: &BTreeMap<&str, Vec<&CrashEvent>>) -> Result<(), ExportError> {
    ensure_dir(dir)?;
    for (county, crashes) in groups {
        let rows = crashes.iter().map(|c| &c.record);
        write_csv(&dir.join(county_file_name(county)), rows)?;
    }
    Ok(())
}

/// Counts written by [`write_county_tables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountyReport {
    pub counties: usize,
    pub years: usize,
}

/// Writes the county tallies, overall and per crash year, and the crash
/// rows of each county.
///
/// # Errors
///
/// Returns [`ExportError`] if any file cannot be written.
pub fn write_county_tables(
    out_dir: &Path,
    crashes: &[CrashEvent],
) -> Result<CountyReport, ExportError> {
    ensure_dir(out_dir)?;

    let totals = crashes_per_county(crashes);
    write_csv(&out_dir.join(COUNTY_TOTALS), &totals)?;

    let by_year = crashes_per_county_by_year(crashes);
    for year in &by_year {
        let name = format!("crashes-per-county-{}.csv", sanitize_file_name(&year.year));
        write_csv(&out_dir.join(name), &year.counties)?;
    }

    let groups = crashes_by_county(crashes);
    write_extracts(&out_dir.join(COUNTY_EXTRACTS_DIR), &groups)?;

    let mut yearly: BTreeMap<&str, BTreeMap<&str, Vec<&CrashEvent>>> = BTreeMap::new();
    for (county, rows) in &groups {
        for crash in rows {
            if let Some(year) = crash.year() {
                yearly
                    .entry(year)
                    .or_default()
                    .entry(*county)
                    .or_default()
                    .push(*crash);
            }
        }
    }
    for (year, groups) in &yearly {
        let dir = out_dir.join(format!(
            "{COUNTY_EXTRACTS_DIR}-{}",
            sanitize_file_name(year)
        ));
        write_extracts(&dir, groups)?;
    }

    log::info!(
        "Wrote crash tallies for {} counties over {} crash years",
        totals.len(),
        by_year.len()
    );

    Ok(CountyReport {
        counties: totals.len(),
        years: by_year.len(),
    })
}

#[cfg(test)]
mod tests {
    use road_safety_segment_models::crash::CrashRecord;

    use crate::test_support::scratch_dir;

    use super::*;

    fn crash(county: &str, year: &str) -> CrashEvent {
        CrashEvent::from_record(CrashRecord {
            corridor: Some("C1".to_string()),
            county: Some(county.to_string()),
            crash_year: Some(year.to_string()),
            ..CrashRecord::default()
        })
    }

    #[test]
    fn county_names_become_safe_file_names() {
        assert_eq!(county_file_name("LEWIS AND CLARK"), "LEWIS_AND_CLARK.csv");
        assert_eq!(county_file_name("A/B"), "A_B.csv");
    }

    #[test]
    fn writes_tallies_and_extracts() {
        let dir = scratch_dir("county");
        let crashes = vec![
            crash("LEWIS AND CLARK", "2020"),
            crash("", "2020"),
            crash("LEWIS AND CLARK", "2021"),
            crash("HILL", ""),
        ];

        let report = write_county_tables(&dir, &crashes).unwrap();
        assert_eq!(report, CountyReport { counties: 3, years: 2 });

        let totals = std::fs::read_to_string(dir.join(COUNTY_TOTALS)).unwrap();
        let lines: Vec<&str> = totals.lines().collect();
        assert_eq!(lines[0], "COUNTY,CRASH_COUNT");
        assert_eq!(lines[1], "LEWIS AND CLARK,2");

        assert!(dir.join("crashes-per-county-2021.csv").exists());
        assert!(dir.join(COUNTY_EXTRACTS_DIR).join("UNKNOWN.csv").exists());
        assert!(dir.join(COUNTY_EXTRACTS_DIR).join("HILL.csv").exists());
        assert!(dir.join("crashes-by-county-2020").join("UNKNOWN.csv").exists());
        assert!(!dir.join("crashes-by-county-2021").join("HILL.csv").exists());

        let extract = std::fs::read_to_string(
            dir.join(COUNTY_EXTRACTS_DIR).join("LEWIS_AND_CLARK.csv"),
        )
        .unwrap();
        assert_eq!(extract.lines().count(), 3);
        assert!(extract.starts_with("CORRIDOR,DIR,REF_POINT"));
    }
}

//! Crash counts by county, over the whole crash table.
//!
//! These tallies do not depend on segment matching: every crash row is
//! counted, with a blank county reported as `UNKNOWN`.

use std::collections::BTreeMap;

use road_safety_analytics_models::{CountyCrashCount, YearCountyCrashCounts};
use road_safety_segment_models::crash::CrashEvent;

fn sorted_counts(counts: BTreeMap<&str, u64>) -> Vec<CountyCrashCount> {
    let mut counts: Vec<CountyCrashCount> = counts
        .into_iter()
        .map(|(county, crashes)| CountyCrashCount {
            county: county.to_string(),
            crashes,
        })
        .collect();
    counts.sort_by(|a, b| b.crashes.cmp(&a.crashes));
    counts
}

/// Crashes per county, most crashes first. Ties are ordered by county
/// name.
#[must_use]
pub fn crashes_per_county(crashes: &[CrashEvent]) -> Vec<CountyCrashCount> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for crash in crashes {
        *counts.entry(crash.county_or_unknown()).or_default() += 1;
    }
    sorted_counts(counts)
}

/// Crashes per county for each crash year, years ascending. Crashes with
/// a blank year are left out.
#[must_use]
pub fn crashes_per_county_by_year(crashes: &[CrashEvent]) -> Vec<YearCountyCrashCounts> {
    let mut years: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
    for crash in crashes {
        if let Some(year) = crash.year() {
            *years
                .entry(year)
                .or_default()
                .entry(crash.county_or_unknown())
                .or_default() += 1;
        }
    }

    years
        .into_iter()
        .map(|(year, counts)| YearCountyCrashCounts {
            year: year.to_string(),
            counties: sorted_counts(counts),
        })
        .collect()
}

/// Crash rows grouped by county, in table order within each county.
#[must_use]
pub fn crashes_by_county(crashes: &[CrashEvent]) -> BTreeMap<&str, Vec<&CrashEvent>> {
    let mut groups: BTreeMap<&str, Vec<&CrashEvent>> = BTreeMap::new();
    for crash in crashes {
        groups.entry(crash.county_or_unknown()).or_default().push(crash);
    }
    groups
}

#[cfg(test)]
mod tests {
    use road_safety_segment_models::crash::CrashRecord;

    use super::*;

    fn crash(county: &str, year: &str) -> CrashEvent {
        CrashEvent::from_record(CrashRecord {
            county: Some(county.to_string()),
            crash_year: Some(year.to_string()),
            ..CrashRecord::default()
        })
    }

    #[test]
    fn counts_descending_with_unknown_for_blank() {
        let crashes = vec![
            crash("LEWIS", "2020"),
            crash("", "2020"),
            crash("HILL", "2021"),
            crash("LEWIS", "2021"),
            crash("  ", "2022"),
            crash("LEWIS", ""),
        ];

        let counts = crashes_per_county(&crashes);
        assert_eq!(
            counts,
            vec![
                CountyCrashCount {
                    county: "LEWIS".to_string(),
                    crashes: 3
                },
                CountyCrashCount {
                    county: "UNKNOWN".to_string(),
                    crashes: 2
                },
                CountyCrashCount {
                    county: "HILL".to_string(),
                    crashes: 1
                },
            ]
        );

        let by_year = crashes_per_county_by_year(&crashes);
        let years: Vec<&str> = by_year.iter().map(|y| y.year.as_str()).collect();
        assert_eq!(years, vec!["2020", "2021", "2022"]);
        assert_eq!(by_year[1].counties.len(), 2);
        assert_eq!(by_year[1].counties[0].county, "HILL");

        let total: u64 = counts.iter().map(|c| c.crashes).sum();
        assert_eq!(usize::try_from(total).unwrap(), crashes.len());
    }

    #[test]
    fn groups_rows_by_county() {
        let crashes = vec![crash("LEWIS", "2020"), crash("", "2021"), crash("LEWIS", "2022")];
        let groups = crashes_by_county(&crashes);
        assert_eq!(groups["LEWIS"].len(), 2);
        assert_eq!(groups["UNKNOWN"].len(), 1);
    }
}

//! Worst-segment ranking tables.

use std::path::Path;

use road_safety_analytics::{
    RankingConfig,
    ranking::{department_breakdown, eligible, rank},
};
use road_safety_analytics_models::{RankingMetric, SegmentSafetyRecord};

use crate::{ExportError, ensure_dir, sanitize_file_name, write_csv};

/// File name of a metric's ranking table.
#[must_use]
pub fn ranking_file(metric: RankingMetric) -> String {
    let direction = if metric.worst_is_lowest() {
        "lowest"
    } else {
        "highest"
    };
    format!("{direction}_{metric}.csv")
}

/// Directory holding per-department breakdowns for a metric, if the
/// metric has one.
#[must_use]
pub const fn breakdown_dir(metric: RankingMetric) -> Option<&'static str> {
    match metric {
        RankingMetric::CarsPerAccident => Some("by_car"),
        RankingMetric::MilesPerAccident => Some("by_mileage"),
        RankingMetric::Per100mVmt => None,
    }
}

/// Rows written per ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingReport {
    pub metric: RankingMetric,
    pub ranked: usize,
    pub departments: usize,
}

/// Writes one ranking table per metric, plus per-department breakdowns
/// for the cars and miles rankings.
///
/// # Errors
///
/// Returns [`ExportError`] if any table cannot be written.
pub fn write_rankings(
    out_dir: &Path,
    records: &[SegmentSafetyRecord],
    config: &RankingConfig,
) -> Result<Vec<RankingReport>, ExportError> {
    ensure_dir(out_dir)?;
    let eligible = eligible(records, config);

    let mut reports = Vec::new();
    for metric in [
        RankingMetric::CarsPerAccident,
        RankingMetric::MilesPerAccident,
        RankingMetric::Per100mVmt,
    ] {
        let ranked = rank(&eligible, metric, config);
        write_csv(&out_dir.join(ranking_file(metric)), &ranked)?;

        let mut departments = 0;
        if let Some(dir) = breakdown_dir(metric) {
            let dir = out_dir.join(dir);
            ensure_dir(&dir)?;
            for (department, rows) in department_breakdown(&ranked, &eligible) {
                let name = format!("{}.csv", sanitize_file_name(&department));
                write_csv(&dir.join(name), rows)?;
                departments += 1;
            }
        }

        log::info!(
            "Ranking {metric}: {} segments, {departments} department files",
            ranked.len()
        );
        reports.push(RankingReport {
            metric,
            ranked: ranked.len(),
            departments,
        });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use crate::read_merged_table;
    use crate::test_support::{record, scratch_dir};

    use super::*;

    #[test]
    fn names_tables_by_direction() {
        assert_eq!(
            ranking_file(RankingMetric::CarsPerAccident),
            "lowest_cars_per_accident.csv"
        );
        assert_eq!(
            ranking_file(RankingMetric::Per100mVmt),
            "highest_per_100m_vmt.csv"
        );
    }

    #[test]
    fn writes_rankings_and_department_breakdowns() {
        let dir = scratch_dir("rankings");
        let records = vec![
            record("C1", "N/1", 5, Some("US 2")),
            record("C2", "N/1", 0, Some("US 2")),
            record("C3", "N-2", 20, Some("I-90")),
            record("C4", "N-3", 50, None),
        ];

        let reports = write_rankings(&dir, &records, &RankingConfig::default()).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].ranked, 2);
        assert_eq!(reports[0].departments, 2);
        assert_eq!(reports[2].departments, 0);

        let lowest = read_merged_table(&dir.join("lowest_cars_per_accident.csv")).unwrap();
        let corridors: Vec<&str> = lowest.iter().map(|r| r.corridor.as_str()).collect();
        assert_eq!(corridors, vec!["C3", "C1"]);

        let department = read_merged_table(&dir.join("by_car").join("N_1.csv")).unwrap();
        assert_eq!(department.len(), 2);
        assert!(dir.join("by_mileage").join("N-2.csv").exists());
    }
}

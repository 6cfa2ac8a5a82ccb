//! Run summary written alongside the pipeline outputs.

use chrono::{DateTime, Utc};
use road_safety_analytics_models::SegmentSafetyRecord;
use road_safety_matcher::{MatchSummary, UnmatchedTally};
use road_safety_segment_models::MatchPolicy;
use serde::Serialize;

/// Totals describing one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub baseline_year: u16,
    /// Additional years that were requested for averaging.
    pub years_requested: Vec<u16>,
    /// Additional years whose tables were found and folded in.
    pub years_loaded: Vec<u16>,
    pub match_policy: MatchPolicy,
    pub segments: usize,
    /// Baseline rows rejected because their key was already taken.
    pub duplicate_segment_keys: usize,
    /// Segments excluded from matching for an unusable milepost range.
    pub segments_without_range: usize,
    pub segments_with_crashes: usize,
    pub segments_without_crashes: usize,
    /// Crash rows that were read and went through matching.
    pub total_crashes: usize,
    /// Crash rows that could not be read at all.
    pub unreadable_crash_rows: usize,
    pub matched_crashes: usize,
    pub unmatched_crashes: UnmatchedTally,
    pub routes_exported: usize,
    pub routes_failed: usize,
}

impl RunSummary {
    /// Summarizes segment and crash totals. Year, catalog, and export
    /// fields start empty and are filled in by the caller.
    #[must_use]
    pub fn new(
        baseline_year: u16,
        records: &[SegmentSafetyRecord],
        matches: &MatchSummary,
        match_policy: MatchPolicy,
    ) -> Self {
        let segments_with_crashes = records.iter().filter(|r| r.total_crashes > 0).count();

        Self {
            generated_at: Utc::now(),
            baseline_year,
            years_requested: Vec::new(),
            years_loaded: Vec::new(),
            match_policy,
            segments: records.len(),
            duplicate_segment_keys: 0,
            segments_without_range: 0,
            segments_with_crashes,
            segments_without_crashes: records.len() - segments_with_crashes,
            total_crashes: matches.total(),
            unreadable_crash_rows: 0,
            matched_crashes: matches.matched,
            unmatched_crashes: matches.unmatched,
            routes_exported: 0,
            routes_failed: 0,
        }
    }

    /// Every input crash row was read and is either matched or tallied
    /// as unmatched.
    #[must_use]
    pub const fn is_conserved(&self) -> bool {
        self.unreadable_crash_rows == 0
            && self.matched_crashes + self.unmatched_crashes.total() == self.total_crashes
    }
}

#[cfg(test)]
mod tests {
    use road_safety_matcher::CorridorIndex;
    use road_safety_segment_models::{
        Segment, SegmentRow,
        crash::{CrashEvent, CrashRecord},
    };

    use crate::aggregate::{MetricsConfig, aggregate};

    use super::*;

    #[test]
    fn summarizes_run_totals() {
        let segments = vec![Segment::from_row(
            &SegmentRow {
                corridor_id: Some("C1".to_string()),
                department_id: Some("D".to_string()),
                start_mp: Some("000+0.0".to_string()),
                end_mp: Some("001+0.0".to_string()),
                ..SegmentRow::default()
            },
            0,
        )];
        let crashes: Vec<CrashEvent> = ["000+0.5", "009+0.0", "x"]
            .into_iter()
            .map(|rp| {
                CrashEvent::from_record(CrashRecord {
                    corridor: Some("C1".to_string()),
                    ref_point: Some(rp.to_string()),
                    ..CrashRecord::default()
                })
            })
            .collect();

        let matches = CorridorIndex::build(&segments, MatchPolicy::CatalogOrder).match_all(&crashes);
        let records = aggregate(&segments, &crashes, &matches, &MetricsConfig::default());
        let summary = RunSummary::new(2023, &records, &matches, MatchPolicy::CatalogOrder);

        assert_eq!(summary.segments, 1);
        assert_eq!(summary.segments_with_crashes, 1);
        assert_eq!(summary.total_crashes, 3);
        assert_eq!(summary.matched_crashes, 1);
        assert_eq!(summary.unmatched_crashes.null_ref_point, 1);
        assert_eq!(summary.unmatched_crashes.no_containing_range, 1);
        assert!(summary.is_conserved());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["match_policy"], "catalog_order");
        assert_eq!(json["unmatched_crashes"]["unknown_corridor"], 0);
    }

    #[test]
    fn unreadable_crash_rows_break_conservation() {
        let matches = CorridorIndex::build(&[], MatchPolicy::CatalogOrder).match_all(&[]);
        let mut summary = RunSummary::new(2023, &[], &matches, MatchPolicy::CatalogOrder);
        assert!(summary.is_conserved());

        summary.unreadable_crash_rows = 1;
        assert!(!summary.is_conserved());
    }
}

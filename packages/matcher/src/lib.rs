#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Corridor index and crash matcher.
//!
//! Segments are grouped by corridor id and each corridor's ranges are kept
//! sorted by start milepost, so candidate ranges for a reference point are
//! found with a binary search. When several ranges contain the point, the
//! configured [`MatchPolicy`] decides: by default the range that came first
//! in the baseline table wins, exactly as a front-to-back scan of the table
//! would.
//!
//! Range containment is inclusive at both ends.

use std::collections::BTreeMap;

use road_safety_segment_models::{MatchPolicy, Segment, SegmentKey, crash::CrashEvent};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// A matchable `[start, end]` range on a corridor.
#[derive(Debug, Clone, PartialEq)]
struct IndexedRange {
    key: SegmentKey,
    start: f64,
    end: f64,
    row_order: usize,
}

impl IndexedRange {
    fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Why a crash could not be attributed to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnmatchedReason {
    /// The reference point was missing or unparsable.
    NullRefPoint,
    /// No segment in the catalog is on the crash's corridor.
    UnknownCorridor,
    /// The corridor is known but no range contains the reference point.
    NoContainingRange,
}

/// Read-only lookup from corridor id to its segment ranges.
#[derive(Debug, Clone)]
pub struct CorridorIndex {
    corridors: BTreeMap<String, Vec<IndexedRange>>,
    policy: MatchPolicy,
    excluded: usize,
}

impl CorridorIndex {
    /// Builds the index from catalog segments.
    ///
    /// Segments without a valid range (unparsable mileposts or
    /// `start > end`) contribute no range; they still appear in the output
    /// table, with zero crashes. Their corridor is still known, so a crash
    /// on a corridor whose every segment lacks a range is tallied as
    /// [`UnmatchedReason::NoContainingRange`], not `UnknownCorridor`.
    #[must_use]
    pub fn build(segments: &[Segment], policy: MatchPolicy) -> Self {
        let mut corridors: BTreeMap<String, Vec<IndexedRange>> = BTreeMap::new();
        let mut excluded = 0;

        for segment in segments {
            let ranges = corridors
                .entry(segment.key.corridor_id().to_string())
                .or_default();
            let Some((start, end)) = segment.range() else {
                excluded += 1;
                continue;
            };
            ranges.push(IndexedRange {
                key: segment.key.clone(),
                start,
                end,
                row_order: segment.row_order,
            });
        }

        for ranges in corridors.values_mut() {
            ranges.sort_by(|a, b| {
                a.start
                    .total_cmp(&b.start)
                    .then(a.row_order.cmp(&b.row_order))
            });
        }

        log::info!(
            "Indexed {} corridors ({} segments excluded for invalid ranges, policy={policy})",
            corridors.len(),
            excluded
        );

        Self {
            corridors,
            policy,
            excluded,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Number of distinct corridors in the index.
    #[must_use]
    pub fn corridor_count(&self) -> usize {
        self.corridors.len()
    }

    /// Number of segments left out because they had no valid range.
    #[must_use]
    pub const fn excluded(&self) -> usize {
        self.excluded
    }

    /// Resolves a normalized corridor id and reference point to a segment.
    ///
    /// # Errors
    ///
    /// Returns the [`UnmatchedReason`] when no segment can be chosen.
    pub fn resolve(
        &self,
        corridor_id: &str,
        ref_point: Option<f64>,
    ) -> Result<&SegmentKey, UnmatchedReason> {
        let point = ref_point.ok_or(UnmatchedReason::NullRefPoint)?;
        let ranges = self
            .corridors
            .get(corridor_id)
            .ok_or(UnmatchedReason::UnknownCorridor)?;

        let upper = ranges.partition_point(|r| r.start <= point);
        let containing = ranges[..upper].iter().filter(|r| point <= r.end);

        let best = match self.policy {
            MatchPolicy::CatalogOrder => containing.min_by_key(|r| r.row_order),
            MatchPolicy::Narrowest => containing.min_by(|a, b| {
                a.length()
                    .total_cmp(&b.length())
                    .then(a.row_order.cmp(&b.row_order))
            }),
        };

        best.map(|r| &r.key)
            .ok_or(UnmatchedReason::NoContainingRange)
    }

    /// Resolves a single crash.
    ///
    /// # Errors
    ///
    /// Returns the [`UnmatchedReason`] when the crash cannot be matched.
    pub fn match_crash(&self, crash: &CrashEvent) -> Result<&SegmentKey, UnmatchedReason> {
        self.resolve(&crash.corridor_id, crash.ref_point)
    }

    /// Resolves every crash, preserving input order.
    #[must_use]
    pub fn match_all(&self, crashes: &[CrashEvent]) -> MatchSummary {
        let mut summary = MatchSummary {
            assignments: Vec::with_capacity(crashes.len()),
            matched: 0,
            unmatched: UnmatchedTally::default(),
        };

        for crash in crashes {
            match self.match_crash(crash) {
                Ok(key) => {
                    summary.matched += 1;
                    summary.assignments.push(Some(key.clone()));
                }
                Err(reason) => {
                    summary.unmatched.record(reason);
                    summary.assignments.push(None);
                }
            }
        }

        log::info!(
            "Matched {} of {} crashes ({} unmatched: {} null reference point, {} unknown corridor, {} outside every range)",
            summary.matched,
            crashes.len(),
            summary.unmatched.total(),
            summary.unmatched.null_ref_point,
            summary.unmatched.unknown_corridor,
            summary.unmatched.no_containing_range,
        );

        summary
    }
}

/// Counts of unmatched crashes by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnmatchedTally {
    pub null_ref_point: usize,
    pub unknown_corridor: usize,
    pub no_containing_range: usize,
}

impl UnmatchedTally {
    fn record(&mut self, reason: UnmatchedReason) {
        match reason {
            UnmatchedReason::NullRefPoint => self.null_ref_point += 1,
            UnmatchedReason::UnknownCorridor => self.unknown_corridor += 1,
            UnmatchedReason::NoContainingRange => self.no_containing_range += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.null_ref_point + self.unknown_corridor + self.no_containing_range
    }
}

/// Result of matching a crash table.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    /// Matched segment per crash, parallel to the input slice.
    pub assignments: Vec<Option<SegmentKey>>,
    pub matched: usize,
    pub unmatched: UnmatchedTally,
}

impl MatchSummary {
    /// Total crashes considered.
    #[must_use]
    pub fn total(&self) -> usize {
        self.assignments.len()
    }
}

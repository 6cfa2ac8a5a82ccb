#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Baseline segment catalog.
//!
//! The catalog is built once from the most recent year's traffic-count
//! table. Each row becomes a [`Segment`] keyed by its composite
//! [`SegmentKey`]; the catalog then has route metadata attached
//! ([`enrich`]) and older years' AADT folded in ([`averager`]).
//!
//! Row order of the baseline table is preserved and recorded on every
//! segment, because the crash matcher's default tie-break depends on it.

pub mod averager;
pub mod enrich;

use std::collections::BTreeMap;

use road_safety_segment_models::{Segment, SegmentKey, SegmentRow};

pub use averager::{AveragingReport, YearObservations, fold_observation};
pub use enrich::RouteIndex;

/// A baseline row whose key was already taken by an earlier row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    /// The contested key.
    pub key: SegmentKey,
    /// Row position of the rejected duplicate in the baseline table.
    pub row_order: usize,
}

/// The set of road segments for a run, keyed by [`SegmentKey`].
#[derive(Debug, Clone, Default)]
pub struct SegmentCatalog {
    segments: Vec<Segment>,
    index: BTreeMap<SegmentKey, usize>,
    duplicates: Vec<DuplicateKey>,
}

impl SegmentCatalog {
    /// Builds the catalog from the baseline year's rows.
    ///
    /// The first row for a key wins. Later rows with the same key are not
    /// merged or overwritten; they are recorded in [`Self::duplicates`].
    #[must_use]
    pub fn from_rows(rows: &[SegmentRow]) -> Self {
        let mut catalog = Self::default();

        for (row_order, row) in rows.iter().enumerate() {
            let segment = Segment::from_row(row, row_order);

            if catalog.index.contains_key(&segment.key) {
                log::warn!(
                    "Duplicate segment key {} at baseline row {row_order}; keeping the first row",
                    segment.key
                );
                catalog.duplicates.push(DuplicateKey {
                    key: segment.key,
                    row_order,
                });
                continue;
            }

            catalog
                .index
                .insert(segment.key.clone(), catalog.segments.len());
            catalog.segments.push(segment);
        }

        let inverted = catalog
            .segments
            .iter()
            .filter(|s| s.start_mp.is_some() && s.end_mp.is_some() && s.range().is_none())
            .count();
        if inverted > 0 {
            log::warn!("{inverted} segments have start > end and will never match a crash");
        }

        log::info!(
            "Built segment catalog: {} segments ({} duplicate rows rejected)",
            catalog.segments.len(),
            catalog.duplicates.len()
        );

        catalog
    }

    /// Segments in baseline row order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Consumes the catalog, returning segments in baseline row order.
    #[must_use]
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    /// Looks up a segment by key.
    #[must_use]
    pub fn get(&self, key: &SegmentKey) -> Option<&Segment> {
        self.index.get(key).map(|&i| &self.segments[i])
    }

    /// Baseline rows rejected because their key was already present.
    #[must_use]
    pub fn duplicates(&self) -> &[DuplicateKey] {
        &self.duplicates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Attaches route metadata to every segment that has a candidate in
    /// `routes`. Returns the number of segments enriched.
    pub fn enrich(&mut self, routes: &RouteIndex) -> usize {
        let mut matches = 0;
        for segment in &mut self.segments {
            if let Some(info) = routes.lookup(segment) {
                segment.route = info.clone();
                matches += 1;
            }
        }
        log::info!(
            "Enriched {matches} of {} segments with route metadata",
            self.segments.len()
        );
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(corr: &str, start: &str, end: &str, dept: &str, aadt: &str) -> SegmentRow {
        SegmentRow {
            corridor_id: Some(corr.to_string()),
            department_id: Some(dept.to_string()),
            start_mp: Some(start.to_string()),
            end_mp: Some(end.to_string()),
            length_mi: Some("1.0".to_string()),
            aadt: Some(aadt.to_string()),
            site_id: Some("S1".to_string()),
            county: None,
        }
    }

    #[test]
    fn keeps_first_row_for_duplicate_keys() {
        let rows = vec![
            row("C1", "0+0.0", "1+0.0", "D1", "100"),
            row("c1 ", "0+0.0", "1+0.0", "d1", "999"),
            row("C1", "1+0.0", "2+0.0", "D1", "200"),
        ];
        let catalog = SegmentCatalog::from_rows(&rows);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.duplicates().len(), 1);
        assert_eq!(catalog.duplicates()[0].row_order, 1);

        let key = SegmentKey::new("C1", "0+0.0", "1+0.0", "D1");
        assert_eq!(catalog.get(&key).unwrap().aadt.average, Some(100.0));
    }

    #[test]
    fn preserves_baseline_row_order() {
        let rows = vec![
            row("C2", "5+0.0", "6+0.0", "D", "1"),
            row("C1", "0+0.0", "1+0.0", "D", "1"),
        ];
        let catalog = SegmentCatalog::from_rows(&rows);
        let orders: Vec<usize> = catalog.segments().iter().map(|s| s.row_order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert_eq!(catalog.segments()[0].key.corridor_id(), "C2");
    }

    #[test]
    fn inverted_segments_stay_in_catalog() {
        let rows = vec![row("C1", "3+0.0", "2+0.0", "D", "10")];
        let catalog = SegmentCatalog::from_rows(&rows);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.segments()[0].range().is_none());
    }
}

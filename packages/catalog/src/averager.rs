//! Multi-year AADT averaging.
//!
//! The running mean is a fold of [`AadtState`] over yearly observations:
//! raw samples are never retained. Years are applied newest first. A
//! segment whose running value is null stays null for every later year.

use std::collections::BTreeMap;

use road_safety_segment_models::{AadtState, SegmentKey, SegmentRow};

use crate::SegmentCatalog;

/// Folds one yearly observation into a running AADT state.
///
/// The state only advances when both the running average and the
/// observation are present:
/// `new = (avg * n + value) / (n + 1)`, `n = n + 1`.
#[must_use]
pub fn fold_observation(state: AadtState, observation: Option<f64>) -> AadtState {
    match (state.average, observation) {
        (Some(average), Some(value)) => {
            let n = f64::from(state.years_with_data);
            AadtState {
                average: Some(average.mul_add(n, value) / (n + 1.0)),
                years_with_data: state.years_with_data + 1,
            }
        }
        _ => state,
    }
}

/// One year's AADT values keyed by segment.
#[derive(Debug, Clone, PartialEq)]
pub struct YearObservations {
    year: u16,
    values: BTreeMap<SegmentKey, Option<f64>>,
}

impl YearObservations {
    /// Builds the lookup for `year`. When a key repeats within the year,
    /// the first row's value is used.
    #[must_use]
    pub fn from_rows(year: u16, rows: &[SegmentRow]) -> Self {
        let mut values = BTreeMap::new();
        let mut repeated = 0_usize;

        for row in rows {
            let key = row.key();
            if values.contains_key(&key) {
                repeated += 1;
                continue;
            }
            values.insert(key, row.aadt_value());
        }

        if repeated > 0 {
            log::debug!("{year}: ignored {repeated} rows with repeated segment keys");
        }

        Self { year, values }
    }

    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// `None` when the key is absent for this year; `Some(None)` when the
    /// key is present with a non-numeric value.
    #[must_use]
    pub fn get(&self, key: &SegmentKey) -> Option<Option<f64>> {
        self.values.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Folds `years` into a single segment state, in the order given.
#[must_use]
pub fn fold_years<'a>(
    state: AadtState,
    key: &SegmentKey,
    years: impl IntoIterator<Item = &'a YearObservations>,
) -> AadtState {
    years.into_iter().fold(state, |state, year| match year.get(key) {
        Some(observation) => fold_observation(state, observation),
        None => state,
    })
}

/// How many segments a single year advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AveragingReport {
    pub year: u16,
    pub updated: usize,
}

impl SegmentCatalog {
    /// Folds additional years into every segment's running AADT.
    ///
    /// Years are applied in descending order regardless of the order they
    /// are passed in, so a run is reproducible from its set of inputs.
    pub fn average_years(&mut self, mut years: Vec<YearObservations>) -> Vec<AveragingReport> {
        years.sort_by(|a, b| b.year.cmp(&a.year));

        let mut reports = Vec::with_capacity(years.len());
        for year in &years {
            let mut updated = 0;
            for segment in &mut self.segments {
                let before = segment.aadt;
                segment.aadt = fold_years(before, &segment.key, std::iter::once(year));
                if segment.aadt.years_with_data != before.years_with_data {
                    updated += 1;
                }
            }
            log::info!(
                "{}: averaged {updated} of {} segments ({} rows in year table)",
                year.year,
                self.segments.len(),
                year.len()
            );
            reports.push(AveragingReport {
                year: year.year,
                updated,
            });
        }

        let full = u32::try_from(years.len()).map_or(u32::MAX, |n| n.saturating_add(1));
        let complete = self
            .segments
            .iter()
            .filter(|s| s.aadt.years_with_data == full)
            .count();
        log::info!("{complete} segments have data from all {full} years");

        reports
    }
}

//! Worst-segment rankings and department breakdowns.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use road_safety_analytics_models::{RankingMetric, SegmentSafetyRecord};

/// Filters applied before ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingConfig {
    /// Only segments with average AADT strictly above this are ranked.
    pub aadt_cutoff: f64,
    /// Miles-per-accident rankings only consider segments strictly longer
    /// than this, so very short sections do not dominate.
    pub min_length_mi: f64,
    /// Number of rows kept per ranking.
    pub top_n: usize,
    /// Skip segments that have no signed route.
    pub require_signed_route: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            aadt_cutoff: 1000.0,
            min_length_mi: 1.0,
            top_n: 100,
            require_signed_route: true,
        }
    }
}

/// Segments that pass the signed-route and AADT filters.
#[must_use]
pub fn eligible<'a>(
    records: &'a [SegmentSafetyRecord],
    config: &RankingConfig,
) -> Vec<&'a SegmentSafetyRecord> {
    let eligible: Vec<&SegmentSafetyRecord> = records
        .iter()
        .filter(|r| !config.require_signed_route || r.has_signed_route())
        .filter(|r| r.aadt.is_some_and(|aadt| aadt > config.aadt_cutoff))
        .collect();

    log::info!(
        "{} of {} segments eligible for ranking (AADT > {})",
        eligible.len(),
        records.len(),
        config.aadt_cutoff
    );

    eligible
}

/// The `top_n` worst eligible segments by `metric`.
///
/// Segments without a value for the metric are not ranked. Ties keep
/// their input order.
#[must_use]
pub fn rank<'a>(
    eligible: &[&'a SegmentSafetyRecord],
    metric: RankingMetric,
    config: &RankingConfig,
) -> Vec<&'a SegmentSafetyRecord> {
    let mut ranked: Vec<(&SegmentSafetyRecord, f64)> = eligible
        .iter()
        .filter(|r| {
            metric != RankingMetric::MilesPerAccident
                || r.length_mi.is_some_and(|len| len > config.min_length_mi)
        })
        .filter_map(|r| metric.value(r).map(|v| (*r, v)))
        .collect();

    ranked.sort_by(|(_, a), (_, b)| {
        if metric.worst_is_lowest() {
            a.total_cmp(b)
        } else {
            b.total_cmp(a)
        }
    });
    ranked.truncate(config.top_n);

    ranked.into_iter().map(|(r, _)| r).collect()
}

/// Segments with at least one crash, ascending by `metric`. Segments
/// without a value sort last.
#[must_use]
pub fn crash_segments_by<'a>(
    records: &'a [SegmentSafetyRecord],
    metric: RankingMetric,
) -> Vec<&'a SegmentSafetyRecord> {
    let mut sorted: Vec<&SegmentSafetyRecord> =
        records.iter().filter(|r| r.total_crashes > 0).collect();
    sorted.sort_by(|a, b| match (metric.value(a), metric.value(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    sorted
}

/// For every department that appears in `ranked`, all of its eligible
/// segments ordered by site id.
#[must_use]
pub fn department_breakdown<'a>(
    ranked: &[&SegmentSafetyRecord],
    eligible: &[&'a SegmentSafetyRecord],
) -> BTreeMap<String, Vec<&'a SegmentSafetyRecord>> {
    let mut departments: BTreeMap<String, Vec<&SegmentSafetyRecord>> = ranked
        .iter()
        .map(|r| (r.department_id.clone(), Vec::new()))
        .collect();

    for record in eligible {
        if let Some(rows) = departments.get_mut(&record.department_id) {
            rows.push(record);
        }
    }

    for rows in departments.values_mut() {
        rows.sort_by(|a, b| {
            natural_cmp(
                a.site_id.as_deref().unwrap_or_default(),
                b.site_id.as_deref().unwrap_or_default(),
            )
        });
    }

    departments
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> impl Iterator<Item = Chunk<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(if digits {
            Chunk::Number(chunk)
        } else {
            Chunk::Text(chunk)
        })
    })
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compares strings so that embedded digit runs order numerically:
/// `"S-2" < "S-10"`. Digit runs sort before text at the same position.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);

    loop {
        let ordering = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Number(x)), Some(Chunk::Number(y))) => compare_numbers(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => x.cmp(y),
            (Some(Chunk::Number(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Number(_))) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

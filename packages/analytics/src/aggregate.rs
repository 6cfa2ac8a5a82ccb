//! Per-segment crash aggregation and derived rates.
//!
//! Every catalog segment produces exactly one output row, whether or not a
//! crash matched it. Ratios are left empty rather than infinite when a
//! segment has no crashes.

use std::collections::BTreeMap;

use road_safety_analytics_models::SegmentSafetyRecord;
use road_safety_matcher::MatchSummary;
use road_safety_segment_models::{Segment, SegmentKey, crash::CrashEvent};

/// Constants used to turn crash counts into rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    /// Number of years the crash table spans. Yearly crash averages divide
    /// by this, independent of how many years of traffic data a segment
    /// has.
    pub crash_window_years: u32,
    /// Days per year used to annualize vehicle-miles.
    pub days_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            crash_window_years: 5,
            days_per_year: 365.25,
        }
    }
}

/// Rates derived from a segment's crash count, length, and AADT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    pub avg_crashes: f64,
    pub miles_driven: Option<f64>,
    pub cars_per_accident: Option<f64>,
    pub miles_per_accident: Option<f64>,
    pub annual_vmt: Option<f64>,
    pub per_100m_vmt: Option<f64>,
}

/// Computes the derived rates for one segment.
#[must_use]
pub fn derive_metrics(
    total_crashes: u64,
    length_mi: Option<f64>,
    aadt: Option<f64>,
    config: &MetricsConfig,
) -> DerivedMetrics {
    #[allow(clippy::cast_precision_loss)]
    let total = total_crashes as f64;
    let window = f64::from(config.crash_window_years);

    let avg_crashes = if window > 0.0 { total / window } else { 0.0 };
    let miles_driven = length_mi.zip(aadt).map(|(len, aadt)| len * aadt);

    let per_crash = |numerator: Option<f64>| {
        numerator
            .filter(|_| avg_crashes > 0.0)
            .map(|n| n / avg_crashes)
    };

    let annual_vmt = miles_driven.map(|m| m * config.days_per_year);
    let per_100m_vmt = annual_vmt
        .map(|vmt| vmt * window)
        .filter(|&vmt_window| vmt_window > 0.0)
        .map(|vmt_window| total / vmt_window * 1e8);

    DerivedMetrics {
        avg_crashes,
        miles_driven,
        cars_per_accident: per_crash(aadt),
        miles_per_accident: per_crash(miles_driven),
        annual_vmt,
        per_100m_vmt,
    }
}

/// Crashes attributed to one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrashTally<'a> {
    pub crashes: u64,
    /// County of the first matched crash that recorded one.
    pub county: Option<&'a str>,
}

/// Counts matched crashes per segment key, in crash table order.
#[must_use]
pub fn tally_matches<'a>(
    crashes: &'a [CrashEvent],
    matches: &'a MatchSummary,
) -> BTreeMap<&'a SegmentKey, CrashTally<'a>> {
    let mut tallies: BTreeMap<&SegmentKey, CrashTally<'_>> = BTreeMap::new();

    for (crash, key) in crashes.iter().zip(&matches.assignments) {
        let Some(key) = key else {
            continue;
        };
        let tally = tallies.entry(key).or_default();
        tally.crashes += 1;
        if tally.county.is_none() {
            tally.county = crash
                .record
                .county
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty());
        }
    }

    tallies
}

/// Builds the output row for one segment.
#[must_use]
pub fn segment_record(
    segment: &Segment,
    tally: Option<&CrashTally<'_>>,
    config: &MetricsConfig,
) -> SegmentSafetyRecord {
    let total_crashes = tally.map_or(0, |t| t.crashes);
    let aadt = segment.aadt.average;
    let metrics = derive_metrics(total_crashes, segment.length_mi, aadt, config);

    let county = tally
        .and_then(|t| t.county)
        .map(ToString::to_string)
        .or_else(|| {
            segment
                .county
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        });

    SegmentSafetyRecord {
        corridor: segment.key.corridor_id().to_string(),
        site_id: segment.site_id.clone(),
        start_mp: segment.key.start_raw().to_string(),
        end_mp: segment.key.end_raw().to_string(),
        department_id: segment.key.department_id().to_string(),
        total_crashes,
        length_mi: segment.length_mi,
        aadt,
        miles_driven: metrics.miles_driven,
        location: segment.site_id.clone(),
        county,
        route_name: segment.route.route_name.clone(),
        signed_route: segment.route.signed_route.clone(),
        system: segment.route.system.clone(),
        avg_crashes: metrics.avg_crashes,
        cars_per_accident: metrics.cars_per_accident,
        miles_per_accident: metrics.miles_per_accident,
        years_with_data: segment.aadt.years_with_data,
        annual_vmt: metrics.annual_vmt,
        per_100m_vmt: metrics.per_100m_vmt,
    }
}

/// Builds one output row per segment, ordered by corridor and then start
/// milepost. Segments whose start milepost does not parse sort last within
/// their corridor; remaining ties keep catalog order.
#[must_use]
pub fn aggregate(
    segments: &[Segment],
    crashes: &[CrashEvent],
    matches: &MatchSummary,
    config: &MetricsConfig,
) -> Vec<SegmentSafetyRecord> {
    let tallies = tally_matches(crashes, matches);

    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by(|a, b| {
        a.key
            .corridor_id()
            .cmp(b.key.corridor_id())
            .then_with(|| match (a.start_mp, b.start_mp) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then(a.row_order.cmp(&b.row_order))
    });

    let records: Vec<SegmentSafetyRecord> = ordered
        .into_iter()
        .map(|segment| segment_record(segment, tallies.get(&segment.key), config))
        .collect();

    let with_crashes = records.iter().filter(|r| r.total_crashes > 0).count();
    log::info!(
        "Aggregated {} segments ({with_crashes} with crashes, {} without)",
        records.len(),
        records.len() - with_crashes
    );

    records
}

#[cfg(test)]
mod tests {
    use road_safety_matcher::CorridorIndex;
    use road_safety_segment_models::{MatchPolicy, SegmentRow, crash::CrashRecord};

    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn segment(corr: &str, start: &str, end: &str, order: usize) -> Segment {
        Segment::from_row(
            &SegmentRow {
                corridor_id: Some(corr.to_string()),
                department_id: Some("D".to_string()),
                start_mp: Some(start.to_string()),
                end_mp: Some(end.to_string()),
                length_mi: Some("2.0".to_string()),
                aadt: Some("1000".to_string()),
                site_id: Some(format!("S{order}")),
                county: Some("CASCADE".to_string()),
            },
            order,
        )
    }

    fn crash(corridor: &str, ref_point: &str, county: Option<&str>) -> CrashEvent {
        CrashEvent::from_record(CrashRecord {
            corridor: Some(corridor.to_string()),
            ref_point: Some(ref_point.to_string()),
            county: county.map(ToString::to_string),
            ..CrashRecord::default()
        })
    }

    #[test]
    fn derives_rates_for_reference_segment() {
        let m = derive_metrics(10, Some(2.0), Some(1000.0), &MetricsConfig::default());
        assert!(approx(m.avg_crashes, 2.0));
        assert!(approx(m.miles_driven.unwrap(), 2000.0));
        assert!(approx(m.cars_per_accident.unwrap(), 500.0));
        assert!(approx(m.miles_per_accident.unwrap(), 1000.0));
        assert!(approx(m.annual_vmt.unwrap(), 730_500.0));

        let expected = 2.0 / 730_500.0 * 1e8;
        assert!(approx(m.per_100m_vmt.unwrap(), expected));
    }

    #[test]
    fn zero_crashes_leave_ratios_empty() {
        let m = derive_metrics(0, Some(2.0), Some(1000.0), &MetricsConfig::default());
        assert!(approx(m.avg_crashes, 0.0));
        assert!(m.cars_per_accident.is_none());
        assert!(m.miles_per_accident.is_none());
        assert!(approx(m.per_100m_vmt.unwrap(), 0.0));
    }

    #[test]
    fn missing_aadt_propagates_to_dependent_metrics() {
        let m = derive_metrics(3, Some(2.0), None, &MetricsConfig::default());
        assert!(m.miles_driven.is_none());
        assert!(m.cars_per_accident.is_none());
        assert!(m.miles_per_accident.is_none());
        assert!(m.annual_vmt.is_none());
        assert!(m.per_100m_vmt.is_none());
    }

    #[test]
    fn zero_length_has_no_vmt_rate() {
        let m = derive_metrics(3, Some(0.0), Some(1000.0), &MetricsConfig::default());
        assert!(approx(m.miles_driven.unwrap(), 0.0));
        assert!(approx(m.miles_per_accident.unwrap(), 0.0));
        assert!(m.per_100m_vmt.is_none());
    }

    #[test]
    fn aggregates_every_segment_sorted_by_corridor_and_start() {
        let segments = vec![
            segment("C2", "000+0.0", "001+0.0", 0),
            segment("C1", "003+0.0", "004+0.0", 1),
            segment("C1", "001+0.0", "003+0.0", 2),
        ];
        let crashes = vec![
            crash("C1", "002+0.0", None),
            crash("C1", "002+0.5", Some("LEWIS")),
            crash("C1", "003+0.5", Some(" ")),
            crash("C9", "000+0.1", Some("HILL")),
        ];
        let index = CorridorIndex::build(&segments, MatchPolicy::CatalogOrder);
        let matches = index.match_all(&crashes);

        let records = aggregate(&segments, &crashes, &matches, &MetricsConfig::default());
        assert_eq!(records.len(), 3);

        let order: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.corridor.as_str(), r.start_mp.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("C1", "001+0.0"), ("C1", "003+0.0"), ("C2", "000+0.0")]
        );

        assert_eq!(records[0].total_crashes, 2);
        assert_eq!(records[0].county.as_deref(), Some("LEWIS"));
        assert_eq!(records[1].total_crashes, 1);
        assert_eq!(records[1].county.as_deref(), Some("CASCADE"));
        assert_eq!(records[2].total_crashes, 0);
        assert!(records[2].cars_per_accident.is_none());

        let matched: u64 = records.iter().map(|r| r.total_crashes).sum();
        assert_eq!(
            usize::try_from(matched).unwrap() + matches.unmatched.total(),
            crashes.len()
        );
    }
}

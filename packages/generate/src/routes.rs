//! Per-route partitions.
//!
//! Segments are grouped by their route display key (signed route, else
//! route name) and each group is written as `<route>.csv`,
//! `<route>.geojson`, and, when crashes matched it, `<route>-crashes.csv`.
//! Partitions share only read-only data and are written on a bounded pool
//! of blocking tasks; a partition that fails is logged and skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt as _};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use road_safety_analytics_models::SegmentSafetyRecord;
use road_safety_matcher::MatchSummary;
use road_safety_segment_models::{SegmentKey, crash::CrashEvent};
use road_safety_source::progress::StageProgress;
use road_safety_spatial::GeometryCatalog;
use serde::Serialize;

use crate::{ExportError, ensure_dir, sanitize_file_name, write_csv, write_json};

/// Directory under the output root that holds route partitions.
pub const ROUTES_DIR: &str = "all_roads";

/// A matched crash row as written to a route's crash file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedCrashRow {
    #[serde(rename = "SEGMENT_KEY")]
    pub segment_key: String,
    #[serde(rename = "CORRIDOR")]
    pub corridor: Option<String>,
    #[serde(rename = "DIR")]
    pub direction: Option<String>,
    #[serde(rename = "REF_POINT")]
    pub ref_point: Option<String>,
    #[serde(rename = "SMT_CITY_NAME")]
    pub city: Option<String>,
    #[serde(rename = "COUNTY")]
    pub county: Option<String>,
    #[serde(rename = "CRASH_MONTH")]
    pub crash_month: Option<String>,
    #[serde(rename = "CRASH_YEAR")]
    pub crash_year: Option<String>,
    #[serde(rename = "DAY_OF_WEEK")]
    pub day_of_week: Option<String>,
    #[serde(rename = "SMS_X_CORD")]
    pub x_coord: Option<String>,
    #[serde(rename = "SMS_Y_CORD")]
    pub y_coord: Option<String>,
    #[serde(rename = "LATITUDE")]
    pub latitude: Option<String>,
    #[serde(rename = "LONGITUDE")]
    pub longitude: Option<String>,
    #[serde(rename = "REF_POINT_FLOAT")]
    pub ref_point_mi: Option<f64>,
}

impl MatchedCrashRow {
    #[must_use]
    pub fn new(key: &SegmentKey, crash: &CrashEvent) -> Self {
        let record = crash.record.clone();
        Self {
            segment_key: key.to_string(),
            corridor: record.corridor,
            direction: record.direction,
            ref_point: record.ref_point,
            city: record.city,
            county: record.county,
            crash_month: record.crash_month,
            crash_year: record.crash_year,
            day_of_week: record.day_of_week,
            x_coord: record.x_coord,
            y_coord: record.y_coord,
            latitude: record.latitude,
            longitude: record.longitude,
            ref_point_mi: crash.ref_point,
        }
    }
}

/// Everything written for one route.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePartition {
    /// Route display key.
    pub route: String,
    /// File stem for this route's outputs, unique among the partitions of
    /// one run.
    pub file_stem: String,
    pub records: Vec<SegmentSafetyRecord>,
    pub crashes: Vec<MatchedCrashRow>,
}

/// Hands out file stems that no two routes share.
///
/// Comparison ignores case, and a stem also reserves its `-crashes`
/// sibling, so no route's file can land on another route's.
#[derive(Debug, Default)]
struct StemAllocator {
    taken: BTreeSet<String>,
}

impl StemAllocator {
    fn is_free(&self, stem: &str) -> bool {
        let stem = stem.to_lowercase();
        !self.taken.contains(&stem) && !self.taken.contains(&format!("{stem}-crashes"))
    }

    fn allocate(&mut self, route: &str) -> String {
        let base = sanitize_file_name(route);
        let mut stem = base.clone();
        let mut n = 2;
        while !self.is_free(&stem) {
            stem = format!("{base}_{n}");
            n += 1;
        }
        if stem != base {
            log::warn!(
                "Route {route:?} shares file name {base:?} with another route; writing it as {stem:?}"
            );
        }

        let lower = stem.to_lowercase();
        self.taken.insert(format!("{lower}-crashes"));
        self.taken.insert(lower);
        stem
    }
}

/// Groups segments and their matched crashes by route display key.
///
/// Segments without a display key, and crashes on such segments, are not
/// partitioned. Partitions are ordered by route key; rows keep input
/// order. Routes whose names sanitize to the same file stem get a numeric
/// suffix in that order.
#[must_use]
pub fn partition_routes(
    records: &[SegmentSafetyRecord],
    crashes: &[CrashEvent],
    matches: &MatchSummary,
) -> Vec<RoutePartition> {
    let mut partitions: BTreeMap<&str, RoutePartition> = BTreeMap::new();
    let mut route_of: BTreeMap<SegmentKey, &str> = BTreeMap::new();

    for record in records {
        let Some(route) = record.route_display_key() else {
            continue;
        };
        route_of.insert(record.key(), route);
        partitions
            .entry(route)
            .or_insert_with(|| RoutePartition {
                route: route.to_string(),
                file_stem: String::new(),
                records: Vec::new(),
                crashes: Vec::new(),
            })
            .records
            .push(record.clone());
    }

    for (crash, key) in crashes.iter().zip(&matches.assignments) {
        let Some(key) = key else {
            continue;
        };
        if let Some(partition) = route_of.get(key).and_then(|r| partitions.get_mut(r)) {
            partition.crashes.push(MatchedCrashRow::new(key, crash));
        }
    }

    let mut stems = StemAllocator::default();
    partitions
        .into_values()
        .map(|mut partition| {
            partition.file_stem = stems.allocate(&partition.route);
            partition
        })
        .collect()
}

/// Concurrency used for route exports: twice the available parallelism.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get() * 2)
}

/// Files written for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteFiles {
    pub segments: usize,
    pub crashes: usize,
}

fn route_feature(record: &SegmentSafetyRecord, geometry: &GeometryCatalog) -> Feature {
    let key = record.key();
    let mut properties = match serde_json::to_value(record) {
        Ok(JsonValue::Object(map)) => map,
        _ => JsonObject::new(),
    };
    properties.insert("SEGMENT_KEY".to_string(), JsonValue::from(key.to_string()));

    Feature {
        bbox: None,
        geometry: geometry.get(&key).cloned(),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Writes one route's files into `dir`.
///
/// # Errors
///
/// Returns [`ExportError`] if any of the route's files cannot be written.
pub fn write_partition(
    dir: &Path,
    partition: &RoutePartition,
    geometry: &GeometryCatalog,
) -> Result<RouteFiles, ExportError> {
    let stem = &partition.file_stem;

    let segments = write_csv(&dir.join(format!("{stem}.csv")), &partition.records)?;

    let features = partition
        .records
        .iter()
        .map(|r| route_feature(r, geometry))
        .collect();
    write_json(
        &dir.join(format!("{stem}.geojson")),
        &FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        },
    )?;

    let crashes = if partition.crashes.is_empty() {
        0
    } else {
        write_csv(&dir.join(format!("{stem}-crashes.csv")), &partition.crashes)?
    };

    Ok(RouteFiles { segments, crashes })
}

/// Outcome of a route export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteExportReport {
    pub written: usize,
    pub failed: usize,
}

/// Writes every partition under `<out_dir>/all_roads`, running up to
/// `concurrency` partitions at once.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the routes directory cannot be created.
/// Failures of individual partitions are counted, not returned.
pub async fn export_routes(
    out_dir: &Path,
    partitions: Vec<RoutePartition>,
    geometry: Arc<GeometryCatalog>,
    concurrency: usize,
    progress: Arc<dyn StageProgress>,
) -> Result<RouteExportReport, ExportError> {
    let dir: PathBuf = out_dir.join(ROUTES_DIR);
    ensure_dir(&dir)?;

    log::info!(
        "Writing {} route partitions to {} (concurrency={concurrency})",
        partitions.len(),
        dir.display()
    );
    progress.start(partitions.len() as u64);

    let results: Vec<_> = stream::iter(partitions.into_iter().map(|partition| {
        let dir = dir.clone();
        let geometry = Arc::clone(&geometry);
        let progress = Arc::clone(&progress);
        async move {
            let route = partition.route.clone();
            let result = tokio::task::spawn_blocking(move || {
                let result = write_partition(&dir, &partition, &geometry);
                progress.done_one();
                result
            })
            .await;
            (route, result)
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut report = RouteExportReport::default();
    for (route, result) in results {
        match result {
            Ok(Ok(files)) => {
                log::debug!(
                    "Route {route}: {} segments, {} crashes",
                    files.segments,
                    files.crashes
                );
                report.written += 1;
            }
            Ok(Err(e)) => {
                log::error!("Route {route} failed: {e}");
                report.failed += 1;
            }
            Err(e) => {
                log::error!("Route {route} worker panicked: {e}");
                report.failed += 1;
            }
        }
    }

    progress.finish(&format!(
        "Wrote {} routes ({} failed)",
        report.written, report.failed
    ));
    log::info!(
        "Route export complete: {} written, {} failed",
        report.written,
        report.failed
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use road_safety_matcher::CorridorIndex;
    use road_safety_segment_models::{MatchPolicy, Segment, SegmentRow, crash::CrashRecord};
    use road_safety_source::progress::null_progress;

    use crate::test_support::{record, scratch_dir};

    use super::*;

    fn crash(corridor: &str, ref_point: &str) -> CrashEvent {
        CrashEvent::from_record(CrashRecord {
            corridor: Some(corridor.to_string()),
            ref_point: Some(ref_point.to_string()),
            crash_year: Some("2021".to_string()),
            ..CrashRecord::default()
        })
    }

    fn matched(records: &[SegmentSafetyRecord], crashes: &[CrashEvent]) -> MatchSummary {
        let segments: Vec<Segment> = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Segment::from_row(
                    &SegmentRow {
                        corridor_id: Some(r.corridor.clone()),
                        department_id: Some(r.department_id.clone()),
                        start_mp: Some(r.start_mp.clone()),
                        end_mp: Some(r.end_mp.clone()),
                        ..SegmentRow::default()
                    },
                    i,
                )
            })
            .collect();
        CorridorIndex::build(&segments, MatchPolicy::CatalogOrder).match_all(crashes)
    }

    #[test]
    fn partitions_by_display_key_and_skips_unnamed_routes() {
        let mut named = record("C3", "D", 0, None);
        named.route_name = Some("OLD HWY".to_string());
        let records = vec![
            record("C1", "D", 1, Some("US 2")),
            record("C2", "D", 0, Some("US 2")),
            named,
            record("C4", "D", 1, None),
        ];
        let crashes = vec![crash("C1", "000+0.5"), crash("C4", "000+0.5"), crash("C9", "000+0.1")];
        let matches = matched(&records, &crashes);

        let partitions = partition_routes(&records, &crashes, &matches);
        let routes: Vec<&str> = partitions.iter().map(|p| p.route.as_str()).collect();
        assert_eq!(routes, vec!["OLD HWY", "US 2"]);

        let us2 = &partitions[1];
        assert_eq!(us2.records.len(), 2);
        assert_eq!(us2.crashes.len(), 1);
        assert_eq!(us2.crashes[0].segment_key, "C1_000+0.000_001+0.000_D");
        assert!((us2.crashes[0].ref_point_mi.unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn exports_route_files_concurrently() {
        let dir = scratch_dir("routes");
        let records = vec![
            record("C1", "D", 1, Some("US 2")),
            record("C2", "D", 0, Some("MT 200/A")),
        ];
        let crashes = vec![crash("C1", "000+0.5")];
        let matches = matched(&records, &crashes);
        let partitions = partition_routes(&records, &crashes, &matches);

        let report = export_routes(
            &dir,
            partitions,
            Arc::new(GeometryCatalog::default()),
            default_concurrency(),
            null_progress(),
        )
        .await
        .unwrap();
        assert_eq!(report, RouteExportReport { written: 2, failed: 0 });

        let routes = dir.join(ROUTES_DIR);
        assert!(routes.join("US 2.csv").exists());
        assert!(routes.join("US 2.geojson").exists());
        assert!(routes.join("US 2-crashes.csv").exists());
        assert!(routes.join("MT 200_A.csv").exists());
        assert!(!routes.join("MT 200_A-crashes.csv").exists());

        let crash_file = std::fs::read_to_string(routes.join("US 2-crashes.csv")).unwrap();
        let header = crash_file.lines().next().unwrap();
        assert!(header.starts_with("SEGMENT_KEY,CORRIDOR,DIR,REF_POINT"));
        assert!(header.ends_with("LONGITUDE,REF_POINT_FLOAT"));

        let geojson = std::fs::read_to_string(routes.join("US 2.geojson")).unwrap();
        let value: JsonValue = serde_json::from_str(&geojson).unwrap();
        assert_eq!(value["features"][0]["geometry"], JsonValue::Null);
        assert_eq!(value["features"][0]["properties"]["TOTAL_CRASHES"], 1);
    }

    #[test]
    fn colliding_file_names_get_a_suffix() {
        let records = vec![
            record("C1", "D", 0, Some("US 2/A")),
            record("C2", "D", 0, Some("US 2:A")),
            record("C3", "D", 0, Some("us 2_a")),
            record("C4", "D", 0, Some("US 2_A-crashes")),
        ];
        let matches = matched(&records, &[]);

        let partitions = partition_routes(&records, &[], &matches);
        let stems: Vec<(&str, &str)> = partitions
            .iter()
            .map(|p| (p.route.as_str(), p.file_stem.as_str()))
            .collect();
        assert_eq!(
            stems,
            vec![
                ("US 2/A", "US 2_A"),
                ("US 2:A", "US 2_A_2"),
                ("US 2_A-crashes", "US 2_A-crashes_2"),
                ("us 2_a", "us 2_a_3"),
            ]
        );
    }

    #[tokio::test]
    async fn colliding_routes_write_separate_files() {
        let dir = scratch_dir("route_collisions");
        let records = vec![
            record("C1", "D", 1, Some("US 2/A")),
            record("C2", "D", 0, Some("US 2:A")),
        ];
        let matches = matched(&records, &[]);
        let partitions = partition_routes(&records, &[], &matches);

        let report = export_routes(
            &dir,
            partitions,
            Arc::new(GeometryCatalog::default()),
            2,
            null_progress(),
        )
        .await
        .unwrap();
        assert_eq!(report, RouteExportReport { written: 2, failed: 0 });

        let routes = dir.join(ROUTES_DIR);
        let first = std::fs::read_to_string(routes.join("US 2_A.csv")).unwrap();
        let second = std::fs::read_to_string(routes.join("US 2_A_2.csv")).unwrap();
        assert!(first.contains("C1,"));
        assert!(second.contains("C2,"));
    }
}

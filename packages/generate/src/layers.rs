//! Point and line `GeoJSON` layers for mapping.
//!
//! Only segments that pass [`LayerFilter`] and have geometry are drawn.
//! Points are placed on each segment's centerline and rounded to five
//! decimals.

use std::path::Path;

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, Value};
use road_safety_analytics_models::SegmentSafetyRecord;
use road_safety_spatial::{GeometryCatalog, Placement, representative_point, round_coord};

use crate::{ExportError, ensure_dir, write_json};

/// Point layer file name.
pub const POINTS_LAYER: &str = "merged_traffic_average_points.geojson";

/// Line layer file name.
pub const LINES_LAYER: &str = "merged_traffic_lines.geojson";

/// Which segments are drawn on the map layers.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFilter {
    /// Minimum average AADT.
    pub min_aadt: f64,
    /// Department id prefixes that are not drawn.
    pub excluded_department_prefixes: Vec<String>,
    /// Departments drawn even when they match an excluded prefix.
    pub kept_departments: Vec<String>,
}

impl Default for LayerFilter {
    fn default() -> Self {
        Self {
            min_aadt: 1.0,
            excluded_department_prefixes: ["R", "L", "X", "U"].map(String::from).to_vec(),
            kept_departments: vec!["U-5832".to_string()],
        }
    }
}

impl LayerFilter {
    /// Whether a segment is drawn.
    #[must_use]
    pub fn includes(&self, record: &SegmentSafetyRecord) -> bool {
        if !record.aadt.is_some_and(|aadt| aadt >= self.min_aadt) {
            return false;
        }

        let department = record.department_id.trim().to_uppercase();
        if self.kept_departments.iter().any(|k| *k == department) {
            return true;
        }
        !self
            .excluded_department_prefixes
            .iter()
            .any(|prefix| department.starts_with(prefix.as_str()))
    }
}

fn layer_properties(record: &SegmentSafetyRecord) -> JsonObject {
    let mut properties = JsonObject::new();
    properties.insert(
        "SEGMENT_KEY".to_string(),
        JsonValue::from(record.key().to_string()),
    );
    properties.insert("CORRIDOR".to_string(), JsonValue::from(record.corridor.as_str()));
    properties.insert(
        "DEPT_ID".to_string(),
        JsonValue::from(record.department_id.as_str()),
    );
    properties.insert("TOTAL_CRASHES".to_string(), JsonValue::from(record.total_crashes));
    properties.insert("AVG_CRASHES".to_string(), JsonValue::from(record.avg_crashes));
    properties.insert("PER_100M_VMT".to_string(), JsonValue::from(record.per_100m_vmt));
    properties.insert("TYC_AADT".to_string(), JsonValue::from(record.aadt));
    properties
}

fn feature(geometry: geojson::Geometry, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Counts of features written to the map layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerReport {
    pub points: usize,
    pub lines: usize,
    /// Segments filtered out by department prefix or AADT.
    pub filtered: usize,
}

/// Builds and writes the point and line layers.
///
/// # Errors
///
/// Returns [`ExportError`] if either layer cannot be written.
pub fn write_layers(
    out_dir: &Path,
    records: &[SegmentSafetyRecord],
    geometry: &GeometryCatalog,
    placement: Placement,
    filter: &LayerFilter,
) -> Result<LayerReport, ExportError> {
    ensure_dir(out_dir)?;

    let mut points = Vec::new();
    let mut lines = Vec::new();
    let mut filtered = 0;

    for record in records {
        if !filter.includes(record) {
            filtered += 1;
            continue;
        }
        let Some(line) = geometry.get(&record.key()) else {
            continue;
        };
        let Some(point) = representative_point(line, placement) else {
            continue;
        };

        let point = round_coord(point);
        let properties = layer_properties(record);
        points.push(feature(
            geojson::Geometry::new(Value::Point(vec![point.x, point.y])),
            properties.clone(),
        ));
        lines.push(feature(line.clone(), properties));
    }

    let report = LayerReport {
        points: points.len(),
        lines: lines.len(),
        filtered,
    };

    let collection = |features| FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    write_json(&out_dir.join(POINTS_LAYER), &collection(points))?;
    write_json(&out_dir.join(LINES_LAYER), &collection(lines))?;

    log::info!(
        "Wrote {} points and {} lines to {} ({} segments filtered out)",
        report.points,
        report.lines,
        out_dir.display(),
        report.filtered
    );

    Ok(report)
}

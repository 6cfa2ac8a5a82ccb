#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Segment geometry lookup and representative points.
//!
//! Yearly `GeoJSON` feature collections are folded into a single
//! [`GeometryCatalog`] keyed by [`SegmentKey`], preferring earlier years in
//! the configured list. [`representative_point`] reduces a segment's
//! centerline to one coordinate for point exports. All computation is
//! planar, in whatever coordinate system the input uses.

use std::collections::BTreeMap;

use geo::{Coord, LineInterpolatePoint, LineString};
use geojson::{Feature, JsonObject, JsonValue};
use road_safety_segment_models::SegmentKey;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Where on a centerline the representative point is taken.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Placement {
    /// First vertex.
    Start,
    /// Half-way along the arc length.
    #[default]
    Midpoint,
}

/// Picks the line that stands in for a geometry.
///
/// A `MultiLineString` is represented by its part with the most vertices;
/// the first such part wins ties. Other geometry types have no
/// representative line.
#[must_use]
pub fn representative_line(geometry: &geo::Geometry<f64>) -> Option<&LineString<f64>> {
    match geometry {
        geo::Geometry::LineString(line) => Some(line),
        geo::Geometry::MultiLineString(multi) => multi
            .0
            .iter()
            .reduce(|best, part| if part.0.len() > best.0.len() { part } else { best }),
        _ => None,
    }
}

/// The point at `placement` along `line`.
///
/// Returns `None` when the line has fewer than two vertices. A line with
/// zero total length resolves to its first vertex.
#[must_use]
pub fn point_on_line(line: &LineString<f64>, placement: Placement) -> Option<Coord<f64>> {
    let [first, rest @ ..] = line.0.as_slice() else {
        return None;
    };
    if rest.is_empty() {
        return None;
    }
    if placement == Placement::Start || rest.iter().all(|c| c == first) {
        return Some(*first);
    }

    line.line_interpolate_point(0.5).map(|p| p.0)
}

/// Representative point of a `GeoJSON` geometry, or `None` when the
/// geometry is not a (multi)line or has no vertices.
#[must_use]
pub fn representative_point(geometry: &geojson::Geometry, placement: Placement) -> Option<Coord<f64>> {
    let geometry: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    point_on_line(representative_line(&geometry)?, placement)
}

/// Rounds a coordinate to five decimal places.
#[must_use]
pub fn round_coord(coord: Coord<f64>) -> Coord<f64> {
    let round5 = |v: f64| (v * 100_000.0).round() / 100_000.0;
    Coord {
        x: round5(coord.x),
        y: round5(coord.y),
    }
}

fn property_text(properties: &JsonObject, name: &str) -> String {
    match properties.get(name) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Builds the segment key a feature's properties describe.
#[must_use]
pub fn key_from_properties(properties: &JsonObject) -> SegmentKey {
    SegmentKey::new(
        &property_text(properties, "CORR_ID"),
        &property_text(properties, "CORR_MP"),
        &property_text(properties, "CORR_ENDMP"),
        &property_text(properties, "DEPT_ID"),
    )
}

/// Segment geometries keyed by segment.
#[derive(Debug, Clone, Default)]
pub struct GeometryCatalog {
    geometries: BTreeMap<SegmentKey, geojson::Geometry>,
}

impl GeometryCatalog {
    /// Folds feature sets into one catalog. `years` must be in preference
    /// order: a key already present is never replaced by a later set.
    /// Features without geometry or properties are ignored.
    #[must_use]
    pub fn from_years<'a>(years: impl IntoIterator<Item = &'a [Feature]>) -> Self {
        let geometries = years
            .into_iter()
            .flatten()
            .filter_map(|feature| {
                let properties = feature.properties.as_ref()?;
                let geometry = feature.geometry.as_ref()?;
                Some((key_from_properties(properties), geometry))
            })
            .fold(BTreeMap::new(), |mut acc, (key, geometry)| {
                acc.entry(key).or_insert_with(|| geometry.clone());
                acc
            });

        log::info!("Geometry catalog holds {} segments", geometries.len());

        Self { geometries }
    }

    #[must_use]
    pub fn get(&self, key: &SegmentKey) -> Option<&geojson::Geometry> {
        self.geometries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

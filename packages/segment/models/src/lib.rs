#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road segment and crash event types shared across the road-safety
//! pipeline.
//!
//! A [`Segment`] is one row of a yearly traffic-count table, identified by
//! a composite [`SegmentKey`]. Raw milepost strings are part of the key, so
//! a section that was resurveyed between years (and therefore has different
//! milepost text) is a different segment.

pub mod crash;
pub mod milepost;

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

pub use milepost::{parse_milepost, parse_numeric};

/// Normalizes a corridor or department identifier: trimmed and uppercased.
#[must_use]
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Composite identity of a road segment.
///
/// Corridor and department ids are normalized on construction; the milepost
/// strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentKey {
    corridor_id: String,
    start_raw: String,
    end_raw: String,
    department_id: String,
}

impl SegmentKey {
    /// Builds a key, normalizing the corridor and department ids.
    #[must_use]
    pub fn new(corridor_id: &str, start_raw: &str, end_raw: &str, department_id: &str) -> Self {
        Self {
            corridor_id: normalize_id(corridor_id),
            start_raw: start_raw.to_string(),
            end_raw: end_raw.to_string(),
            department_id: normalize_id(department_id),
        }
    }

    /// Normalized corridor id.
    #[must_use]
    pub fn corridor_id(&self) -> &str {
        &self.corridor_id
    }

    /// Start milepost exactly as it appeared in the source table.
    #[must_use]
    pub fn start_raw(&self) -> &str {
        &self.start_raw
    }

    /// End milepost exactly as it appeared in the source table.
    #[must_use]
    pub fn end_raw(&self) -> &str {
        &self.end_raw
    }

    /// Normalized department id.
    #[must_use]
    pub fn department_id(&self) -> &str {
        &self.department_id
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.corridor_id, self.start_raw, self.end_raw, self.department_id
        )
    }
}

impl Serialize for SegmentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of a yearly traffic-count table, as read from disk.
///
/// Every field is optional so that tables with missing columns still load;
/// the catalog builder decides what a missing value means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRow {
    #[serde(rename = "CORR_ID", default)]
    pub corridor_id: Option<String>,
    #[serde(rename = "DEPT_ID", default)]
    pub department_id: Option<String>,
    #[serde(rename = "CORR_MP", default)]
    pub start_mp: Option<String>,
    #[serde(rename = "CORR_ENDMP", default)]
    pub end_mp: Option<String>,
    #[serde(rename = "SEC_LNT_MI", default)]
    pub length_mi: Option<String>,
    #[serde(rename = "TYC_AADT", default)]
    pub aadt: Option<String>,
    #[serde(rename = "SITE_ID", default)]
    pub site_id: Option<String>,
    #[serde(rename = "CNTY_NM", default)]
    pub county: Option<String>,
}

impl SegmentRow {
    /// Composite key for this row. Missing fields become empty strings.
    #[must_use]
    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(
            self.corridor_id.as_deref().unwrap_or_default(),
            self.start_mp.as_deref().unwrap_or_default(),
            self.end_mp.as_deref().unwrap_or_default(),
            self.department_id.as_deref().unwrap_or_default(),
        )
    }

    /// Traffic volume coerced to a number, `None` when non-numeric.
    #[must_use]
    pub fn aadt_value(&self) -> Option<f64> {
        parse_numeric(self.aadt.as_deref())
    }
}

/// Running multi-year AADT estimate for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AadtState {
    /// Current mean, `None` once any contributing value was unusable.
    pub average: Option<f64>,
    /// Number of yearly observations folded into [`Self::average`].
    pub years_with_data: u32,
}

impl AadtState {
    /// State seeded from the baseline year's value.
    #[must_use]
    pub const fn baseline(value: Option<f64>) -> Self {
        Self {
            average: value,
            years_with_data: 1,
        }
    }
}

/// Display metadata attached to a segment from the route-metadata table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub route_name: Option<String>,
    pub signed_route: Option<String>,
    pub system: Option<String>,
}

impl RouteInfo {
    /// The name a route is exported under: the signed route when present,
    /// otherwise the route name. Blank values count as absent.
    #[must_use]
    pub fn display_key(&self) -> Option<&str> {
        non_blank(self.signed_route.as_deref()).or_else(|| non_blank(self.route_name.as_deref()))
    }
}

/// Trimmed `value`, or `None` when it is missing or blank.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// One row of the external route-metadata table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMetadataRow {
    #[serde(rename = "ROUTE ID", default)]
    pub route_id: Option<String>,
    #[serde(rename = "ROUTE NAME", default)]
    pub route_name: Option<String>,
    #[serde(rename = "SIGNED ROUTE", default)]
    pub signed_route: Option<String>,
    #[serde(rename = "SYSTEM", default)]
    pub system: Option<String>,
    #[serde(rename = "BEGIN REFERENCE POINT", default)]
    pub begin_ref: Option<String>,
    #[serde(rename = "END REFERENCE POINT", default)]
    pub end_ref: Option<String>,
}

/// A road segment in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub key: SegmentKey,
    /// Position of the row in the baseline table.
    pub row_order: usize,
    pub site_id: Option<String>,
    pub county: Option<String>,
    pub start_mp: Option<f64>,
    pub end_mp: Option<f64>,
    pub length_mi: Option<f64>,
    pub aadt: AadtState,
    pub route: RouteInfo,
}

impl Segment {
    /// Builds a catalog segment from a raw table row.
    #[must_use]
    pub fn from_row(row: &SegmentRow, row_order: usize) -> Self {
        Self {
            key: row.key(),
            row_order,
            site_id: row.site_id.clone(),
            county: row.county.clone(),
            start_mp: parse_milepost(row.start_mp.as_deref()),
            end_mp: parse_milepost(row.end_mp.as_deref()),
            length_mi: parse_numeric(row.length_mi.as_deref()),
            aadt: AadtState::baseline(row.aadt_value()),
            route: RouteInfo::default(),
        }
    }

    /// The `[start, end]` range, present only when both ends parse and
    /// `start <= end`. Segments without a range are never matched.
    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.start_mp, self.end_mp) {
            (Some(start), Some(end)) if start <= end => Some((start, end)),
            _ => None,
        }
    }

    /// Midpoint of the parsed mileposts, regardless of their order.
    #[must_use]
    pub fn midpoint(&self) -> Option<f64> {
        Some(f64::midpoint(self.start_mp?, self.end_mp?))
    }
}

/// Tie-break applied when a reference point falls inside more than one
/// segment range on the same corridor.
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
pub enum MatchPolicy {
    /// The containing range that appears first in the baseline table.
    #[default]
    CatalogOrder,
    /// The shortest containing range; catalog order breaks ties.
    Narrowest,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    fn row(corr: &str, start: &str, end: &str, dept: &str, aadt: &str) -> SegmentRow {
        SegmentRow {
            corridor_id: Some(corr.to_string()),
            department_id: Some(dept.to_string()),
            start_mp: Some(start.to_string()),
            end_mp: Some(end.to_string()),
            length_mi: Some("1.0".to_string()),
            aadt: Some(aadt.to_string()),
            site_id: None,
            county: None,
        }
    }

    #[test]
    fn key_is_underscore_join_with_normalized_ids() {
        let key = SegmentKey::new(" mt-200 ", "002+0.000", "003+0.000", "n-5 ");
        assert_eq!(key.to_string(), "MT-200_002+0.000_003+0.000_N-5");
        assert_eq!(key.corridor_id(), "MT-200");
        assert_eq!(key.department_id(), "N-5");
    }

    #[test]
    fn textually_distinct_mileposts_are_distinct_keys() {
        let a = SegmentKey::new("MT-200", "002+0.000", "003+0.000", "N-5");
        let b = SegmentKey::new("MT-200", "002+0.0", "003+0.000", "N-5");
        assert_ne!(a, b);
    }

    #[test]
    fn key_serializes_as_string() {
        let key = SegmentKey::new("C1", "0+0", "1+0", "D");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"C1_0+0_1+0_D\"");
    }

    #[test]
    fn inverted_range_is_not_matchable() {
        let seg = Segment::from_row(&row("C1", "003+0.0", "002+0.0", "D", "10"), 0);
        assert!(seg.range().is_none());
        assert!(seg.midpoint().is_some());
    }

    #[test]
    fn unparsable_aadt_is_null_with_one_year() {
        let seg = Segment::from_row(&row("C1", "0+0", "1+0", "D", "n/a"), 3);
        assert!(seg.aadt.average.is_none());
        assert_eq!(seg.aadt.years_with_data, 1);
        assert_eq!(seg.row_order, 3);
    }

    #[test]
    fn display_key_prefers_signed_route() {
        let info = RouteInfo {
            route_name: Some("MAIN ST".to_string()),
            signed_route: Some("  ".to_string()),
            system: None,
        };
        assert_eq!(info.display_key(), Some("MAIN ST"));

        let info = RouteInfo {
            signed_route: Some("US-93".to_string()),
            ..info
        };
        assert_eq!(info.display_key(), Some("US-93"));
        assert_eq!(RouteInfo::default().display_key(), None);
    }

    #[test]
    fn match_policy_parses_from_snake_case() {
        assert_eq!(
            MatchPolicy::from_str("narrowest").unwrap(),
            MatchPolicy::Narrowest
        );
        assert_eq!(MatchPolicy::CatalogOrder.to_string(), "catalog_order");
    }
}

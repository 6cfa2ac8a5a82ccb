#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output row and ranking types for per-segment crash rates.
//!
//! [`SegmentSafetyRecord`] is one row of `merged_traffic_average.csv`. Its
//! field order is the column order of that file, and it can be read back
//! for re-ranking without rerunning the pipeline.

use road_safety_segment_models::{SegmentKey, non_blank};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Per-segment crash totals and derived rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSafetyRecord {
    #[serde(rename = "CORRIDOR")]
    pub corridor: String,
    #[serde(rename = "SITE_ID", default)]
    pub site_id: Option<String>,
    /// Start milepost as written in the baseline table.
    #[serde(rename = "CORR_MP")]
    pub start_mp: String,
    /// End milepost as written in the baseline table.
    #[serde(rename = "CORR_ENDMP")]
    pub end_mp: String,
    #[serde(rename = "DEPT_ID")]
    pub department_id: String,
    #[serde(rename = "TOTAL_CRASHES")]
    pub total_crashes: u64,
    #[serde(rename = "SEC_LNT_MI", default)]
    pub length_mi: Option<f64>,
    /// Multi-year average AADT.
    #[serde(rename = "TYC_AADT", default)]
    pub aadt: Option<f64>,
    #[serde(rename = "MILES_DRIVEN", default)]
    pub miles_driven: Option<f64>,
    #[serde(rename = "LOCATION", default)]
    pub location: Option<String>,
    #[serde(rename = "COUNTY", default)]
    pub county: Option<String>,
    #[serde(rename = "ROUTE_NAME", default)]
    pub route_name: Option<String>,
    #[serde(rename = "SIGNED_ROUTE", default)]
    pub signed_route: Option<String>,
    #[serde(rename = "SYSTEM", default)]
    pub system: Option<String>,
    #[serde(rename = "AVG_CRASHES")]
    pub avg_crashes: f64,
    #[serde(rename = "CARS_PER_ACC", default)]
    pub cars_per_accident: Option<f64>,
    #[serde(rename = "MILES_PER_ACC", default)]
    pub miles_per_accident: Option<f64>,
    #[serde(rename = "YEARS_WITH_DATA", default)]
    pub years_with_data: u32,
    #[serde(rename = "ANNUAL_VMT", default)]
    pub annual_vmt: Option<f64>,
    #[serde(rename = "PER_100M_VMT", default)]
    pub per_100m_vmt: Option<f64>,
}

impl SegmentSafetyRecord {
    /// Rebuilds the segment key from the identity columns.
    #[must_use]
    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(
            &self.corridor,
            &self.start_mp,
            &self.end_mp,
            &self.department_id,
        )
    }

    /// Signed route if present, otherwise route name. Blank values count
    /// as absent.
    #[must_use]
    pub fn route_display_key(&self) -> Option<&str> {
        non_blank(self.signed_route.as_deref()).or_else(|| non_blank(self.route_name.as_deref()))
    }

    #[must_use]
    pub fn has_signed_route(&self) -> bool {
        self.signed_route
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Metric a ranking is ordered by.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RankingMetric {
    /// Average AADT per yearly crash; lower is worse.
    CarsPerAccident,
    /// Vehicle-miles per yearly crash; lower is worse.
    MilesPerAccident,
    /// Crashes per 100 million vehicle-miles; higher is worse.
    #[serde(rename = "per_100m_vmt")]
    #[strum(serialize = "per_100m_vmt")]
    Per100mVmt,
}

impl RankingMetric {
    /// The metric's value for a record, if defined.
    #[must_use]
    pub const fn value(self, record: &SegmentSafetyRecord) -> Option<f64> {
        match self {
            Self::CarsPerAccident => record.cars_per_accident,
            Self::MilesPerAccident => record.miles_per_accident,
            Self::Per100mVmt => record.per_100m_vmt,
        }
    }

    /// Whether the worst segments have the smallest values.
    #[must_use]
    pub const fn worst_is_lowest(self) -> bool {
        match self {
            Self::CarsPerAccident | Self::MilesPerAccident => true,
            Self::Per100mVmt => false,
        }
    }
}

/// Crash count for one county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountyCrashCount {
    #[serde(rename = "COUNTY")]
    pub county: String,
    #[serde(rename = "CRASH_COUNT")]
    pub crashes: u64,
}

/// Crash counts for one crash year, by county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCountyCrashCounts {
    pub year: String,
    pub counties: Vec<CountyCrashCount>,
}

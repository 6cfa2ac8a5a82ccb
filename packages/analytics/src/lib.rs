#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash-rate analytics over matched segments.
//!
//! [`aggregate`] turns a catalog plus crash matches into one
//! [`SegmentSafetyRecord`](road_safety_analytics_models::SegmentSafetyRecord)
//! per segment. [`ranking`] selects the worst segments from those rows and
//! [`county`] tallies the raw crash table by county.

pub mod aggregate;
pub mod county;
pub mod ranking;
pub mod summary;

pub use aggregate::{MetricsConfig, aggregate};
pub use ranking::RankingConfig;
pub use summary::RunSummary;

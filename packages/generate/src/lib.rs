#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output writers for the road-safety pipeline.
//!
//! Writes the merged per-segment table and its crash-only sorted views,
//! point and line `GeoJSON` layers ([`layers`]), worst-segment rankings
//! ([`rankings`]), county tallies ([`county`]), and the per-route
//! partitions ([`routes`]), which are written concurrently.

pub mod county;
pub mod layers;
pub mod rankings;
pub mod routes;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use road_safety_analytics::{RunSummary, ranking::crash_segments_by};
use road_safety_analytics_models::{RankingMetric, SegmentSafetyRecord};
use serde::Serialize;

/// Merged per-segment table.
pub const MERGED_TABLE: &str = "merged_traffic_average.csv";

/// Crash segments ascending by cars per accident.
pub const SORTED_BY_CARS: &str = "sort_car_merged_traffic_average.csv";

/// Crash segments ascending by miles per accident.
pub const SORTED_BY_MILES: &str = "sort_mile_merged_traffic_average.csv";

/// Run summary.
pub const SUMMARY: &str = "summary.json";

/// Errors that can occur while writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// I/O error creating a file or directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path being written.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// Path being written.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Creates `dir` and any missing parents.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| ExportError::Io {
        path: dir.display().to_string(),
        source: e,
    })
}

fn create_file(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| ExportError::Io {
            path: path.display().to_string(),
            source: e,
        })
}

/// Writes `rows` to a CSV file with a header row taken from the row type.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or a row cannot be
/// serialized.
pub fn write_csv<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, ExportError> {
    let to_error = |e: csv::Error| ExportError::Csv {
        path: path.display().to_string(),
        source: e,
    };

    let mut writer = csv::Writer::from_writer(create_file(path)?);
    let mut count = 0;
    for row in rows {
        writer.serialize(row).map_err(to_error)?;
        count += 1;
    }
    writer.flush().map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(count)
}

/// Writes `value` as JSON.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or the value
/// cannot be serialized.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    serde_json::to_writer(create_file(path)?, value).map_err(|e| ExportError::Json {
        path: path.display().to_string(),
        source: e,
    })
}

/// Replaces characters that are not allowed in file names with `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Writes the merged table and the two crash-only sorted views.
///
/// # Errors
///
/// Returns [`ExportError`] if any of the files cannot be written.
pub fn write_merged_tables(
    out_dir: &Path,
    records: &[SegmentSafetyRecord],
) -> Result<(), ExportError> {
    ensure_dir(out_dir)?;

    let merged = out_dir.join(MERGED_TABLE);
    let rows = write_csv(&merged, records)?;
    log::info!("Wrote {rows} segments to {}", merged.display());

    let by_cars = crash_segments_by(records, RankingMetric::CarsPerAccident);
    write_csv(&out_dir.join(SORTED_BY_CARS), by_cars)?;

    let by_miles = crash_segments_by(records, RankingMetric::MilesPerAccident);
    let rows = write_csv(&out_dir.join(SORTED_BY_MILES), by_miles)?;
    log::info!("Wrote sorted views of {rows} segments with crashes");

    Ok(())
}

/// Writes the run summary.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be written.
pub fn write_summary(out_dir: &Path, summary: &RunSummary) -> Result<(), ExportError> {
    ensure_dir(out_dir)?;
    let path = out_dir.join(SUMMARY);
    write_json(&path, summary)?;
    log::info!("Wrote run summary to {}", path.display());
    Ok(())
}

/// Reads a merged table written by [`write_merged_tables`].
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if the file cannot be opened or a row does
/// not parse.
pub fn read_merged_table(path: &Path) -> Result<Vec<SegmentSafetyRecord>, ExportError> {
    let to_error = |e: csv::Error| ExportError::Csv {
        path: path.display().to_string(),
        source: e,
    };

    csv::Reader::from_path(path)
        .map_err(to_error)?
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_error)
}

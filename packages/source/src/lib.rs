#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input loading for the road-safety pipeline.
//!
//! Yearly traffic-count tables live under a data directory laid out as
//! `Traffic_Yearly_Counts_<year>/TYC_<year>.csv`, with optional segment
//! geometry next to them. [`DataLayout`] resolves those paths; [`tables`]
//! reads the CSV inputs and [`geometry`] reads the `GeoJSON` ones.
//!
//! Only a missing baseline table is an error. Every other missing input
//! is logged and treated as empty.

pub mod geometry;
pub mod progress;
pub mod tables;

use std::path::{Path, PathBuf};

pub use tables::{
    CrashTable, CsvRows, YearTable, load_additional_years, load_baseline, load_crashes,
    load_route_metadata,
};

/// Errors that can occur while loading pipeline inputs.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// CSV file could not be opened or its header could not be read.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error reading a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// `GeoJSON` document could not be parsed.
    #[error("GeoJSON error in {path}: {source}")]
    GeoJson {
        /// Path to the `GeoJSON` file.
        path: String,
        /// Underlying parse error.
        source: Box<geojson::Error>,
    },

    /// The baseline year's traffic-count table does not exist.
    #[error("Baseline traffic-count table for {year} not found at {path}")]
    MissingBaseline {
        /// The baseline year.
        year: u16,
        /// Expected location of the table.
        path: String,
    },
}

/// Resolves input paths under a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    data_dir: PathBuf,
}

impl DataLayout {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one year's traffic-count files.
    #[must_use]
    pub fn year_dir(&self, year: u16) -> PathBuf {
        self.data_dir.join(format!("Traffic_Yearly_Counts_{year}"))
    }

    /// Path of one year's traffic-count table.
    #[must_use]
    pub fn year_table(&self, year: u16) -> PathBuf {
        self.year_dir(year).join(format!("TYC_{year}.csv"))
    }

    /// Candidate locations of one year's segment geometry, in lookup order.
    #[must_use]
    pub fn geometry_candidates(&self, year: u16) -> [PathBuf; 3] {
        [
            self.data_dir
                .join("Traffic_Yearly_Counts")
                .join(format!("TYC_{year}.json")),
            self.year_dir(year).join(format!("TYC_{year}.json")),
            self.year_dir(year).join(format!("TYC_{year}.JSON")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_year_paths() {
        let layout = DataLayout::new("data");
        assert_eq!(
            layout.year_table(2023),
            Path::new("data/Traffic_Yearly_Counts_2023/TYC_2023.csv")
        );

        let candidates = layout.geometry_candidates(2021);
        assert_eq!(
            candidates[0],
            Path::new("data/Traffic_Yearly_Counts/TYC_2021.json")
        );
        assert_eq!(
            candidates[2],
            Path::new("data/Traffic_Yearly_Counts_2021/TYC_2021.JSON")
        );
    }
}

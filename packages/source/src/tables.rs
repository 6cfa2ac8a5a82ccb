//! CSV table loaders.

use std::path::Path;
use std::sync::Arc;

use road_safety_segment_models::{RouteMetadataRow, SegmentRow, crash::CrashEvent};
use csv::StringRecord;
use serde::de::DeserializeOwned;

use crate::{DataLayout, SourceError, progress::StageProgress};

/// One year's traffic-count rows, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearTable {
    pub year: u16,
    pub rows: Vec<SegmentRow>,
}

/// Rows read from one CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRows<T> {
    pub rows: Vec<T>,
    /// Rows that could not be read even after lossy decoding.
    pub skipped: usize,
}

/// Deserializes every row of a CSV file.
///
/// Fields that are not valid UTF-8 are decoded lossily (invalid bytes
/// become U+FFFD) so a stray Latin-1 byte does not drop the row. Rows that
/// still fail are skipped and counted.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if the file cannot be opened or its header
/// cannot be read.
pub fn read_rows<T: DeserializeOwned>(
    path: &Path,
    trim: csv::Trim,
) -> Result<CsvRows<T>, SourceError> {
    let csv_error = |e| SourceError::Csv {
        path: path.display().to_string(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(trim)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = StringRecord::from_byte_record_lossy(reader.byte_headers().map_err(csv_error)?.clone());

    let mut rows = Vec::new();
    let mut skipped = 0;
    let mut lossy = 0_u64;
    for result in reader.byte_records() {
        let parsed = result.and_then(|record| {
            if std::str::from_utf8(record.as_slice()).is_err() {
                lossy += 1;
            }
            StringRecord::from_byte_record_lossy(record).deserialize::<T>(Some(&headers))
        });
        match parsed {
            Ok(row) => rows.push(row),
            Err(e) => {
                log::trace!("  skipping malformed row in {}: {e}", path.display());
                skipped += 1;
            }
        }
    }

    if lossy > 0 {
        log::warn!(
            "Replaced invalid UTF-8 in {lossy} rows of {}",
            path.display()
        );
    }
    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed rows in {}", path.display());
    }
    log::debug!("Read {} rows from {}", rows.len(), path.display());

    Ok(CsvRows { rows, skipped })
}

/// The crash table after parsing.
#[derive(Debug, Clone)]
pub struct CrashTable {
    pub crashes: Vec<CrashEvent>,
    /// Data rows that could not be read at all. They never reach matching.
    pub unreadable_rows: usize,
}

/// Loads the baseline year's traffic-count table.
///
/// # Errors
///
/// Returns [`SourceError::MissingBaseline`] if the table does not exist, or
/// [`SourceError::Csv`] if it cannot be read.
pub fn load_baseline(layout: &DataLayout, year: u16) -> Result<YearTable, SourceError> {
    let path = layout.year_table(year);
    if !path.exists() {
        return Err(SourceError::MissingBaseline {
            year,
            path: path.display().to_string(),
        });
    }

    let rows = read_rows(&path, csv::Trim::None)?.rows;
    log::info!("Loaded {} baseline segments for {year}", rows.len());
    Ok(YearTable { year, rows })
}

/// Loads the traffic-count tables for `years`, skipping any that are
/// missing.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if a table exists but cannot be read.
pub fn load_additional_years(
    layout: &DataLayout,
    years: &[u16],
    progress: &Arc<dyn StageProgress>,
) -> Result<Vec<YearTable>, SourceError> {
    progress.start(years.len() as u64);

    let mut tables = Vec::with_capacity(years.len());
    for &year in years {
        progress.working_on(&format!("traffic counts {year}"));
        let path = layout.year_table(year);

        if path.exists() {
            let rows = read_rows(&path, csv::Trim::None)?.rows;
            log::info!("Loaded {} segments for {year}", rows.len());
            tables.push(YearTable { year, rows });
        } else {
            log::warn!(
                "No traffic-count table for {year} at {}; skipping year",
                path.display()
            );
        }

        progress.done_one();
    }

    progress.finish(&format!("Loaded {} of {} years", tables.len(), years.len()));
    Ok(tables)
}

/// Loads and parses the crash table.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if the file cannot be opened.
pub fn load_crashes(path: &Path) -> Result<CrashTable, SourceError> {
    let table = read_rows(path, csv::Trim::None)?;
    let crashes: Vec<CrashEvent> = table
        .rows
        .into_iter()
        .map(CrashEvent::from_record)
        .collect();

    let unparsed = crashes.iter().filter(|c| c.ref_point.is_none()).count();
    log::info!(
        "Loaded {} crashes from {} ({unparsed} without a usable reference point)",
        crashes.len(),
        path.display()
    );

    Ok(CrashTable {
        crashes,
        unreadable_rows: table.skipped,
    })
}

/// Loads the route metadata table. Header names are trimmed. A missing
/// file yields no rows.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if the file exists but cannot be read.
pub fn load_route_metadata(path: &Path) -> Result<Vec<RouteMetadataRow>, SourceError> {
    if !path.exists() {
        log::warn!(
            "Route metadata not found at {}; segments will have no route names",
            path.display()
        );
        return Ok(Vec::new());
    }

    Ok(read_rows(path, csv::Trim::Headers)?.rows)
}

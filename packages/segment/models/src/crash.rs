//! Crash event records.
//!
//! [`CrashRecord`] mirrors the columns of the crash table so that a matched
//! subset can be written back out unchanged. [`CrashEvent`] is the parsed
//! view used by the matcher.

use serde::{Deserialize, Serialize};

use crate::{normalize_id, parse_milepost};

/// A crash table row as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Corridor the crash was recorded on.
    #[serde(rename = "CORRIDOR", default)]
    pub corridor: Option<String>,
    /// Travel direction code.
    #[serde(rename = "DIR", default)]
    pub direction: Option<String>,
    /// Reference point in `"<integer>+<decimal>"` form.
    #[serde(rename = "REF_POINT", default)]
    pub ref_point: Option<String>,
    #[serde(rename = "SMT_CITY_NAME", default)]
    pub city: Option<String>,
    #[serde(rename = "COUNTY", default)]
    pub county: Option<String>,
    #[serde(rename = "CRASH_MONTH", default)]
    pub crash_month: Option<String>,
    #[serde(rename = "CRASH_YEAR", default)]
    pub crash_year: Option<String>,
    #[serde(rename = "DAY_OF_WEEK", default)]
    pub day_of_week: Option<String>,
    /// State-plane easting.
    #[serde(rename = "SMS_X_CORD", default)]
    pub x_coord: Option<String>,
    /// State-plane northing.
    #[serde(rename = "SMS_Y_CORD", default)]
    pub y_coord: Option<String>,
    #[serde(rename = "LATITUDE", default)]
    pub latitude: Option<String>,
    #[serde(rename = "LONGITUDE", default)]
    pub longitude: Option<String>,
}

/// A crash with its linear-referencing fields parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashEvent {
    /// Normalized corridor id (trimmed, uppercased).
    pub corridor_id: String,
    /// Parsed reference point in miles, `None` when unparsable.
    pub ref_point: Option<f64>,
    /// The source row, kept verbatim for crash-subset exports.
    pub record: CrashRecord,
}

impl CrashEvent {
    /// Parses the linear-referencing fields of a crash row.
    #[must_use]
    pub fn from_record(record: CrashRecord) -> Self {
        Self {
            corridor_id: normalize_id(record.corridor.as_deref().unwrap_or_default()),
            ref_point: parse_milepost(record.ref_point.as_deref()),
            record,
        }
    }

    /// County name, or `"UNKNOWN"` when blank.
    #[must_use]
    pub fn county_or_unknown(&self) -> &str {
        self.record
            .county
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("UNKNOWN")
    }

    /// Crash year as written in the table, trimmed. `None` when blank.
    #[must_use]
    pub fn year(&self) -> Option<&str> {
        self.record
            .crash_year
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

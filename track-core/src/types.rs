//! Shared record types and the service error enum.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// All errors produced by track-core.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

pub type Result<T> = std::result::Result<T, TrackError>;

/// Parse a query timestamp, assuming UTC when no offset is given.
///
/// Accepts RFC 3339 as well as naive `YYYY-MM-DDTHH:MM:SS[.f]` and
/// `YYYY-MM-DD HH:MM:SS` forms.
pub fn parse_utc(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(TrackError::InvalidTimestamp(s.to_string()))
}

// ---------------------------------------------------------------------------
// Collector-side records
// ---------------------------------------------------------------------------

/// One append-only position sample, one per aircraft per poll tick.
///
/// Only built when the feeder reported both coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    pub time: DateTime<Utc>,
    pub icao: String,
    pub flight: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub alt_baro: Option<i32>,
    pub alt_geom: Option<i32>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
    pub baro_rate: Option<i32>,
    pub squawk: Option<String>,
    pub emergency: Option<String>,
    pub category: Option<String>,
    pub nav_altitude_mcp: Option<i32>,
    pub rssi: Option<f64>,
    pub messages: Option<i64>,
    pub seen: Option<f64>,
}

/// One metadata upsert, built when the feeder carried registration, type,
/// or category information for an aircraft.
///
/// Textual fields merge with "keep existing unless replacement is non-null";
/// `is_military` is always overwritten with the latest determination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataUpdate {
    pub icao: String,
    pub registration: Option<String>,
    pub aircraft_type: Option<String>,
    pub type_description: Option<String>,
    pub owner_operator: Option<String>,
    pub year: Option<i32>,
    pub is_military: bool,
}

// ---------------------------------------------------------------------------
// Query-side rows
// ---------------------------------------------------------------------------

/// Flat row from the bulk time-lapse query: one position joined with the
/// aircraft's metadata snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRow {
    pub time: DateTime<Utc>,
    pub icao: String,
    pub flight: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub alt_baro: Option<i32>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
    pub aircraft_type: Option<String>,
    pub registration: Option<String>,
    pub type_description: Option<String>,
    pub is_military: bool,
}

/// A single fix within a shaped per-aircraft track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFix {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<i32>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
}

/// One aircraft's track with its metadata snapshot, for time-lapse output.
#[derive(Debug, Clone, Serialize)]
pub struct AircraftTrack {
    pub icao: String,
    pub flight: Option<String>,
    pub aircraft_type: Option<String>,
    pub registration: Option<String>,
    pub type_description: Option<String>,
    pub is_military: bool,
    pub positions: Vec<TrackFix>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

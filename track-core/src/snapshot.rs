//! Feeder snapshot parsing and normalization.
//!
//! The feeder serves `/data/aircraft.json`: an object with an `aircraft`
//! array of per-transponder state dictionaries (readsb format). Fields are
//! loosely typed upstream — readsb reports `alt_baro` as the string
//! `"ground"` for aircraft on the surface — so numeric fields deserialize
//! leniently instead of failing the whole snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::{MetadataUpdate, PositionRecord};

/// Top-level feeder document.
#[derive(Debug, Clone, Deserialize)]
pub struct FeederSnapshot {
    pub now: Option<f64>,
    #[serde(default)]
    pub aircraft: Vec<FeederAircraft>,
}

/// One aircraft entry from the feeder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeederAircraft {
    pub hex: Option<String>,
    pub flight: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub alt_baro: Option<i32>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub alt_geom: Option<i32>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub baro_rate: Option<i32>,
    pub squawk: Option<String>,
    pub emergency: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub nav_altitude_mcp: Option<i32>,
    pub rssi: Option<f64>,
    pub messages: Option<i64>,
    pub seen: Option<f64>,
    /// Registration (tail number).
    pub r: Option<String>,
    /// Type code.
    pub t: Option<String>,
    /// Type description.
    pub desc: Option<String>,
    #[serde(rename = "ownOp")]
    pub own_op: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub year: Option<i32>,
}

/// Accept numbers and numeric strings; anything else becomes `None`.
fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64().map(|f| f.round() as i32),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }))
}

/// Normalize one feeder snapshot into storable records.
///
/// Entries missing either coordinate or the transponder code are skipped
/// entirely — no partial position records. A metadata upsert is built only
/// when the entry carries registration, type, or category information, with
/// the military determination re-evaluated at that moment via `is_military`.
pub fn normalize_snapshot<F>(
    snapshot: &FeederSnapshot,
    now: DateTime<Utc>,
    is_military: F,
) -> (Vec<PositionRecord>, Vec<MetadataUpdate>)
where
    F: Fn(&str) -> bool,
{
    let mut positions = Vec::new();
    let mut metadata = Vec::new();

    for entry in &snapshot.aircraft {
        let (lat, lon) = match (entry.lat, entry.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => continue,
        };

        let icao = match &entry.hex {
            Some(hex) if !hex.trim().is_empty() => hex.trim().to_ascii_lowercase(),
            _ => continue,
        };

        let flight = entry
            .flight
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from);

        positions.push(PositionRecord {
            time: now,
            icao: icao.clone(),
            flight,
            lat,
            lon,
            alt_baro: entry.alt_baro,
            alt_geom: entry.alt_geom,
            gs: entry.gs,
            track: entry.track,
            baro_rate: entry.baro_rate,
            squawk: entry.squawk.clone(),
            emergency: entry.emergency.clone(),
            category: entry.category.clone(),
            nav_altitude_mcp: entry.nav_altitude_mcp,
            rssi: entry.rssi,
            messages: entry.messages,
            seen: entry.seen,
        });

        if entry.r.is_some() || entry.t.is_some() || entry.category.is_some() {
            metadata.push(MetadataUpdate {
                icao,
                registration: entry.r.clone(),
                aircraft_type: entry.t.clone(),
                type_description: entry.desc.clone(),
                owner_operator: entry.own_op.clone(),
                year: entry.year,
                is_military: is_military(entry.hex.as_deref().unwrap_or("")),
            });
        }
    }

    (positions, metadata)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn parse(json: &str) -> FeederSnapshot {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_skip_entry_missing_lat() {
        let snap = parse(r#"{"aircraft":[{"hex":"abc123","lon":20.0}]}"#);
        let (positions, _) = normalize_snapshot(&snap, at(), |_| false);
        assert!(positions.is_empty());
    }

    #[test]
    fn test_skip_entry_missing_lon() {
        let snap = parse(r#"{"aircraft":[{"hex":"abc123","lat":10.0}]}"#);
        let (positions, _) = normalize_snapshot(&snap, at(), |_| false);
        assert!(positions.is_empty());
    }

    #[test]
    fn test_skip_entry_without_icao() {
        let snap = parse(r#"{"aircraft":[{"lat":10.0,"lon":20.0},{"hex":"  ","lat":1.0,"lon":2.0}]}"#);
        let (positions, metadata) = normalize_snapshot(&snap, at(), |_| false);
        assert!(positions.is_empty());
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_icao_lowercased() {
        let snap = parse(r#"{"aircraft":[{"hex":"ABC123","lat":10.0,"lon":20.0}]}"#);
        let (positions, _) = normalize_snapshot(&snap, at(), |_| false);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].icao, "abc123");
    }

    #[test]
    fn test_flight_trimmed_and_emptied() {
        let snap = parse(
            r#"{"aircraft":[
                {"hex":"a1","lat":1.0,"lon":2.0,"flight":"DAL123  "},
                {"hex":"a2","lat":1.0,"lon":2.0,"flight":"   "}
            ]}"#,
        );
        let (positions, _) = normalize_snapshot(&snap, at(), |_| false);
        assert_eq!(positions[0].flight.as_deref(), Some("DAL123"));
        assert_eq!(positions[1].flight, None);
    }

    #[test]
    fn test_alt_baro_ground_treated_absent() {
        let snap = parse(r#"{"aircraft":[{"hex":"a1","lat":1.0,"lon":2.0,"alt_baro":"ground"}]}"#);
        let (positions, _) = normalize_snapshot(&snap, at(), |_| false);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].alt_baro, None);
    }

    #[test]
    fn test_numeric_string_year_parsed() {
        let snap = parse(
            r#"{"aircraft":[{"hex":"a1","lat":1.0,"lon":2.0,"r":"N12345","year":"1994"}]}"#,
        );
        let (_, metadata) = normalize_snapshot(&snap, at(), |_| false);
        assert_eq!(metadata[0].year, Some(1994));
    }

    #[test]
    fn test_metadata_only_with_reg_type_or_category() {
        let snap = parse(
            r#"{"aircraft":[
                {"hex":"a1","lat":1.0,"lon":2.0},
                {"hex":"a2","lat":1.0,"lon":2.0,"r":"N12345"},
                {"hex":"a3","lat":1.0,"lon":2.0,"t":"B738"},
                {"hex":"a4","lat":1.0,"lon":2.0,"category":"A3"}
            ]}"#,
        );
        let (positions, metadata) = normalize_snapshot(&snap, at(), |_| false);
        assert_eq!(positions.len(), 4);
        let icaos: Vec<_> = metadata.iter().map(|m| m.icao.as_str()).collect();
        assert_eq!(icaos, vec!["a2", "a3", "a4"]);
    }

    #[test]
    fn test_military_determination_applied() {
        let snap = parse(
            r#"{"aircraft":[
                {"hex":"ae01ce","lat":1.0,"lon":2.0,"t":"C17"},
                {"hex":"a1b2c3","lat":1.0,"lon":2.0,"t":"B738"}
            ]}"#,
        );
        let (_, metadata) = normalize_snapshot(&snap, at(), |hex| hex.eq_ignore_ascii_case("ae01ce"));
        assert!(metadata[0].is_military);
        assert!(!metadata[1].is_military);
    }

    #[test]
    fn test_single_aircraft_scenario() {
        // One aircraft with coordinates and registration yields exactly one
        // position and one metadata record, keyed lowercase.
        let snap = parse(
            r#"{"aircraft":[{"hex":"ABC123","lat":10.0,"lon":20.0,"r":"N12345"}]}"#,
        );
        let (positions, metadata) = normalize_snapshot(&snap, at(), |_| false);
        assert_eq!(positions.len(), 1);
        assert_eq!(metadata.len(), 1);
        assert_eq!(positions[0].icao, "abc123");
        assert_eq!(positions[0].lat, 10.0);
        assert_eq!(positions[0].lon, 20.0);
        assert_eq!(metadata[0].icao, "abc123");
        assert_eq!(metadata[0].registration.as_deref(), Some("N12345"));
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = parse(r#"{"now":1700000000.0,"aircraft":[]}"#);
        let (positions, metadata) = normalize_snapshot(&snap, at(), |_| false);
        assert!(positions.is_empty());
        assert!(metadata.is_empty());
    }
}

//! Result shaping for bulk time-lapse responses.

use crate::types::{AircraftTrack, BulkRow, TrackFix};

/// Group flat, (icao, time)-ordered rows into one track per aircraft.
///
/// Position order within a track is preserved from the query's sort.
/// Aircraft with no matching rows simply never appear in the output.
pub fn group_tracks(rows: &[BulkRow]) -> Vec<AircraftTrack> {
    let mut tracks: Vec<AircraftTrack> = Vec::new();

    for row in rows {
        let needs_new = tracks
            .last()
            .map(|t| t.icao != row.icao)
            .unwrap_or(true);
        if needs_new {
            tracks.push(AircraftTrack {
                icao: row.icao.clone(),
                flight: row.flight.clone(),
                aircraft_type: row.aircraft_type.clone(),
                registration: row.registration.clone(),
                type_description: row.type_description.clone(),
                is_military: row.is_military,
                positions: Vec::new(),
            });
        }

        tracks.last_mut().unwrap().positions.push(TrackFix {
            time: row.time,
            lat: row.lat,
            lon: row.lon,
            alt: row.alt_baro,
            gs: row.gs,
            track: row.track,
        });
    }

    tracks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

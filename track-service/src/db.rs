//! TimescaleDB (PostgreSQL) persistence — hypertable, continuous
//! aggregates, and the tiered queries built over them.
//!
//! Schema notes:
//! - `aircraft_positions` is a hypertable, compressed after 7 days with a
//!   90-day retention policy
//! - `aircraft_tracks_1min` / `aircraft_tracks_5min` are continuous
//!   aggregates maintained by the engine; queries reach them only through
//!   [`Tier`], never through runtime-built table names
//! - Connection pooling via `sqlx::PgPool`, bounded by configured min/max

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::warn;

use track_core::tier::Tier;
use track_core::types::{BulkRow, MetadataUpdate, PositionRecord};

use crate::config::Config;

/// Hard cap on the ranked-aircraft limit for bulk queries.
pub const MAX_BULK_TRACKS: i64 = 10_000;

/// Base schema — idempotent, applied on every startup.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS aircraft_positions (
    time TIMESTAMPTZ NOT NULL,
    icao TEXT NOT NULL,
    flight TEXT,
    lat DOUBLE PRECISION NOT NULL,
    lon DOUBLE PRECISION NOT NULL,
    alt_baro INTEGER,
    alt_geom INTEGER,
    gs DOUBLE PRECISION,
    track DOUBLE PRECISION,
    baro_rate INTEGER,
    squawk TEXT,
    emergency TEXT,
    category TEXT,
    nav_altitude_mcp INTEGER,
    rssi DOUBLE PRECISION,
    messages BIGINT,
    seen DOUBLE PRECISION
);

CREATE TABLE IF NOT EXISTS aircraft_metadata (
    icao TEXT PRIMARY KEY,
    registration TEXT,
    aircraft_type TEXT,
    type_description TEXT,
    owner_operator TEXT,
    year INTEGER,
    is_military BOOLEAN DEFAULT FALSE,
    last_seen TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    total_sightings BIGINT NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_positions_icao_time ON aircraft_positions(icao, time DESC);
CREATE INDEX IF NOT EXISTS idx_metadata_military ON aircraft_metadata(is_military);
"#;

/// TimescaleDB-specific setup (hypertable, compression, retention).
const TIMESCALE_SETUP: &str = r#"
SELECT create_hypertable('aircraft_positions', 'time', if_not_exists => TRUE);

ALTER TABLE aircraft_positions SET (
    timescaledb.compress,
    timescaledb.compress_segmentby = 'icao',
    timescaledb.compress_orderby = 'time DESC'
);
SELECT add_compression_policy('aircraft_positions', INTERVAL '7 days', if_not_exists => TRUE);
SELECT add_retention_policy('aircraft_positions', INTERVAL '90 days', if_not_exists => TRUE);
"#;

/// 1-minute downsampled track tier.
const CAGG_1MIN: &str = r#"
CREATE MATERIALIZED VIEW IF NOT EXISTS aircraft_tracks_1min
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('1 minute', time) AS bucket,
    icao,
    last(flight, time) AS flight,
    AVG(lat) AS lat,
    AVG(lon) AS lon,
    AVG(alt_baro)::INTEGER AS alt_baro,
    AVG(gs) AS gs,
    AVG(track) AS track,
    COUNT(*) AS sample_count
FROM aircraft_positions
GROUP BY bucket, icao
WITH NO DATA;

SELECT add_continuous_aggregate_policy('aircraft_tracks_1min',
    start_offset => INTERVAL '1 hour',
    end_offset => INTERVAL '1 minute',
    schedule_interval => INTERVAL '1 minute',
    if_not_exists => TRUE
);
"#;

/// 5-minute downsampled track tier (long-range history).
const CAGG_5MIN: &str = r#"
CREATE MATERIALIZED VIEW IF NOT EXISTS aircraft_tracks_5min
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('5 minutes', time) AS bucket,
    icao,
    last(flight, time) AS flight,
    AVG(lat) AS lat,
    AVG(lon) AS lon,
    AVG(alt_baro)::INTEGER AS alt_baro,
    AVG(gs) AS gs,
    AVG(track) AS track,
    COUNT(*) AS sample_count
FROM aircraft_positions
GROUP BY bucket, icao
WITH NO DATA;

SELECT add_continuous_aggregate_policy('aircraft_tracks_5min',
    start_offset => INTERVAL '2 hours',
    end_offset => INTERVAL '5 minutes',
    schedule_interval => INTERVAL '5 minutes',
    if_not_exists => TRUE
);
"#;

/// Field-level metadata merge: textual fields keep the existing value
/// unless the incoming one is non-null, the military flag is always
/// overwritten, and the sighting count only ever increments.
const METADATA_MERGE: &str = r#" ON CONFLICT (icao) DO UPDATE SET
    registration = COALESCE(EXCLUDED.registration, aircraft_metadata.registration),
    aircraft_type = COALESCE(EXCLUDED.aircraft_type, aircraft_metadata.aircraft_type),
    type_description = COALESCE(EXCLUDED.type_description, aircraft_metadata.type_description),
    owner_operator = COALESCE(EXCLUDED.owner_operator, aircraft_metadata.owner_operator),
    year = COALESCE(EXCLUDED.year, aircraft_metadata.year),
    is_military = EXCLUDED.is_military,
    last_seen = NOW(),
    total_sightings = aircraft_metadata.total_sightings + 1"#;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// One fix in a single-aircraft track response.
#[derive(Debug, Clone, Serialize)]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub alt_baro: Option<i32>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
    pub flight: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UniqueAircraft {
    pub icao: String,
    pub registration: Option<String>,
    pub aircraft_type: Option<String>,
    pub type_description: Option<String>,
    pub owner_operator: Option<String>,
    pub year: Option<i32>,
    pub days_seen: i64,
    pub last_seen: DateTime<Utc>,
    pub total_positions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub unique_aircraft: i64,
    pub total_positions: i64,
    pub first_position: Option<DateTime<Utc>>,
    pub last_position: Option<DateTime<Utc>>,
    pub avg_altitude_ft: Option<i32>,
    pub max_altitude_ft: Option<i32>,
}

/// Parameters of a bulk time-lapse lookup.
#[derive(Debug, Clone)]
pub struct BulkQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tier: Tier,
    pub min_altitude: Option<i32>,
    pub max_altitude: Option<i32>,
    pub military_only: bool,
    pub max_tracks: i64,
}

// ---------------------------------------------------------------------------
// Database handle
// ---------------------------------------------------------------------------

pub struct TrackDb {
    pool: PgPool,
}

impl TrackDb {
    /// Connect the bounded pool and apply schema + tier setup.
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::new()
            .host(&config.db_host)
            .port(config.db_port)
            .database(&config.db_name)
            .username(&config.db_user)
            .password(&config.db_password);

        let pool = PgPoolOptions::new()
            .min_connections(config.pool_min_size)
            .max_connections(config.pool_max_size)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        if let Err(e) = sqlx::raw_sql(TIMESCALE_SETUP).execute(&pool).await {
            warn!(error = %e, "TimescaleDB setup failed (extension may not be installed)");
            warn!("falling back to plain PostgreSQL: no compression, retention, or aggregate tiers");
        }
        if let Err(e) = sqlx::raw_sql(CAGG_1MIN).execute(&pool).await {
            warn!(error = %e, "1-minute aggregate setup failed, tier unavailable");
        }
        if let Err(e) = sqlx::raw_sql(CAGG_5MIN).execute(&pool).await {
            warn!(error = %e, "5-minute aggregate setup failed, tier unavailable");
        }

        Ok(TrackDb { pool })
    }

    /// Wrap an existing pool (tests).
    pub fn from_pool(pool: PgPool) -> Self {
        TrackDb { pool }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Collector writes
    // -----------------------------------------------------------------------

    /// Batch-insert one tick's position records in a single statement.
    pub async fn insert_positions(&self, records: &[PositionRecord]) -> Result<u64, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut builder = positions_insert_builder(records);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Batch-upsert one tick's metadata records in a single statement.
    ///
    /// Callers must not pass two updates for the same icao (one snapshot
    /// never does); PostgreSQL rejects double updates within one statement.
    pub async fn upsert_metadata(&self, updates: &[MetadataUpdate]) -> Result<u64, sqlx::Error> {
        if updates.is_empty() {
            return Ok(0);
        }
        let mut builder = metadata_upsert_builder(updates);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Query paths
    // -----------------------------------------------------------------------

    /// Single-aircraft track from the given tier, ordered by time.
    pub async fn track_positions(
        &self,
        icao: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tier: Tier,
    ) -> Result<Vec<TrackPoint>, sqlx::Error> {
        let sql = track_query_sql(tier);
        let rows = sqlx::query(&sql)
            .bind(icao)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| TrackPoint {
                time: r.get("time"),
                lat: r.get("lat"),
                lon: r.get("lon"),
                alt_baro: r.get("alt_baro"),
                gs: r.get("gs"),
                track: r.get("track"),
                flight: r.get("flight"),
            })
            .collect())
    }

    /// Bulk time-lapse rows: top-N most active aircraft in the window,
    /// joined with metadata, ordered by aircraft then time.
    pub async fn bulk_positions(&self, query: &BulkQuery) -> Result<Vec<BulkRow>, sqlx::Error> {
        let sql = bulk_query_sql(query);
        let mut q = sqlx::query(&sql).bind(query.start).bind(query.end);
        if let Some(min) = query.min_altitude {
            q = q.bind(min);
        }
        if let Some(max) = query.max_altitude {
            q = q.bind(max);
        }
        q = q.bind(query.max_tracks.clamp(1, MAX_BULK_TRACKS));

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|r| BulkRow {
                time: r.get("time"),
                icao: r.get("icao"),
                flight: r.get("flight"),
                lat: r.get("lat"),
                lon: r.get("lon"),
                alt_baro: r.get("alt_baro"),
                gs: r.get("gs"),
                track: r.get("track"),
                aircraft_type: r.get("aircraft_type"),
                registration: r.get("registration"),
                type_description: r.get("type_description"),
                is_military: r.get("is_military"),
            })
            .collect())
    }

    /// Aircraft seen in the window on at least `min_sightings` distinct days.
    pub async fn unique_aircraft(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_sightings: i64,
    ) -> Result<Vec<UniqueAircraft>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                m.icao,
                m.registration,
                m.aircraft_type,
                m.type_description,
                m.owner_operator,
                m.year,
                COUNT(DISTINCT DATE(p.time)) AS days_seen,
                MAX(p.time) AS last_seen,
                COUNT(*) AS total_positions
            FROM aircraft_metadata m
            JOIN aircraft_positions p ON m.icao = p.icao
            WHERE p.time BETWEEN $1 AND $2
            GROUP BY m.icao, m.registration, m.aircraft_type, m.type_description,
                     m.owner_operator, m.year
            HAVING COUNT(DISTINCT DATE(p.time)) >= $3
            ORDER BY days_seen DESC, total_positions DESC
            LIMIT 200
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(min_sightings)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| UniqueAircraft {
                icao: r.get("icao"),
                registration: r.get("registration"),
                aircraft_type: r.get("aircraft_type"),
                type_description: r.get("type_description"),
                owner_operator: r.get("owner_operator"),
                year: r.get("year"),
                days_seen: r.get("days_seen"),
                last_seen: r.get("last_seen"),
                total_positions: r.get("total_positions"),
            })
            .collect())
    }

    /// Summary statistics over the trailing window.
    pub async fn stats_summary(&self, start: DateTime<Utc>) -> Result<StatsSummary, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(DISTINCT icao) AS unique_aircraft,
                COUNT(*) AS total_positions,
                MIN(time) AS first_position,
                MAX(time) AS last_position,
                AVG(alt_baro)::DOUBLE PRECISION AS avg_altitude,
                MAX(alt_baro) AS max_altitude
            FROM aircraft_positions
            WHERE time >= $1 AND alt_baro IS NOT NULL
            "#,
        )
        .bind(start)
        .fetch_one(&self.pool)
        .await?;

        Ok(StatsSummary {
            unique_aircraft: row.get("unique_aircraft"),
            total_positions: row.get("total_positions"),
            first_position: row.get("first_position"),
            last_position: row.get("last_position"),
            avg_altitude_ft: row
                .get::<Option<f64>, _>("avg_altitude")
                .map(|a| a.round() as i32),
            max_altitude_ft: row.get("max_altitude"),
        })
    }
}

// ---------------------------------------------------------------------------
// Statement builders
// ---------------------------------------------------------------------------

fn positions_insert_builder(records: &[PositionRecord]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO aircraft_positions \
         (time, icao, flight, lat, lon, alt_baro, alt_geom, gs, track, \
          baro_rate, squawk, emergency, category, nav_altitude_mcp, rssi, messages, seen) ",
    );
    builder.push_values(records, |mut b, r| {
        b.push_bind(r.time)
            .push_bind(&r.icao)
            .push_bind(&r.flight)
            .push_bind(r.lat)
            .push_bind(r.lon)
            .push_bind(r.alt_baro)
            .push_bind(r.alt_geom)
            .push_bind(r.gs)
            .push_bind(r.track)
            .push_bind(r.baro_rate)
            .push_bind(&r.squawk)
            .push_bind(&r.emergency)
            .push_bind(&r.category)
            .push_bind(r.nav_altitude_mcp)
            .push_bind(r.rssi)
            .push_bind(r.messages)
            .push_bind(r.seen);
    });
    builder
}

fn metadata_upsert_builder(updates: &[MetadataUpdate]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO aircraft_metadata \
         (icao, registration, aircraft_type, type_description, owner_operator, \
          year, is_military, last_seen, total_sightings) ",
    );
    builder.push_values(updates, |mut b, u| {
        b.push_bind(&u.icao)
            .push_bind(&u.registration)
            .push_bind(&u.aircraft_type)
            .push_bind(&u.type_description)
            .push_bind(&u.owner_operator)
            .push_bind(u.year)
            .push_bind(u.is_military)
            .push("NOW()")
            .push("1");
    });
    builder.push(METADATA_MERGE);
    builder
}

fn track_query_sql(tier: Tier) -> String {
    format!(
        "SELECT {col} AS time, lat, lon, alt_baro, gs, track, flight \
         FROM {table} \
         WHERE icao = $1 AND {col} BETWEEN $2 AND $3 \
         ORDER BY {col}",
        col = tier.time_column(),
        table = tier.table(),
    )
}

fn bulk_query_sql(query: &BulkQuery) -> String {
    let col = query.tier.time_column();
    let table = query.tier.table();

    let mut filters = vec![format!("{col} BETWEEN $1 AND $2")];
    let mut idx = 2;
    if query.min_altitude.is_some() {
        idx += 1;
        filters.push(format!("alt_baro >= ${idx}"));
    }
    if query.max_altitude.is_some() {
        idx += 1;
        filters.push(format!("alt_baro <= ${idx}"));
    }
    let where_clause = filters.join(" AND ");

    // Unknown/null metadata is not exclusionary: only an explicit
    // is_military = false filters an aircraft out.
    let (military_join, military_where) = if query.military_only {
        (
            "LEFT JOIN aircraft_metadata mf ON t.icao = mf.icao",
            "AND (mf.is_military = TRUE OR mf.is_military IS NULL)",
        )
    } else {
        ("", "")
    };

    format!(
        "WITH ranked_aircraft AS ( \
            SELECT t.icao, COUNT(*) AS position_count \
            FROM {table} t \
            {military_join} \
            WHERE {where_clause} {military_where} \
            GROUP BY t.icao \
            ORDER BY position_count DESC \
            LIMIT ${limit_idx} \
        ) \
        SELECT \
            p.{col} AS time, p.icao, p.flight, p.lat, p.lon, p.alt_baro, p.gs, p.track, \
            m.aircraft_type, m.registration, m.type_description, \
            COALESCE(m.is_military, FALSE) AS is_military \
        FROM {table} p \
        JOIN ranked_aircraft r ON p.icao = r.icao \
        LEFT JOIN aircraft_metadata m ON p.icao = m.icao \
        WHERE {where_clause} \
        ORDER BY p.icao, p.{col}",
        limit_idx = idx + 1,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

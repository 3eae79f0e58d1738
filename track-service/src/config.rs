//! Environment-sourced daemon configuration.
//!
//! Every setting can also be passed as a CLI flag; the env var names match
//! the deployment's container environment.

use clap::Parser;

const DEFAULT_MILITARY_DB_URL: &str =
    "https://raw.githubusercontent.com/Mictronics/readsb-protobuf/dev/webapp/src/db/aircrafts.json";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "track-service",
    version,
    about = "ADS-B historical track collector and query API"
)]
pub struct Config {
    /// Feeder base URL (readsb/ultrafeeder)
    #[arg(long, env = "FEEDER_URL", default_value = "http://ultrafeeder")]
    pub feeder_url: String,

    /// Seconds between feeder polls
    #[arg(long, env = "COLLECTION_INTERVAL", default_value_t = 5)]
    pub collection_interval: u64,

    /// Military aircraft reference dataset (tar1090-db)
    #[arg(long, env = "MILITARY_DB_URL", default_value = DEFAULT_MILITARY_DB_URL)]
    pub military_db_url: String,

    #[arg(long, env = "DB_HOST", default_value = "timescaledb-adsb")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "DB_NAME", default_value = "adsb_tracks")]
    pub db_name: String,

    #[arg(long, env = "DB_USER", default_value = "adsb")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "")]
    pub db_password: String,

    #[arg(long, env = "POOL_MIN_SIZE", default_value_t = 2)]
    pub pool_min_size: u32,

    #[arg(long, env = "POOL_MAX_SIZE", default_value_t = 20)]
    pub pool_max_size: u32,

    #[arg(long, env = "HTTP_HOST", default_value = "0.0.0.0")]
    pub http_host: String,

    #[arg(long, env = "HTTP_PORT", default_value_t = 8000)]
    pub http_port: u16,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

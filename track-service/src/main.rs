//! track-service: ADS-B position collector and historical track query API.
//!
//! Runs two concurrent pieces over one connection pool: the feeder polling
//! loop and the axum query API. Shutdown is cooperative: SIGINT stops the
//! HTTP server, flips the collector's stop flag, and waits up to a grace
//! period for the in-flight tick before aborting the task.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod collector;
mod config;
mod db;
mod military_db;
mod web;

use collector::Collector;
use config::Config;
use db::TrackDb;
use military_db::MilitaryDb;
use web::AppState;

/// Grace period for the collector's current tick on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::parse();
    info!(
        feeder = %config.feeder_url,
        db_host = %config.db_host,
        "starting track service"
    );

    let db = Arc::new(TrackDb::connect(&config).await.map_err(|e| {
        error!(error = %e, "database connection failed");
        e
    })?);
    let military = Arc::new(MilitaryDb::new(config.military_db_url.clone())?);

    let (stop_tx, stop_rx) = watch::channel(false);
    let collector = Collector::new(
        db.clone(),
        military,
        config.feeder_url.clone(),
        config.collection_interval,
        stop_rx.clone(),
    );
    let mut collector_task = tokio::spawn(collector.run());

    let state = Arc::new(AppState {
        db,
        stop: stop_rx,
    });
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    };
    web::serve(state, &config.http_host, config.http_port, shutdown).await?;

    // Server is down; stop the collector and give its tick time to finish.
    let _ = stop_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut collector_task).await {
        Ok(_) => info!("collector stopped cleanly"),
        Err(_) => {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "collector did not stop within grace period, aborting"
            );
            collector_task.abort();
        }
    }

    info!("track service stopped");
    Ok(())
}

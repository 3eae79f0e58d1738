//! Web server — axum REST API for historical track queries.
//!
//! Shared state is the database handle plus the collector's stop channel,
//! which the health endpoint reads to report collector liveness. CORS is
//! permissive: the service runs on a trusted network.

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::db::TrackDb;

pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub db: Arc<TrackDb>,
    /// Collector stop flag; `false` means the collector loop is running.
    pub stop: watch::Receiver<bool>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", axum::routing::get(routes::root))
        .route("/health", axum::routing::get(routes::health))
        .route(
            "/tracks/bulk/timelapse",
            axum::routing::get(routes::bulk_timelapse),
        )
        .route("/tracks/:icao", axum::routing::get(routes::aircraft_track))
        .route(
            "/aircraft/unique",
            axum::routing::get(routes::unique_aircraft),
        )
        .route("/stats/summary", axum::routing::get(routes::stats_summary))
        .with_state(state)
        .layer(cors)
}

/// Start the web server. Returns when the shutdown signal resolves.
pub async fn serve(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "track API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

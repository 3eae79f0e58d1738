//! Military aircraft reference dataset (Mictronics tar1090-db).
//!
//! A TTL-cached mapping from ICAO hex code to a small descriptor, filtered
//! to entries whose classification flag marks them military. Loads are
//! single-flighted through an atomic compare-and-swap: a caller that finds
//! a load already running returns immediately and proceeds with whatever
//! cache state exists.
//!
//! Failure policy is fail-closed, not fail-stale: any timeout, non-200, or
//! parse error replaces the cache with an empty mapping and still stamps
//! the refresh time, so a persistently broken upstream does not trigger a
//! retry on every tick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, error, info};

/// Classification flag value marking a military airframe in tar1090-db.
const MILITARY_FLAG: &str = "10";

/// A dataset entry: `[tail, type, flag, description?]` keyed by hex code.
#[derive(Debug, Clone, PartialEq)]
pub struct MilitaryAircraft {
    pub tail: String,
    pub type_code: String,
    pub description: String,
}

pub struct MilitaryDb {
    client: reqwest::Client,
    url: String,
    /// `None` until the first load completes; `Some(empty)` after a failed
    /// load. Lookups cannot tell the two apart (both report non-military),
    /// but `is_loaded` can.
    entries: RwLock<Option<HashMap<String, MilitaryAircraft>>>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
    loading: AtomicBool,
}

impl MilitaryDb {
    pub fn new(url: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(50))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(MilitaryDb {
            client,
            url,
            entries: RwLock::new(None),
            last_refresh: RwLock::new(None),
            loading: AtomicBool::new(false),
        })
    }

    /// Refresh the cache if it is older than 24 hours. Returns whether the
    /// cache is usable after the call.
    ///
    /// Never blocks on a concurrent load and never raises: errors are
    /// logged and reported as `false`.
    pub async fn ensure_fresh(&self) -> bool {
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("military database load already in progress");
            return false;
        }

        let usable = self.refresh_if_stale().await;
        self.loading.store(false, Ordering::Release);
        usable
    }

    async fn refresh_if_stale(&self) -> bool {
        if self.is_fresh() {
            debug!("military database cache still valid (< 24h old)");
            return true;
        }

        info!(url = %self.url, "downloading military aircraft database");
        match self.fetch_entries().await {
            Ok(entries) => {
                info!(count = entries.len(), "loaded military aircraft database");
                *self.entries.write().unwrap() = Some(entries);
                *self.last_refresh.write().unwrap() = Some(Utc::now());
                true
            }
            Err(e) => {
                error!(error = %e, "failed to load military aircraft database");
                *self.entries.write().unwrap() = Some(HashMap::new());
                *self.last_refresh.write().unwrap() = Some(Utc::now());
                false
            }
        }
    }

    fn is_fresh(&self) -> bool {
        if self.entries.read().unwrap().is_none() {
            return false;
        }
        match *self.last_refresh.read().unwrap() {
            Some(at) => Utc::now() - at < TimeDelta::hours(24),
            None => false,
        }
    }

    async fn fetch_entries(&self) -> Result<HashMap<String, MilitaryAircraft>, reqwest::Error> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let raw: HashMap<String, Vec<Value>> = response.json().await?;
        Ok(filter_military(raw))
    }

    /// Case-insensitive military lookup.
    ///
    /// Returns `false` both for identifiers absent from the dataset and
    /// when the dataset has never been loaded; callers that care about the
    /// difference can check `is_loaded` first.
    pub fn is_military(&self, hex: &str) -> bool {
        if hex.is_empty() {
            return false;
        }
        self.entries
            .read()
            .unwrap()
            .as_ref()
            .map(|m| m.contains_key(&hex.to_ascii_uppercase()))
            .unwrap_or(false)
    }

    /// Whether any load cycle (successful or failed) has completed.
    pub fn is_loaded(&self) -> bool {
        self.entries.read().unwrap().is_some()
    }

    pub fn entry_count(&self) -> usize {
        self.entries
            .read()
            .unwrap()
            .as_ref()
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

/// Keep only military-flagged entries, keyed by uppercased hex code.
fn filter_military(raw: HashMap<String, Vec<Value>>) -> HashMap<String, MilitaryAircraft> {
    let mut military = HashMap::new();
    for (hex, fields) in raw {
        if fields.len() >= 3 && fields.get(2).and_then(Value::as_str) == Some(MILITARY_FLAG) {
            military.insert(
                hex.to_ascii_uppercase(),
                MilitaryAircraft {
                    tail: str_at(&fields, 0),
                    type_code: str_at(&fields, 1),
                    description: str_at(&fields, 3),
                },
            );
        }
    }
    military
}

fn str_at(fields: &[Value], idx: usize) -> String {
    fields
        .get(idx)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    #[derive(Clone)]
    struct Upstream {
        body: &'static str,
        status: StatusCode,
        delay_ms: u64,
        hits: Arc<AtomicUsize>,
    }

    async fn upstream_handler(State(up): State<Upstream>) -> impl IntoResponse {
        up.hits.fetch_add(1, Ordering::SeqCst);
        if up.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(up.delay_ms)).await;
        }
        (up.status, up.body)
    }

    /// Serve a canned dataset document on an ephemeral local port.
    async fn spawn_upstream(body: &'static str, status: StatusCode, delay_ms: u64) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let upstream = Upstream {
            body,
            status,
            delay_ms,
            hits: hits.clone(),
        };
        let app = Router::new()
            .route("/aircrafts.json", get(upstream_handler))
            .with_state(upstream);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/aircrafts.json"), hits)
    }

    const DATASET: &str = r#"{
        "ae01ce": ["00-0173", "C17", "10", "Boeing C-17A Globemaster III"],
        "A1B2C3": ["N12345", "B738", "00"],
        "AAAAAA": ["N1"]
    }"#;

    #[test]
    fn test_filter_military_flag_and_case() {
        let raw: HashMap<String, Vec<Value>> = serde_json::from_str(DATASET).unwrap();
        let military = filter_military(raw);
        assert_eq!(military.len(), 1);
        let entry = military.get("AE01CE").unwrap();
        assert_eq!(entry.tail, "00-0173");
        assert_eq!(entry.type_code, "C17");
        assert_eq!(entry.description, "Boeing C-17A Globemaster III");
    }

    #[test]
    fn test_filter_military_short_entry_skipped() {
        let raw: HashMap<String, Vec<Value>> =
            serde_json::from_str(r#"{"AAAAAA": ["N1", "C130"]}"#).unwrap();
        assert!(filter_military(raw).is_empty());
    }

    #[test]
    fn test_lookup_before_any_load() {
        let db = MilitaryDb::new("http://127.0.0.1:1/unused".into()).unwrap();
        assert!(!db.is_loaded());
        assert!(!db.is_military("ae01ce"));
        assert!(!db.is_military(""));
    }

    #[tokio::test]
    async fn test_load_filters_and_uppercases() {
        let (url, hits) = spawn_upstream(DATASET, StatusCode::OK, 0).await;
        let db = MilitaryDb::new(url).unwrap();

        assert!(db.ensure_fresh().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(db.is_loaded());
        assert_eq!(db.entry_count(), 1);
        assert!(db.is_military("ae01ce"));
        assert!(db.is_military("AE01CE"));
        assert!(!db.is_military("a1b2c3"));
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let (url, hits) = spawn_upstream(DATASET, StatusCode::OK, 0).await;
        let db = MilitaryDb::new(url).unwrap();

        assert!(db.ensure_fresh().await);
        assert!(db.ensure_fresh().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_200_fails_closed() {
        let (url, hits) = spawn_upstream("oops", StatusCode::INTERNAL_SERVER_ERROR, 0).await;
        let db = MilitaryDb::new(url).unwrap();

        assert!(!db.ensure_fresh().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // Loaded-but-empty: stamped so the next call does not refetch.
        assert!(db.is_loaded());
        assert_eq!(db.entry_count(), 0);
        assert!(!db.is_military("ae01ce"));
        assert!(!db.ensure_fresh().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_fails_closed() {
        let (url, _) = spawn_upstream("definitely not json", StatusCode::OK, 0).await;
        let db = MilitaryDb::new(url).unwrap();

        assert!(!db.ensure_fresh().await);
        assert!(db.is_loaded());
        assert_eq!(db.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_single_flight_concurrent_refresh() {
        let (url, hits) = spawn_upstream(DATASET, StatusCode::OK, 300).await;
        let db = Arc::new(MilitaryDb::new(url).unwrap());

        let slow = {
            let db = db.clone();
            tokio::spawn(async move { db.ensure_fresh().await })
        };
        // Give the first load time to take the flag and block in the fetch.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        let second = db.ensure_fresh().await;
        assert!(!second);
        assert!(started.elapsed() < Duration::from_millis(100));

        assert!(slow.await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

//! The refresh-and-cache engine.
//!
//! Owns the station catalog, the feed source, and the live snapshot, and
//! exposes the read queries. Reads never block on network I/O unless the
//! snapshot has outlived the expiry window, in which case the read runs a
//! synchronous rebuild first.

mod builder;
mod store;
mod timer;

pub use store::SnapshotStore;
pub use timer::{RefreshFn, RefreshTimer};

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::info;

use crate::catalog::StationCatalog;
use crate::domain::{Station, StationRecord};
use crate::feed::{FeedSource, SERVICE_ALERT_FEED, TRIP_FEEDS};

use builder::build_snapshot;

/// How the engine keeps its snapshot fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Reads check the snapshot age and rebuild synchronously when stale.
    Passive,
    /// A background timer rebuilds on a fixed interval.
    Active,
}

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Trip-update feed endpoints, polled independently each cycle.
    pub trip_feeds: Vec<String>,
    /// Service-alerts feed endpoint.
    pub alert_feed: String,
    /// Maximum snapshot age before a read forces a rebuild. Zero disables
    /// the passive staleness check; in active mode this is also the timer
    /// interval.
    pub expires: Duration,
    /// Maximum trains kept per station per direction.
    pub max_trains: usize,
    /// Predictions further than this many minutes out are dropped.
    pub max_minutes: i64,
    /// Whether to fetch and attach service alerts.
    pub service_alerts: bool,
    /// Refresh mode.
    pub mode: RefreshMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trip_feeds: TRIP_FEEDS.iter().map(|s| s.to_string()).collect(),
            alert_feed: SERVICE_ALERT_FEED.to_string(),
            expires: Duration::from_secs(60),
            max_trains: 10,
            max_minutes: 30,
            service_alerts: false,
            mode: RefreshMode::Passive,
        }
    }
}

impl EngineConfig {
    /// Set the expiry window (and active-mode timer interval).
    pub fn with_expires(mut self, expires: Duration) -> Self {
        self.expires = expires;
        self
    }

    /// Set the per-direction train cap.
    pub fn with_max_trains(mut self, max_trains: usize) -> Self {
        self.max_trains = max_trains;
        self
    }

    /// Set the prediction window in minutes.
    pub fn with_max_minutes(mut self, max_minutes: i64) -> Self {
        self.max_minutes = max_minutes;
        self
    }

    /// Enable or disable service-alert retrieval.
    pub fn with_service_alerts(mut self, enabled: bool) -> Self {
        self.service_alerts = enabled;
        self
    }

    /// Set the refresh mode.
    pub fn with_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Errors returned to callers of the query layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown station id: {0}")]
    UnknownStation(String),

    #[error("unknown route: {0}")]
    UnknownRoute(String),
}

struct EngineInner {
    catalog: StationCatalog,
    source: Arc<dyn FeedSource>,
    config: EngineConfig,
    store: SnapshotStore,
    timer: OnceLock<RefreshTimer>,
}

/// The refresh-and-cache engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Build the initial snapshot and, in active mode, start the refresh
    /// timer.
    pub async fn start(
        catalog: StationCatalog,
        source: Arc<dyn FeedSource>,
        config: EngineConfig,
    ) -> Self {
        let now = Utc::now();
        let snapshot = build_snapshot(&catalog, source.as_ref(), &config, now).await;

        let inner = Arc::new(EngineInner {
            catalog,
            source,
            config,
            store: SnapshotStore::new(snapshot),
            timer: OnceLock::new(),
        });
        let engine = Self { inner };

        if engine.inner.config.mode == RefreshMode::Active {
            if engine.inner.config.expires.is_zero() {
                info!("active refresh requested with zero interval, timer not started");
            } else {
                let weak = Arc::downgrade(&engine.inner);
                let refresh: RefreshFn = Arc::new(move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            refresh_now(&inner).await;
                        }
                    }
                    .boxed()
                });
                let timer = RefreshTimer::start(engine.inner.config.expires, refresh);
                let _ = engine.inner.timer.set(timer);
            }
        }

        engine
    }

    /// Rebuild the snapshot now.
    pub async fn refresh(&self) {
        refresh_now(&self.inner).await;
    }

    /// Build timestamp of the current snapshot.
    pub async fn last_update(&self) -> DateTime<Utc> {
        self.inner.store.read().await.built_at()
    }

    /// The `limit` stations nearest to `point` (`[lat, lon]`), closest
    /// first.
    pub async fn get_by_point(&self, point: [f64; 2], limit: usize) -> Vec<StationRecord> {
        self.ensure_fresh().await;
        let snapshot = self.inner.store.read().await;

        let mut stations: Vec<&Station> = snapshot.stations().collect();
        stations.sort_by(|a, b| {
            distance(a.entry().location, point).total_cmp(&distance(b.entry().location, point))
        });

        stations
            .into_iter()
            .take(limit)
            .map(|station| station.serialize())
            .collect()
    }

    /// All stations served by a route, sorted by display name. Route lookup
    /// is case-insensitive; a route absent from the current data is an
    /// error.
    pub async fn get_by_route(&self, route_id: &str) -> Result<Vec<StationRecord>, QueryError> {
        self.ensure_fresh().await;
        let route = route_id.to_uppercase();
        let snapshot = self.inner.store.read().await;

        let stops = snapshot
            .route_stops(&route)
            .ok_or_else(|| QueryError::UnknownRoute(route_id.to_string()))?;

        // A station can serve the route through several stops; emit it once.
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut records = Vec::new();
        for stop_id in stops {
            let Some(station_id) = self.inner.catalog.station_for_stop(stop_id) else {
                continue;
            };
            if !seen.insert(station_id) {
                continue;
            }
            if let Some(station) = snapshot.station(station_id) {
                records.push(station.serialize());
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Stations by id, in input order. An unknown id is an error.
    pub async fn get_by_id(&self, ids: &[String]) -> Result<Vec<StationRecord>, QueryError> {
        self.ensure_fresh().await;
        let snapshot = self.inner.store.read().await;

        ids.iter()
            .map(|id| {
                snapshot
                    .station(id)
                    .map(|station| station.serialize())
                    .ok_or_else(|| QueryError::UnknownStation(id.clone()))
            })
            .collect()
    }

    /// All route ids in the current snapshot, sorted. Never triggers a
    /// refresh.
    pub async fn get_routes(&self) -> Vec<String> {
        self.inner.store.read().await.route_ids()
    }

    async fn ensure_fresh(&self) {
        if self.is_expired().await {
            self.refresh().await;
        }
    }

    /// Whether the snapshot has outlived the expiry window.
    ///
    /// In active mode a healthy-or-restarted timer counts as recovery: a
    /// restart suppresses the staleness check for this call, since the
    /// rebuild it owes will arrive on its own schedule.
    async fn is_expired(&self) -> bool {
        if let Some(timer) = self.inner.timer.get()
            && timer.restart_if_dead()
        {
            return false;
        }

        let expires = self.inner.config.expires;
        if expires.is_zero() {
            return false;
        }

        let age = Utc::now() - self.inner.store.read().await.built_at();
        age.num_milliseconds() > expires.as_millis() as i64
    }
}

async fn refresh_now(inner: &EngineInner) {
    let now = Utc::now();
    let snapshot = build_snapshot(&inner.catalog, inner.source.as_ref(), &inner.config, now).await;
    inner.store.publish(snapshot).await;
}

/// Straight-line distance between two `[lat, lon]` points.
fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dx * dx + dy * dy).sqrt()
}

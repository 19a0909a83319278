//! The published snapshot: the complete derived state of one refresh cycle.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::Station;

/// Route id → the set of stop ids currently served by that route.
pub type RouteIndex = HashMap<String, BTreeSet<String>>;

/// One internally-consistent rebuild result.
///
/// A snapshot is built from scratch on every cycle and published as a unit;
/// it is never mutated after publication. Readers that need to reorder or
/// filter stations work on clones.
#[derive(Debug, Clone)]
pub struct Snapshot {
    stations: HashMap<String, Station>,
    routes: RouteIndex,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        stations: HashMap<String, Station>,
        routes: RouteIndex,
        built_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stations,
            routes,
            built_at,
        }
    }

    /// An empty snapshot, used as the store's value before the first rebuild.
    pub fn empty(built_at: DateTime<Utc>) -> Self {
        Self::new(HashMap::new(), RouteIndex::new(), built_at)
    }

    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.stations.get(station_id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// Stop ids served by a route. The index is keyed by upper-cased ids.
    pub fn route_stops(&self, route_id: &str) -> Option<&BTreeSet<String>> {
        self.routes.get(route_id)
    }

    /// All route ids known to this snapshot, sorted.
    pub fn route_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// When this snapshot was built.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

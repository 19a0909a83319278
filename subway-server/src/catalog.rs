//! Static station catalog.
//!
//! Loaded once at startup from a JSON file and immutable thereafter. The
//! catalog also owns the stop → station index used to resolve feed stop ids
//! during a rebuild.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

/// Errors from loading the station catalog.
///
/// Any of these is fatal: the server cannot run without its catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read stations file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse stations file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One station as it appears in the stations file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    /// Station id (the key in the stations file; filled in during load).
    #[serde(default)]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Geographic coordinate as `[lat, lon]`.
    pub location: [f64; 2],

    /// Stop ids belonging to this station, with their coordinates.
    pub stops: BTreeMap<String, [f64; 2]>,
}

/// The full station catalog plus the stop → station index.
///
/// Both maps are built once and never mutated; per-refresh train and alert
/// state lives on [`crate::domain::Station`], not here.
#[derive(Debug, Clone)]
pub struct StationCatalog {
    stations: HashMap<String, Arc<CatalogEntry>>,
    stops_to_stations: HashMap<String, String>,
}

impl StationCatalog {
    /// Load the catalog from a JSON stations file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let raw: HashMap<String, CatalogEntry> = serde_json::from_str(&contents)?;
        Ok(Self::from_entries(raw))
    }

    /// Build a catalog from already-parsed entries, keyed by station id.
    pub fn from_entries(raw: HashMap<String, CatalogEntry>) -> Self {
        let mut stations = HashMap::with_capacity(raw.len());
        let mut stops_to_stations = HashMap::new();

        for (id, mut entry) in raw {
            entry.id = id.clone();
            for stop_id in entry.stops.keys() {
                stops_to_stations.insert(stop_id.clone(), id.clone());
            }
            stations.insert(id, Arc::new(entry));
        }

        Self {
            stations,
            stops_to_stations,
        }
    }

    /// Look up a station entry by id.
    pub fn get(&self, station_id: &str) -> Option<&Arc<CatalogEntry>> {
        self.stations.get(station_id)
    }

    /// Resolve a feed stop id to its owning station id.
    pub fn station_for_stop(&self, stop_id: &str) -> Option<&str> {
        self.stops_to_stations.get(stop_id).map(String::as_str)
    }

    /// Iterate over all catalog entries.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<CatalogEntry>> {
        self.stations.values()
    }

    /// Number of stations in the catalog.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

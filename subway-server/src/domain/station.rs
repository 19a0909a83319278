//! Per-refresh station state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::CatalogEntry;

/// Travel direction of a train, as encoded in the MTA feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
}

impl Direction {
    /// Parse a direction from its feed character ('N' or 'S').
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Direction::North),
            'S' => Some(Direction::South),
            _ => None,
        }
    }

    /// The single-letter form used in serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
        }
    }
}

/// One predicted arrival at a station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainEntry {
    /// Route id, upper-cased (e.g. "7", "A").
    pub route: String,

    /// Predicted arrival time.
    pub time: DateTime<Utc>,
}

/// What an alert's informed entity matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Stop,
    Route,
}

/// A service alert attached to a station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub header_text: String,
}

/// A catalog station plus the train and alert state from one refresh cycle.
///
/// Invariants (maintained by the mutators here, relied on everywhere else):
/// after [`Station::sort_trains`] each direction holds at most `max_trains`
/// entries in ascending time order, and `routes` is exactly the set of route
/// ids appearing in those entries.
#[derive(Debug, Clone)]
pub struct Station {
    entry: Arc<CatalogEntry>,
    north: Vec<TrainEntry>,
    south: Vec<TrainEntry>,
    routes: BTreeSet<String>,
    alerts: Vec<ServiceAlert>,
    last_update: Option<DateTime<Utc>>,
}

impl Station {
    /// Create a station with empty train and alert state.
    pub fn new(entry: Arc<CatalogEntry>) -> Self {
        Self {
            entry,
            north: Vec::new(),
            south: Vec::new(),
            routes: BTreeSet::new(),
            alerts: Vec::new(),
            last_update: None,
        }
    }

    /// The static catalog entry this station wraps.
    pub fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    /// Append a predicted arrival for one direction.
    ///
    /// `feed_time` is the timestamp of the feed that contributed the train
    /// and becomes the station's `last_update`.
    pub fn add_train(
        &mut self,
        route_id: &str,
        direction: Direction,
        time: DateTime<Utc>,
        feed_time: Option<DateTime<Utc>>,
    ) {
        self.routes.insert(route_id.to_string());
        self.trains_mut(direction).push(TrainEntry {
            route: route_id.to_string(),
            time,
        });
        self.last_update = feed_time;
    }

    /// Attach a service alert, unless one with identical header text is
    /// already present.
    pub fn add_alert(&mut self, kind: AlertKind, header_text: &str) {
        if self.alerts.iter().any(|a| a.header_text == header_text) {
            return;
        }
        self.alerts.push(ServiceAlert {
            kind,
            header_text: header_text.to_string(),
        });
    }

    /// Sort both train lists ascending by time and truncate to `max_trains`,
    /// then recompute the route set from the surviving entries.
    pub fn sort_trains(&mut self, max_trains: usize) {
        for list in [&mut self.north, &mut self.south] {
            list.sort_by_key(|t| t.time);
            list.truncate(max_trains);
        }
        self.routes = self
            .north
            .iter()
            .chain(self.south.iter())
            .map(|t| t.route.clone())
            .collect();
    }

    /// The trains for one direction.
    pub fn trains(&self, direction: Direction) -> &[TrainEntry] {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
        }
    }

    fn trains_mut(&mut self, direction: Direction) -> &mut Vec<TrainEntry> {
        match direction {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
        }
    }

    /// Route ids currently serving this station.
    pub fn routes(&self) -> &BTreeSet<String> {
        &self.routes
    }

    /// Alerts attached this cycle.
    pub fn alerts(&self) -> &[ServiceAlert] {
        &self.alerts
    }

    /// Timestamp of the feed that most recently contributed a train, if any.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Merge the catalog fields and the per-refresh state into one record.
    pub fn serialize(&self) -> StationRecord {
        StationRecord {
            id: self.entry.id.clone(),
            name: self.entry.name.clone(),
            location: self.entry.location,
            stops: self.entry.stops.clone(),
            service_alerts: self.alerts.clone(),
            north: self.north.clone(),
            south: self.south.clone(),
            routes: self.routes.clone(),
            last_update: self.last_update,
        }
    }
}

/// A fully serialized station, as returned by the query layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    pub location: [f64; 2],
    pub stops: BTreeMap<String, [f64; 2]>,
    pub service_alerts: Vec<ServiceAlert>,
    #[serde(rename = "N")]
    pub north: Vec<TrainEntry>,
    #[serde(rename = "S")]
    pub south: Vec<TrainEntry>,
    pub routes: BTreeSet<String>,
    pub last_update: Option<DateTime<Utc>>,
}

//! Core data model: per-refresh station state and the published snapshot.

mod snapshot;
mod station;

pub use snapshot::{RouteIndex, Snapshot};
pub use station::{AlertKind, Direction, ServiceAlert, Station, StationRecord, TrainEntry};

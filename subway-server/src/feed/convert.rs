//! Conversion from raw `gtfs-rt` protobuf structures to decoded records.

use chrono::DateTime;
use gtfs_rt::{FeedMessage, TripDescriptor};

use crate::domain::Direction;

use super::types::{
    ActivePeriod, AlertEntity, FeedData, InformedEntity, StopTimePrediction, Translation,
    TripEntity,
};

/// Convert a decoded protobuf feed into the typed records the builder uses.
pub fn convert_feed(message: FeedMessage) -> FeedData {
    let timestamp = message
        .header
        .timestamp
        .and_then(|t| DateTime::from_timestamp(t as i64, 0));

    let mut trips = Vec::new();
    let mut alerts = Vec::new();

    for entity in message.entity {
        if let Some(trip_update) = entity.trip_update {
            trips.push(convert_trip(&trip_update));
        }
        if let Some(alert) = entity.alert {
            alerts.push(convert_alert(alert));
        }
    }

    FeedData {
        timestamp,
        trips,
        alerts,
    }
}

fn convert_trip(trip_update: &gtfs_rt::TripUpdate) -> TripEntity {
    let stop_times = trip_update
        .stop_time_update
        .iter()
        .filter_map(|update| {
            let stop_id = update.stop_id.clone()?;
            let time = update
                .arrival
                .as_ref()
                .and_then(|event| event.time)
                .or_else(|| update.departure.as_ref().and_then(|event| event.time))?;
            let time = DateTime::from_timestamp(time, 0)?;
            Some(StopTimePrediction { stop_id, time })
        })
        .collect();

    TripEntity {
        route_id: trip_update.trip.route_id.clone().unwrap_or_default(),
        direction: direction_for(&trip_update.trip),
        stop_times,
    }
}

/// Derive the travel direction for a trip.
///
/// MTA trip ids embed the direction in the path token after the ".."
/// separator (e.g. `057150_1..N03R`). Feeds that don't follow that
/// convention fall back to the standard GTFS `direction_id`.
fn direction_for(trip: &TripDescriptor) -> Option<Direction> {
    if let Some(token) = trip
        .trip_id
        .as_deref()
        .and_then(|trip_id| trip_id.split("..").nth(1))
        && let Some(direction) = token.chars().next().and_then(Direction::from_char)
    {
        return Some(direction);
    }

    match trip.direction_id {
        Some(0) => Some(Direction::North),
        Some(1) => Some(Direction::South),
        _ => None,
    }
}

fn convert_alert(alert: gtfs_rt::Alert) -> AlertEntity {
    AlertEntity {
        active_periods: alert
            .active_period
            .iter()
            .map(|period| ActivePeriod {
                start: period.start,
                end: period.end,
            })
            .collect(),
        informed: alert
            .informed_entity
            .into_iter()
            .map(|informed| InformedEntity {
                stop_id: informed.stop_id,
                route_id: informed.route_id,
            })
            .collect(),
        header: alert
            .header_text
            .map(|header| {
                header
                    .translation
                    .into_iter()
                    .map(|t| Translation {
                        language: t.language,
                        text: t.text,
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

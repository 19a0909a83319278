//! Snapshot builder: raw feed entities + station catalog + "now" → Snapshot.
//!
//! Every cycle rebuilds from scratch rather than patching the previous
//! snapshot, so a route that stops serving a station can never leave stale
//! trains behind. Per-endpoint and per-record failures are absorbed here;
//! a cycle always produces a snapshot, possibly with partial data.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogEntry, StationCatalog};
use crate::domain::{AlertKind, RouteIndex, Snapshot, Station};
use crate::feed::{AlertEntity, FeedSource, InformedEntity};

use super::EngineConfig;

/// Alert header language to prefer; plain English is the fallback.
const PREFERRED_ALERT_LANGUAGE: &str = "en-html";

/// Build a new snapshot from the catalog and the configured feeds.
pub(crate) async fn build_snapshot(
    catalog: &StationCatalog,
    source: &dyn FeedSource,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Snapshot {
    let mut stations: HashMap<String, Station> = catalog
        .entries()
        .map(|entry| (entry.id.clone(), Station::new(entry.clone())))
        .collect();
    let mut routes = RouteIndex::new();

    let alerts = if config.service_alerts {
        fetch_active_alerts(source, &config.alert_feed, now).await
    } else {
        Vec::new()
    };

    let max_time = now + chrono::Duration::minutes(config.max_minutes);

    let fetches = config
        .trip_feeds
        .iter()
        .map(|endpoint| async move { (endpoint.as_str(), source.fetch(endpoint).await) });
    let results = futures::future::join_all(fetches).await;

    for (endpoint, result) in results {
        let feed = match result {
            Ok(feed) => feed,
            Err(error) => {
                warn!(endpoint, %error, "trip feed unavailable, skipping this cycle");
                continue;
            }
        };

        for trip in &feed.trips {
            if !trip.is_valid() {
                continue;
            }
            let direction = match trip.direction {
                Some(direction) => direction,
                None => continue,
            };
            let route_id = trip.route_id.to_uppercase();

            for stop_time in &trip.stop_times {
                if stop_time.time < now || stop_time.time > max_time {
                    continue;
                }
                let Some(station_id) = catalog.station_for_stop(&stop_time.stop_id) else {
                    debug!(stop_id = %stop_time.stop_id, "stop not in catalog, skipping");
                    continue;
                };
                if let Some(station) = stations.get_mut(station_id) {
                    station.add_train(&route_id, direction, stop_time.time, feed.timestamp);
                    routes
                        .entry(route_id.clone())
                        .or_default()
                        .insert(stop_time.stop_id.clone());
                }
            }
        }
    }

    for station in stations.values_mut() {
        station.sort_trains(config.max_trains);
    }

    if !alerts.is_empty() {
        attach_alerts(&mut stations, &alerts);
    }

    info!(
        stations = stations.len(),
        routes = routes.len(),
        alerts = alerts.len(),
        "snapshot built"
    );

    Snapshot::new(stations, routes, now)
}

/// Fetch the alerts feed and keep only entities active at `now`.
///
/// A failed fetch degrades to "no alerts this cycle".
async fn fetch_active_alerts(
    source: &dyn FeedSource,
    endpoint: &str,
    now: DateTime<Utc>,
) -> Vec<AlertEntity> {
    match source.fetch(endpoint).await {
        Ok(feed) => {
            let timestamp = now.timestamp() as u64;
            feed.alerts
                .into_iter()
                .filter(|alert| alert.is_active_at(timestamp))
                .collect()
        }
        Err(error) => {
            warn!(endpoint, %error, "alert feed unavailable, no alerts this cycle");
            Vec::new()
        }
    }
}

/// Attach active alerts to the stations they concern.
///
/// Per alert/station pair the informed entities are evaluated in feed order
/// and the first match wins, with the stop check ahead of the route check.
fn attach_alerts(stations: &mut HashMap<String, Station>, alerts: &[AlertEntity]) {
    for station in stations.values_mut() {
        for alert in alerts {
            let Some(text) = alert.header_text(PREFERRED_ALERT_LANGUAGE) else {
                continue;
            };

            for informed in &alert.informed {
                if matches_stop(informed, station.entry()) {
                    station.add_alert(AlertKind::Stop, text);
                    break;
                }
                if let Some(route_id) = &informed.route_id
                    && station.routes().contains(route_id)
                {
                    station.add_alert(AlertKind::Route, text);
                    break;
                }
            }
        }
    }
}

/// Whether an informed entity names one of the station's stops, either
/// exactly or after stripping a trailing direction suffix.
fn matches_stop(informed: &InformedEntity, entry: &CatalogEntry) -> bool {
    let Some(alert_stop) = informed.stop_id.as_deref() else {
        return false;
    };
    let base = alert_stop.trim_end_matches(['N', 'S']);
    entry.stops.keys().any(|stop| stop == alert_stop || stop == base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use crate::domain::Direction;
    use crate::engine::RefreshMode;
    use crate::feed::{ActivePeriod, FeedData, MockFeed, StopTimePrediction, Translation, TripEntity};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn catalog() -> StationCatalog {
        let raw: HashMap<String, CatalogEntry> = HashMap::from([
            (
                "A".to_string(),
                CatalogEntry {
                    id: String::new(),
                    name: "Astor Pl".to_string(),
                    location: [0.0, 0.0],
                    stops: BTreeMap::from([("A1".to_string(), [0.0, 0.0])]),
                },
            ),
            (
                "B".to_string(),
                CatalogEntry {
                    id: String::new(),
                    name: "Bleecker St".to_string(),
                    location: [3.0, 4.0],
                    stops: BTreeMap::from([("B1".to_string(), [3.0, 4.0])]),
                },
            ),
        ]);
        StationCatalog::from_entries(raw)
    }

    fn config() -> EngineConfig {
        EngineConfig {
            trip_feeds: vec!["trips".to_string()],
            alert_feed: "alerts".to_string(),
            expires: std::time::Duration::from_secs(60),
            max_trains: 10,
            max_minutes: 30,
            service_alerts: false,
            mode: RefreshMode::Passive,
        }
    }

    fn trip(route: &str, direction: Direction, stops: &[(&str, i64)]) -> TripEntity {
        TripEntity {
            route_id: route.to_string(),
            direction: Some(direction),
            stop_times: stops
                .iter()
                .map(|(stop_id, offset_secs)| StopTimePrediction {
                    stop_id: stop_id.to_string(),
                    time: now() + chrono::Duration::seconds(*offset_secs),
                })
                .collect(),
        }
    }

    fn trip_feed(trips: Vec<TripEntity>) -> FeedData {
        FeedData {
            timestamp: Some(now()),
            trips,
            alerts: Vec::new(),
        }
    }

    fn alert(periods: Vec<ActivePeriod>, informed: Vec<InformedEntity>, text: &str) -> AlertEntity {
        AlertEntity {
            active_periods: periods,
            informed,
            header: vec![Translation {
                language: Some("en".to_string()),
                text: text.to_string(),
            }],
        }
    }

    fn open_period() -> Vec<ActivePeriod> {
        vec![ActivePeriod {
            start: Some(0),
            end: None,
        }]
    }

    #[tokio::test]
    async fn trains_join_against_catalog() {
        let mock = MockFeed::new().with_feed(
            "trips",
            trip_feed(vec![trip("7", Direction::North, &[("A1", 300)])]),
        );

        let snapshot = build_snapshot(&catalog(), &mock, &config(), now()).await;
        let station = snapshot.station("A").unwrap();

        let north = station.trains(Direction::North);
        assert_eq!(north.len(), 1);
        assert_eq!(north[0].route, "7");
        assert_eq!(north[0].time, now() + chrono::Duration::seconds(300));
        assert_eq!(station.routes().iter().collect::<Vec<_>>(), vec!["7"]);
        assert_eq!(station.last_update(), Some(now()));
        assert_eq!(snapshot.built_at(), now());
    }

    #[tokio::test]
    async fn window_excludes_past_and_distant_predictions() {
        let mock = MockFeed::new().with_feed(
            "trips",
            trip_feed(vec![trip(
                "7",
                Direction::North,
                &[("A1", -60), ("A1", 45 * 60), ("A1", 10 * 60)],
            )]),
        );

        let snapshot = build_snapshot(&catalog(), &mock, &config(), now()).await;
        let north = snapshot.station("A").unwrap().trains(Direction::North);

        // max_minutes = 30: only the 10-minute prediction survives.
        assert_eq!(north.len(), 1);
        assert_eq!(north[0].time, now() + chrono::Duration::seconds(600));
    }

    #[tokio::test]
    async fn unknown_stop_and_invalid_trip_are_skipped() {
        let mut no_direction = trip("7", Direction::North, &[("A1", 300)]);
        no_direction.direction = None;

        let mock = MockFeed::new().with_feed(
            "trips",
            trip_feed(vec![
                no_direction,
                trip("", Direction::North, &[("A1", 300)]),
                trip("7", Direction::North, &[("Z9", 300)]),
            ]),
        );

        let snapshot = build_snapshot(&catalog(), &mock, &config(), now()).await;
        assert!(snapshot.station("A").unwrap().trains(Direction::North).is_empty());
        assert!(snapshot.route_ids().is_empty());
    }

    #[tokio::test]
    async fn failing_endpoint_does_not_abort_others() {
        let mut config = config();
        config.trip_feeds = vec!["down".to_string(), "trips".to_string()];

        let mock = MockFeed::new().with_failure("down").with_feed(
            "trips",
            trip_feed(vec![trip("L", Direction::South, &[("B1", 120)])]),
        );

        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;
        assert_eq!(snapshot.station("B").unwrap().trains(Direction::South).len(), 1);
    }

    #[tokio::test]
    async fn empty_feeds_leave_catalog_fields_untouched() {
        let mock = MockFeed::new().with_feed("trips", FeedData::default());

        let snapshot = build_snapshot(&catalog(), &mock, &config(), now()).await;
        let station = snapshot.station("A").unwrap();

        assert!(station.trains(Direction::North).is_empty());
        assert!(station.trains(Direction::South).is_empty());
        assert!(station.routes().is_empty());
        assert_eq!(station.last_update(), None);
        assert_eq!(station.entry().name, "Astor Pl");
    }

    #[tokio::test]
    async fn route_ids_are_uppercased_and_indexed() {
        let mock = MockFeed::new().with_feed(
            "trips",
            trip_feed(vec![
                trip("l", Direction::North, &[("A1", 300)]),
                trip("L", Direction::South, &[("B1", 400)]),
            ]),
        );

        let snapshot = build_snapshot(&catalog(), &mock, &config(), now()).await;
        assert_eq!(snapshot.route_ids(), vec!["L".to_string()]);

        let stops = snapshot.route_stops("L").unwrap();
        assert!(stops.contains("A1"));
        assert!(stops.contains("B1"));

        // Every indexed stop resolves to a station in the snapshot.
        let catalog = catalog();
        for stop in stops {
            let station_id = catalog.station_for_stop(stop).unwrap();
            assert!(snapshot.station(station_id).is_some());
        }
    }

    #[tokio::test]
    async fn train_lists_sorted_and_truncated() {
        let stops: Vec<(&str, i64)> = vec![("A1", 900), ("A1", 60), ("A1", 600), ("A1", 300)];
        let mut config = config();
        config.max_trains = 2;

        let mock = MockFeed::new()
            .with_feed("trips", trip_feed(vec![trip("7", Direction::North, &stops)]));

        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;
        let north = snapshot.station("A").unwrap().trains(Direction::North);

        assert_eq!(north.len(), 2);
        assert!(north[0].time <= north[1].time);
        assert_eq!(north[0].time, now() + chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn inactive_alerts_are_dropped() {
        let timestamp = now().timestamp() as u64;
        let expired = alert(
            vec![ActivePeriod {
                start: Some(0),
                end: Some(timestamp - 10),
            }],
            vec![InformedEntity {
                stop_id: Some("A1".to_string()),
                route_id: None,
            }],
            "expired works",
        );
        let future = alert(
            vec![ActivePeriod {
                start: Some(timestamp + 1000),
                end: None,
            }],
            vec![InformedEntity {
                stop_id: Some("A1".to_string()),
                route_id: None,
            }],
            "future works",
        );
        let current = alert(
            open_period(),
            vec![InformedEntity {
                stop_id: Some("A1".to_string()),
                route_id: None,
            }],
            "current works",
        );

        let mut config = config();
        config.service_alerts = true;

        let mock = MockFeed::new()
            .with_feed("trips", trip_feed(vec![]))
            .with_feed(
                "alerts",
                FeedData {
                    alerts: vec![expired, future, current],
                    ..Default::default()
                },
            );

        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;
        let alerts = snapshot.station("A").unwrap().alerts();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].header_text, "current works");
        assert_eq!(alerts[0].kind, AlertKind::Stop);
    }

    #[tokio::test]
    async fn alert_stop_match_strips_direction_suffix() {
        let mut config = config();
        config.service_alerts = true;

        let mock = MockFeed::new()
            .with_feed("trips", trip_feed(vec![]))
            .with_feed(
                "alerts",
                FeedData {
                    alerts: vec![alert(
                        open_period(),
                        vec![InformedEntity {
                            stop_id: Some("A1N".to_string()),
                            route_id: None,
                        }],
                        "platform closed",
                    )],
                    ..Default::default()
                },
            );

        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;
        let alerts = snapshot.station("A").unwrap().alerts();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Stop);
        assert!(snapshot.station("B").unwrap().alerts().is_empty());
    }

    #[tokio::test]
    async fn alert_route_match_requires_served_route() {
        let mut config = config();
        config.service_alerts = true;

        let mock = MockFeed::new()
            .with_feed(
                "trips",
                trip_feed(vec![trip("7", Direction::North, &[("A1", 300)])]),
            )
            .with_feed(
                "alerts",
                FeedData {
                    alerts: vec![alert(
                        open_period(),
                        vec![InformedEntity {
                            stop_id: None,
                            route_id: Some("7".to_string()),
                        }],
                        "delays on the 7",
                    )],
                    ..Default::default()
                },
            );

        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;

        let a_alerts = snapshot.station("A").unwrap().alerts();
        assert_eq!(a_alerts.len(), 1);
        assert_eq!(a_alerts[0].kind, AlertKind::Route);

        // B is not served by route 7 this cycle.
        assert!(snapshot.station("B").unwrap().alerts().is_empty());
    }

    #[tokio::test]
    async fn stop_match_wins_over_route_match() {
        let mut config = config();
        config.service_alerts = true;

        // The informed entity names both the stop and a route the station
        // serves; the stop check runs first and wins.
        let mock = MockFeed::new()
            .with_feed(
                "trips",
                trip_feed(vec![trip("7", Direction::North, &[("A1", 300)])]),
            )
            .with_feed(
                "alerts",
                FeedData {
                    alerts: vec![alert(
                        open_period(),
                        vec![InformedEntity {
                            stop_id: Some("A1".to_string()),
                            route_id: Some("7".to_string()),
                        }],
                        "both match",
                    )],
                    ..Default::default()
                },
            );

        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;
        let alerts = snapshot.station("A").unwrap().alerts();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Stop);
    }

    #[tokio::test]
    async fn alerts_without_text_are_skipped_and_feed_failure_degrades() {
        let mut config = config();
        config.service_alerts = true;

        let no_text = AlertEntity {
            active_periods: open_period(),
            informed: vec![InformedEntity {
                stop_id: Some("A1".to_string()),
                route_id: None,
            }],
            header: vec![Translation {
                language: Some("es".to_string()),
                text: "hola".to_string(),
            }],
        };

        let mock = MockFeed::new()
            .with_feed("trips", trip_feed(vec![]))
            .with_feed(
                "alerts",
                FeedData {
                    alerts: vec![no_text],
                    ..Default::default()
                },
            );
        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;
        assert!(snapshot.station("A").unwrap().alerts().is_empty());

        // A failed alert feed degrades to "no alerts this cycle".
        let mock = MockFeed::new()
            .with_feed("trips", trip_feed(vec![]))
            .with_failure("alerts");
        let snapshot = build_snapshot(&catalog(), &mock, &config, now()).await;
        assert!(snapshot.station("A").unwrap().alerts().is_empty());
    }
}

//! Decoded feed records.
//!
//! These are the typed shapes the snapshot builder consumes, produced from
//! the raw `gtfs-rt` protobuf structures by [`super::convert_feed`].

use chrono::{DateTime, Utc};

use crate::domain::Direction;

/// One decoded feed response.
#[derive(Debug, Clone, Default)]
pub struct FeedData {
    /// Feed-level timestamp from the header.
    pub timestamp: Option<DateTime<Utc>>,

    /// Trip-update entities.
    pub trips: Vec<TripEntity>,

    /// Alert entities.
    pub alerts: Vec<AlertEntity>,
}

/// One vehicle's journey with its per-stop predictions.
#[derive(Debug, Clone)]
pub struct TripEntity {
    /// Route id as it appeared in the feed.
    pub route_id: String,

    /// Travel direction, if one could be derived.
    pub direction: Option<Direction>,

    /// Predicted times per stop, in feed order.
    pub stop_times: Vec<StopTimePrediction>,
}

impl TripEntity {
    /// A trip is usable only if it names a route and a direction.
    pub fn is_valid(&self) -> bool {
        !self.route_id.is_empty() && self.direction.is_some()
    }
}

/// A predicted arrival time for one stop on one trip.
#[derive(Debug, Clone)]
pub struct StopTimePrediction {
    pub stop_id: String,
    pub time: DateTime<Utc>,
}

/// A decoded service alert.
#[derive(Debug, Clone, Default)]
pub struct AlertEntity {
    pub active_periods: Vec<ActivePeriod>,
    pub informed: Vec<InformedEntity>,
    pub header: Vec<Translation>,
}

/// An alert validity window. A missing end means open-ended.
#[derive(Debug, Clone, Copy)]
pub struct ActivePeriod {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// A stop and/or route an alert concerns.
#[derive(Debug, Clone, Default)]
pub struct InformedEntity {
    pub stop_id: Option<String>,
    pub route_id: Option<String>,
}

/// One language variant of an alert's header text.
#[derive(Debug, Clone)]
pub struct Translation {
    pub language: Option<String>,
    pub text: String,
}

impl AlertEntity {
    /// Whether any active period contains `timestamp` (unix seconds).
    ///
    /// An alert with no periods at all is considered inactive.
    pub fn is_active_at(&self, timestamp: u64) -> bool {
        self.active_periods.iter().any(|period| {
            period.start.unwrap_or(0) <= timestamp && period.end.is_none_or(|end| end >= timestamp)
        })
    }

    /// Best-available header text: the preferred language if present,
    /// otherwise the plain English translation, otherwise nothing.
    pub fn header_text(&self, preferred: &str) -> Option<&str> {
        let mut english = None;
        for translation in &self.header {
            match translation.language.as_deref() {
                Some(lang) if lang == preferred => return Some(&translation.text),
                Some("en") => english = Some(translation.text.as_str()),
                _ => {}
            }
        }
        english
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert_with_periods(periods: Vec<ActivePeriod>) -> AlertEntity {
        AlertEntity {
            active_periods: periods,
            ..Default::default()
        }
    }

    #[test]
    fn active_period_containment() {
        let alert = alert_with_periods(vec![ActivePeriod {
            start: Some(100),
            end: Some(200),
        }]);
        assert!(!alert.is_active_at(99));
        assert!(alert.is_active_at(100));
        assert!(alert.is_active_at(200));
        assert!(!alert.is_active_at(201));
    }

    #[test]
    fn open_ended_period_never_expires() {
        let alert = alert_with_periods(vec![ActivePeriod {
            start: Some(100),
            end: None,
        }]);
        assert!(alert.is_active_at(1_000_000));
        assert!(!alert.is_active_at(99));
    }

    #[test]
    fn no_periods_means_inactive() {
        let alert = alert_with_periods(vec![]);
        assert!(!alert.is_active_at(100));
    }

    #[test]
    fn any_of_several_periods_suffices() {
        let alert = alert_with_periods(vec![
            ActivePeriod {
                start: Some(10),
                end: Some(20),
            },
            ActivePeriod {
                start: Some(50),
                end: Some(60),
            },
        ]);
        assert!(alert.is_active_at(55));
        assert!(!alert.is_active_at(30));
    }

    #[test]
    fn header_text_prefers_requested_language() {
        let alert = AlertEntity {
            header: vec![
                Translation {
                    language: Some("en".to_string()),
                    text: "plain".to_string(),
                },
                Translation {
                    language: Some("en-html".to_string()),
                    text: "<b>rich</b>".to_string(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(alert.header_text("en-html"), Some("<b>rich</b>"));
    }

    #[test]
    fn header_text_falls_back_to_english() {
        let alert = AlertEntity {
            header: vec![
                Translation {
                    language: Some("es".to_string()),
                    text: "hola".to_string(),
                },
                Translation {
                    language: Some("en".to_string()),
                    text: "hello".to_string(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(alert.header_text("en-html"), Some("hello"));
    }

    #[test]
    fn header_text_absent_when_no_usable_translation() {
        let alert = AlertEntity {
            header: vec![Translation {
                language: Some("es".to_string()),
                text: "hola".to_string(),
            }],
            ..Default::default()
        };
        assert_eq!(alert.header_text("en-html"), None);
    }

    #[test]
    fn trip_validity() {
        let valid = TripEntity {
            route_id: "7".to_string(),
            direction: Some(Direction::North),
            stop_times: vec![],
        };
        assert!(valid.is_valid());

        let no_direction = TripEntity {
            direction: None,
            ..valid.clone()
        };
        assert!(!no_direction.is_valid());

        let no_route = TripEntity {
            route_id: String::new(),
            ..valid
        };
        assert!(!no_route.is_valid());
    }
}

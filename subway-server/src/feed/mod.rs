//! GTFS-realtime feed access.
//!
//! A [`FeedSource`] yields decoded trip-update and alert entities for a named
//! feed endpoint. The production implementation ([`FeedClient`]) fetches
//! protobuf bytes over HTTP and decodes them with the `gtfs-rt` crate;
//! [`MockFeed`] serves canned data for tests and offline development.

mod client;
mod convert;
mod error;
mod mock;
mod types;

pub use client::{FeedClient, FeedClientConfig, SERVICE_ALERT_FEED, TRIP_FEEDS};
pub use convert::convert_feed;
pub use error::FeedError;
pub use mock::MockFeed;
pub use types::{
    ActivePeriod, AlertEntity, FeedData, InformedEntity, StopTimePrediction, Translation,
    TripEntity,
};

use async_trait::async_trait;

/// A source of decoded realtime feed data.
///
/// Implementations may fail per call; the snapshot builder treats a failed
/// fetch as "no data from this endpoint this cycle", never as fatal.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and decode the feed at `endpoint`.
    async fn fetch(&self, endpoint: &str) -> Result<FeedData, FeedError>;
}

//! HTTP GTFS-realtime feed client.

use std::sync::Arc;

use async_trait::async_trait;
use gtfs_rt::FeedMessage;
use prost::Message;
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Semaphore;

use super::convert::convert_feed;
use super::error::FeedError;
use super::types::FeedData;
use super::FeedSource;

/// The MTA trip-update feeds, one per line group.
pub const TRIP_FEEDS: [&str; 8] = [
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs", // 1234567S
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-l", // L
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-nqrw", // NQRW
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-bdfm", // BDFM
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-ace", // ACE
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-si", // SIR
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-jz", // JZ
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-g", // G
];

/// The subway service-alerts feed.
pub const SERVICE_ALERT_FEED: &str =
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/camsys%2Fsubway-alerts";

/// Default maximum concurrent feed requests.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Optional API key, sent as the `x-api-key` header.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_secs: 30,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl FeedClientConfig {
    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the maximum number of concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }
}

/// GTFS-realtime HTTP client.
///
/// Fetches protobuf feed bytes and decodes them into [`FeedData`]. A
/// semaphore bounds how many endpoints are polled at once.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
}

impl FeedClient {
    /// Create a new feed client with the given configuration.
    pub fn new(config: FeedClientConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key
            && let Ok(value) = HeaderValue::from_str(key)
        {
            headers.insert("x-api-key", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, endpoint: &str) -> Result<FeedData, FeedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FeedError::Status { status: 0 })?;

        let response = self.http.get(endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let message = FeedMessage::decode(&*body)?;

        Ok(convert_feed(message))
    }
}

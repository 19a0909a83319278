//! Mock feed source for tests and offline development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::error::FeedError;
use super::types::FeedData;
use super::FeedSource;

/// A [`FeedSource`] serving canned [`FeedData`] keyed by endpoint.
///
/// Endpoints registered with [`MockFeed::with_failure`] return an error,
/// which lets tests exercise the builder's per-endpoint degradation.
#[derive(Debug, Default)]
pub struct MockFeed {
    feeds: HashMap<String, FeedData>,
    failing: HashSet<String>,
    fetch_count: AtomicUsize,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register canned data for an endpoint.
    pub fn with_feed(mut self, endpoint: impl Into<String>, data: FeedData) -> Self {
        self.feeds.insert(endpoint.into(), data);
        self
    }

    /// Make an endpoint fail every fetch.
    pub fn with_failure(mut self, endpoint: impl Into<String>) -> Self {
        self.failing.insert(endpoint.into());
        self
    }

    /// Total number of fetches issued against this mock.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn fetch(&self, endpoint: &str) -> Result<FeedData, FeedError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(endpoint) {
            return Err(FeedError::Status { status: 503 });
        }

        self.feeds
            .get(endpoint)
            .cloned()
            .ok_or(FeedError::Status { status: 404 })
    }
}

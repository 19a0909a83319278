//! Feed client error types.

/// Errors from fetching or decoding a realtime feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed endpoint returned a non-success status code
    #[error("feed returned status {status}")]
    Status { status: u16 },

    /// Protobuf payload could not be decoded
    #[error("failed to decode feed: {0}")]
    Decode(#[from] prost::DecodeError),
}

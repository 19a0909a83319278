//! Response envelopes and error mapping for the web layer.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StationRecord;
use crate::engine::QueryError;

/// Station query response: the matching records plus the snapshot build
/// timestamp they came from.
#[derive(Debug, Serialize)]
pub struct StationsResponse {
    pub data: Vec<StationRecord>,
    pub updated: DateTime<Utc>,
}

/// Route listing response.
#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    pub data: Vec<String>,
    pub updated: DateTime<Utc>,
}

/// Query parameters for the by-location endpoint.
#[derive(Debug, Deserialize)]
pub struct ByLocationQuery {
    pub lat: f64,
    pub lon: f64,
    pub limit: Option<usize>,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug)]
pub enum AppError {
    /// The requested station or route is not in the current data.
    NotFound(String),
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

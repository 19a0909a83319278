//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::engine::Engine;

use super::dto::{AppError, ByLocationQuery, RoutesResponse, StationsResponse};

/// Default and maximum result counts for the by-location endpoint.
const DEFAULT_NEARBY_LIMIT: usize = 5;
const MAX_NEARBY_LIMIT: usize = 10;

/// Create the application router.
pub fn create_router(engine: Engine) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/routes", get(list_routes))
        .route("/by-location", get(by_location))
        .route("/by-route/:route", get(by_route))
        .route("/by-id/:ids", get(by_id))
        .with_state(engine)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// All route ids in the current snapshot.
async fn list_routes(State(engine): State<Engine>) -> Json<RoutesResponse> {
    Json(RoutesResponse {
        data: engine.get_routes().await,
        updated: engine.last_update().await,
    })
}

/// Stations nearest to a point.
async fn by_location(
    State(engine): State<Engine>,
    Query(query): Query<ByLocationQuery>,
) -> Json<StationsResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_NEARBY_LIMIT)
        .min(MAX_NEARBY_LIMIT);
    let data = engine.get_by_point([query.lat, query.lon], limit).await;

    Json(StationsResponse {
        data,
        updated: engine.last_update().await,
    })
}

/// Stations served by a route.
async fn by_route(
    State(engine): State<Engine>,
    Path(route): Path<String>,
) -> Result<Json<StationsResponse>, AppError> {
    let data = engine.get_by_route(&route).await?;

    Ok(Json(StationsResponse {
        data,
        updated: engine.last_update().await,
    }))
}

/// Stations by comma-separated ids.
async fn by_id(
    State(engine): State<Engine>,
    Path(ids): Path<String>,
) -> Result<Json<StationsResponse>, AppError> {
    let ids: Vec<String> = ids.split(',').map(str::to_string).collect();
    let data = engine.get_by_id(&ids).await?;

    Ok(Json(StationsResponse {
        data,
        updated: engine.last_update().await,
    }))
}

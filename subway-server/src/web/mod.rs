//! HTTP query surface over the engine.

mod dto;
mod routes;

pub use dto::{AppError, RoutesResponse, StationsResponse};
pub use routes::create_router;

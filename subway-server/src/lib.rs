//! Realtime subway arrivals server.
//!
//! Polls the MTA GTFS-realtime feeds, joins them against a static station
//! catalog, and serves the resulting snapshot through a small query API.

pub mod catalog;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod web;

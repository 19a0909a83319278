use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use subway_server::catalog::StationCatalog;
use subway_server::engine::{Engine, EngineConfig, RefreshMode};
use subway_server::feed::{FeedClient, FeedClientConfig};
use subway_server::web::create_router;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Catalog load failure is fatal: there is nothing to serve without it.
    let stations_file =
        std::env::var("STATIONS_FILE").unwrap_or_else(|_| "data/stations.json".to_string());
    let catalog = StationCatalog::load(&stations_file)
        .unwrap_or_else(|e| panic!("couldn't load stations file {stations_file}: {e}"));
    info!(stations = catalog.len(), file = %stations_file, "station catalog loaded");

    let mut client_config = FeedClientConfig::default();
    if let Ok(key) = std::env::var("MTA_API_KEY") {
        client_config = client_config.with_api_key(key);
    }
    let client = FeedClient::new(client_config).expect("failed to create feed client");

    let mode = match std::env::var("REFRESH_MODE").as_deref() {
        Ok("active") => RefreshMode::Active,
        _ => RefreshMode::Passive,
    };
    let config = EngineConfig::default()
        .with_expires(Duration::from_secs(env_or("EXPIRES_SECONDS", 60)))
        .with_max_trains(env_or("MAX_TRAINS", 10))
        .with_max_minutes(env_or("MAX_MINUTES", 30))
        .with_service_alerts(env_or("SERVICE_ALERTS", false))
        .with_mode(mode);

    let engine = Engine::start(catalog, Arc::new(client), config).await;
    let app = create_router(engine);

    let port = env_or("PORT", 5000u16);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(%addr, "subway server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app).await.expect("server error");
}

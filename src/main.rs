//! NDVI Dashboard - per-province vegetation index choropleth
//!
//! Loads province boundaries and NDVI statistics once at start-up and serves
//! a single-page map with a dropdown to switch the displayed index.

mod charts;
mod config;
mod data;
mod web;

use config::Config;
use data::Dashboard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;
    let bind_addr = config.bind_address();

    // Inputs are parsed once; a failed load still serves the fallback page
    let dashboard = tokio::task::spawn_blocking({
        let config = config.clone();
        move || Dashboard::load(&config)
    })
    .await?;
    if let Dashboard::Unavailable { reason } = &dashboard {
        tracing::warn!("Serving fallback page: {}", reason);
    }

    let app = web::create_router(AppState::new(dashboard, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("NDVI dashboard running on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

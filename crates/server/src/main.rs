//! Favicon relay entry point.
//!
//! Boots the HTTP relay: `/favicon` icon resolution, `/proxy` CORS relay,
//! `/notion` OAuth passthrough, and `/status` observability. Logging goes
//! to stderr as JSON.

use anyhow::Result;
use iconduit_core::AppConfig;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

mod error;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    tracing::info!(db_path = %config.db_path.display(), "starting favicon relay");

    let state = routes::AppState::new(&config).await?;
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("relay listening on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

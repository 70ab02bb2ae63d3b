//! Claim API Server - evidence search for factual claims
//!
//! Loads the corpus snapshot and models once at startup, then serves
//! `search_claim` over HTTP.

use anyhow::Result;
use claim_api::{router, AppState};
use claim_core::EngineConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claim_api=info".parse()?)
                .add_directive("claim_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = EngineConfig::from_env()?;

    // Initialize application state
    info!("Initializing claim API...");
    let state = Arc::new(AppState::from_config(&config).await?);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting claim API on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

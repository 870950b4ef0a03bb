//! HTTP API
//!
//! - `GET /health`: liveness plus whether the model is loaded
//! - `POST /score/tx`: anomaly and fee-adequacy scores for one transaction
//! - `POST /score/peer`: placeholder peer reliability score
//!
//! All routes allow any origin.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::ml::ModelManager;

pub use handlers::{ApiError, HealthResponse};

pub const SERVICE_NAME: &str = "ai-scorer";

/// Shared request state
pub struct AppState {
    pub models: ModelManager,
}

impl AppState {
    pub fn new(models: ModelManager) -> Self {
        Self { models }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the router with CORS, compression and panic containment
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/score/tx", post(handlers::score_tx))
        .route("/score/peer", post(handlers::score_peer))
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .layer(cors)
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &ServerConfig, state: SharedState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting AI scorer service on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("AI scorer service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

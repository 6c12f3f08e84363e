//! HTTP API: Axum server exposing the lottery.
//!
//! Serves read-only queries and the lottery operations as JSON endpoints.
//! Callers identify themselves with a `caller` field; verifying that claim
//! belongs to whatever sits in front of this service.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{ApiState, AppState};

/// Start the API server.
///
/// Binds the port up front so a bad port fails startup, then serves in a
/// background task.
pub async fn spawn_server(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Queries
        .route("/api/status", get(routes::get_status))
        .route("/api/accounts/:id", get(routes::get_account))
        .route("/api/reconcile", get(routes::get_reconcile))
        // Credits
        .route("/api/faucet", post(routes::post_faucet))
        .route("/api/approve", post(routes::post_approve))
        .route("/api/purchase", post(routes::post_purchase))
        .route("/api/return", post(routes::post_return))
        // Rounds
        .route("/api/open", post(routes::post_open))
        .route("/api/bet", post(routes::post_bet))
        .route("/api/close", post(routes::post_close))
        // Withdrawals
        .route("/api/withdraw/prize", post(routes::post_prize_withdraw))
        .route("/api/withdraw/owner", post(routes::post_owner_withdraw))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Axum-based HTTP/WebSocket server.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{connect_handler, health_handler, status_handler};
use crate::state::AppState;
use crate::ws::ws_handler;

/// Build the full application router, UI included.
pub fn app_router(state: Arc<AppState>) -> Router {
    // API routes are registered first so they take priority over the UI catch-all
    Router::new()
        .route("/connect", post(connect_handler))
        .route("/status/{bot_id}", get(status_handler))
        .route("/health", get(health_handler))
        .route("/ws/{bot_id}", get(ws_handler))
        .with_state(state)
        .merge(voicebridge_web::ui_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the server and run until shutdown.
pub async fn start_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );

    let bots = state.bots.clone();
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Voicebridge listening on {addr}");
    info!("Client UI available at http://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bots.shutdown_all().await;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}

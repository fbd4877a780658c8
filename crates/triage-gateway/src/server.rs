// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use triage_core::TriageError;
use triage_engine::InboxEngine;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<InboxEngine>,
}

/// Server configuration (mirrors `ServerConfig` from triage-config, kept
/// local so the gateway does not depend on the config crate).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the full inbox router. Separated from [`start_server`] so tests
/// can drive it without binding a socket.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::get_public_health));

    let api_routes = Router::new()
        .route("/inbox", get(handlers::get_inbox))
        .route("/inbox/counts", get(handlers::get_counts))
        .route("/inbox/messages", post(handlers::post_message))
        .route("/inbox/{id}", get(handlers::get_conversation))
        .route("/inbox/{id}/read", post(handlers::post_read))
        .route("/inbox/{id}/close", post(handlers::post_close))
        .route("/inbox/{id}/snooze", post(handlers::post_snooze))
        .route("/inbox/{id}/unsnooze", post(handlers::post_unsnooze))
        .route("/inbox/{id}/assign", post(handlers::post_assign))
        .route("/inbox/{id}/reopen", post(handlers::post_reopen))
        .route("/inbox/{id}/convert", post(handlers::post_convert))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Start the inbox HTTP server and serve until the process exits.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), TriageError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TriageError::Server {
            message: format!("failed to bind inbox server to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("inbox server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| TriageError::Server {
            message: format!("inbox server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8320,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("8320"));
    }
}

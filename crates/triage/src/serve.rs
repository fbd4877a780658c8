// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `triage serve` command implementation.
//!
//! Opens the SQLite store, runs pending migrations, wires the inbox
//! engine, and serves the HTTP API until the process is interrupted.

use std::sync::Arc;

use tracing::info;

use triage_config::model::TriageConfig;
use triage_core::TriageError;
use triage_engine::InboxEngine;
use triage_gateway::{GatewayState, ServerConfig};
use triage_storage::Database;

/// Run the `triage serve` command.
pub async fn run_serve(config: TriageConfig) -> Result<(), TriageError> {
    init_tracing(&config.inbox.log_level);

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(path = %config.storage.database_path, "database ready");

    let engine = Arc::new(InboxEngine::new(
        db,
        Arc::new(triage_engine::HtmlPreviewCleaner::new()),
        &config.inbox,
    ));
    let state = GatewayState {
        engine: Arc::clone(&engine),
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    tokio::select! {
        result = triage_gateway::start_server(&server_config, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    engine.database().close().await?;
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("triage={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

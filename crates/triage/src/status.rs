// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `triage status` command implementation.
//!
//! Opens the configured database read path and reports reachability plus
//! current inbox totals, so operators can check the store without
//! starting the server.

use serde::Serialize;

use triage_config::model::TriageConfig;
use triage_core::TriageError;
use triage_engine::InboxEngine;
use triage_storage::Database;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub database_reachable: bool,
    pub server_host: String,
    pub server_port: u16,
    pub total_conversations: Option<i64>,
    pub unread: Option<i64>,
}

/// Run the `triage status` command.
pub async fn run_status(config: &TriageConfig, json: bool) -> Result<(), TriageError> {
    let mut response = StatusResponse {
        database_path: config.storage.database_path.clone(),
        database_reachable: false,
        server_host: config.server.host.clone(),
        server_port: config.server.port,
        total_conversations: None,
        unread: None,
    };

    match Database::open_with(&config.storage.database_path, config.storage.wal_mode).await {
        Ok(db) => {
            let engine = InboxEngine::with_defaults(db);
            let counts = engine.counts(None).await?;
            response.database_reachable = true;
            response.total_conversations = Some(counts.total);
            response.unread = Some(counts.unread);
            engine.database().close().await?;
        }
        Err(e) => {
            tracing::debug!(error = %e, "database unreachable");
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(());
    }

    println!("triage inbox status");
    println!("  database: {}", response.database_path);
    if response.database_reachable {
        println!("  reachable: yes");
        println!(
            "  conversations: {} ({} unread)",
            response.total_conversations.unwrap_or(0),
            response.unread.unwrap_or(0)
        );
    } else {
        println!("  reachable: no");
    }
    println!(
        "  server: {}:{}",
        response.server_host, response.server_port
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_reports_reachable_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = triage_config::load_and_validate_str("").unwrap();
        config.storage.database_path = dir
            .path()
            .join("status.db")
            .to_string_lossy()
            .to_string();

        run_status(&config, true).await.unwrap();
    }
}

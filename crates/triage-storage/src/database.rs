// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use tokio_rusqlite::Connection;
use tracing::debug;

use triage_core::TriageError;

use crate::migrations;

/// Helper to convert tokio_rusqlite errors into `TriageError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> TriageError {
    TriageError::Storage {
        source: Box::new(e),
    }
}

/// Whether an error is SQLite's lock-contention signal.
///
/// Only relevant for multi-process deployments sharing the database file;
/// within one process the single writer thread prevents contention.
pub fn is_busy(e: &tokio_rusqlite::Error) -> bool {
    matches!(
        e,
        tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::DatabaseBusy
                || err.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

/// Handle to the single SQLite connection.
///
/// Wraps one `tokio_rusqlite::Connection`; all query modules and engine
/// transactions go through [`Database::connection`], so every write runs on
/// the one background thread.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled and
    /// run all pending migrations.
    pub async fn open(path: &str) -> Result<Self, TriageError> {
        Self::open_with(path, true).await
    }

    /// Open with an explicit journal-mode choice.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, TriageError> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(tokio_rusqlite::Error::from(e)))?;

        let journal = if wal_mode { "WAL" } else { "DELETE" };
        let pragmas = format!(
            "PRAGMA journal_mode = {journal};
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;"
        );
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(&pragmas)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let migration_result = conn
            .call(|conn| -> Result<Result<(), TriageError>, rusqlite::Error> {
                Ok(migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?;
        migration_result?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL before the handle is dropped.
    pub async fn close(&self) -> Result<(), TriageError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_applies_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("open.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists());

        // All three tables exist after migration.
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('conversations', 'messages', 'cases')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(count, 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        drop(db);

        // Migrations must not re-run or fail on a second open.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("fk.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let result = db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "INSERT INTO messages (id, conversation_id, channel, direction, body, created_at)
                     VALUES ('m1', 'no-such-conversation', 'email', 'inbound', 'x',
                             '2026-01-01T00:00:00.000Z')",
                    [],
                )
            })
            .await;
        assert!(result.is_err(), "orphan message insert should violate FK");

        db.close().await.unwrap();
    }
}

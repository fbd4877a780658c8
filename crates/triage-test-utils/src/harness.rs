// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end inbox testing.
//!
//! `TestHarness` assembles an [`InboxEngine`] over a temp SQLite database
//! so integration tests can drive the full ingest/lifecycle/conversion
//! pipeline without touching the filesystem outside the test sandbox.

use std::sync::Arc;

use triage_core::TriageError;
use triage_engine::InboxEngine;
use triage_storage::Database;

/// A fully wired inbox engine over a throwaway database.
///
/// The temp directory lives as long as the harness; dropping the harness
/// deletes the database.
pub struct TestHarness {
    pub engine: Arc<InboxEngine>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a harness with default engine tuning.
    pub async fn new() -> Result<Self, TriageError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| TriageError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;
        Ok(Self {
            engine: Arc::new(InboxEngine::with_defaults(db)),
            _temp_dir: temp_dir,
        })
    }

    /// Normalize and ingest a raw channel payload, returning the
    /// conversation it landed in.
    pub async fn ingest_payload(
        &self,
        payload: serde_json::Value,
    ) -> Result<triage_core::Conversation, TriageError> {
        let message = triage_engine::normalize(payload)?;
        self.engine.ingest(message).await
    }
}

/// An inbound email payload with the given sender and body.
pub fn email_payload(from_address: &str, subject: &str, body_html: &str) -> serde_json::Value {
    serde_json::json!({
        "channel": "email",
        "from_address": from_address,
        "subject": subject,
        "body_html": body_html,
    })
}

/// An inbound WhatsApp payload with the given sender number and text.
pub fn whatsapp_payload(phone_number: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "channel": "whatsapp",
        "phone_number": phone_number,
        "text": text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_a_working_engine() {
        let harness = TestHarness::new().await.unwrap();
        let conv = harness
            .ingest_payload(email_payload("t@x.com", "Hi", "<p>hello</p>"))
            .await
            .unwrap();
        assert_eq!(conv.message_count, 1);
    }
}

// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Case conversion: escalate a conversation into exactly one case.
//!
//! The case insert and the conversation's `linked_case_id` update commit
//! in the same transaction, and the `cases.conversation_id` UNIQUE
//! constraint backstops the link check, so a conversation can never end
//! up with two cases even under concurrent conversion attempts.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use triage_core::{Case, CaseType, ConversationStatus, Priority, PreviewOptions, TriageError, now_iso};
use triage_storage::database::map_tr_err;
use triage_storage::queries::{cases, conversations, messages};

use crate::InboxEngine;

/// Caller-supplied case fields. Everything is optional; missing fields
/// are filled from the conversation being converted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub case_type: Option<CaseType>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl InboxEngine {
    /// Convert a conversation into a case.
    ///
    /// Fails with [`TriageError::AlreadyConverted`] if the conversation is
    /// already linked to a case, and with [`TriageError::InvalidTransition`]
    /// if it is closed. On success the conversation carries the new case id
    /// in `linked_case_id`; its status and counters are untouched.
    pub async fn convert_to_case(
        &self,
        conversation_id: &str,
        draft: CaseDraft,
    ) -> Result<Case, TriageError> {
        let conversation_id = conversation_id.to_string();
        let cleaner = self.cleaner().clone();

        let outcome = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<Case, TriageError>, rusqlite::Error> {
                    let tx = conn.transaction()?;

                    let Some(conversation) =
                        conversations::get_with_conn(&tx, &conversation_id)?
                    else {
                        return Ok(Err(TriageError::NotFound {
                            entity: "conversation",
                            id: conversation_id,
                        }));
                    };

                    if let Some(case_id) = conversation.linked_case_id {
                        return Ok(Err(TriageError::AlreadyConverted {
                            conversation_id,
                            case_id,
                        }));
                    }
                    if conversation.status == ConversationStatus::Closed {
                        return Ok(Err(TriageError::InvalidTransition {
                            id: conversation_id,
                            status: conversation.status.to_string(),
                            action: "convert",
                        }));
                    }

                    let description = match draft.description {
                        Some(text) => text,
                        None => messages::latest_with_conn(&tx, &conversation_id)?
                            .map(|m| cleaner.clean_preview(&m.body, &PreviewOptions::default()))
                            .unwrap_or_default(),
                    };

                    let case = Case {
                        id: Uuid::new_v4().to_string(),
                        conversation_id: conversation_id.clone(),
                        title: draft.title.unwrap_or(conversation.subject),
                        case_type: draft.case_type.unwrap_or_default(),
                        priority: draft.priority.unwrap_or(conversation.priority),
                        description,
                        created_by: draft.created_by,
                        created_at: now_iso(),
                        status: "open".to_string(),
                    };

                    cases::insert_with_conn(&tx, &case)?;
                    tx.execute(
                        "UPDATE conversations SET linked_case_id = ?1 WHERE id = ?2",
                        rusqlite::params![case.id, conversation_id],
                    )?;
                    tx.commit()?;
                    Ok(Ok(case))
                },
            )
            .await
            .map_err(map_tr_err)?;

        let case = outcome?;
        info!(case_id = %case.id, conversation_id = %case.conversation_id, "conversation escalated to case");
        Ok(case)
    }

    /// The case a conversation was escalated to, if any.
    pub async fn case_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Case>, TriageError> {
        cases::get_case_for_conversation(&self.db, conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use triage_core::{CaseType, Priority, TriageError};
    use triage_storage::Database;

    use super::CaseDraft;
    use crate::InboxEngine;
    use crate::normalizer::normalize;

    async fn engine_with_conversation() -> (InboxEngine, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("convert.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let engine = InboxEngine::with_defaults(db);
        let conv = engine
            .ingest(
                normalize(json!({
                    "channel": "contact_form",
                    "name": "Mia Kron",
                    "email": "mia@example.com",
                    "message": "My order arrived damaged, please help."
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        (engine, conv.id, dir)
    }

    #[tokio::test]
    async fn defaults_come_from_the_conversation() {
        let (engine, id, _dir) = engine_with_conversation().await;
        engine.set_priority(&id, Priority::High).await.unwrap();

        let case = engine.convert_to_case(&id, CaseDraft::default()).await.unwrap();
        assert_eq!(case.title, "Contact form from Mia Kron");
        assert_eq!(case.case_type, CaseType::Other);
        assert_eq!(case.priority, Priority::High);
        assert_eq!(case.description, "My order arrived damaged, please help.");
        assert_eq!(case.status, "open");

        let conv = engine.get_conversation(&id).await.unwrap();
        assert_eq!(conv.linked_case_id.as_deref(), Some(case.id.as_str()));
    }

    #[tokio::test]
    async fn draft_fields_override_defaults() {
        let (engine, id, _dir) = engine_with_conversation().await;
        let case = engine
            .convert_to_case(
                &id,
                CaseDraft {
                    title: Some("Damaged delivery".into()),
                    case_type: Some(CaseType::Complaint),
                    priority: Some(Priority::Urgent),
                    description: Some("Customer photo attached.".into()),
                    created_by: Some("agent-3".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(case.title, "Damaged delivery");
        assert_eq!(case.case_type, CaseType::Complaint);
        assert_eq!(case.priority, Priority::Urgent);
        assert_eq!(case.description, "Customer photo attached.");
        assert_eq!(case.created_by.as_deref(), Some("agent-3"));
    }

    #[tokio::test]
    async fn conversion_happens_at_most_once() {
        let (engine, id, _dir) = engine_with_conversation().await;
        let first = engine.convert_to_case(&id, CaseDraft::default()).await.unwrap();

        let err = engine.convert_to_case(&id, CaseDraft::default()).await.unwrap_err();
        match err {
            TriageError::AlreadyConverted { case_id, .. } => assert_eq!(case_id, first.id),
            other => panic!("expected AlreadyConverted, got {other:?}"),
        }

        let linked = engine.case_for_conversation(&id).await.unwrap().unwrap();
        assert_eq!(linked.id, first.id);
    }

    #[tokio::test]
    async fn closed_and_missing_conversations_are_rejected() {
        let (engine, id, _dir) = engine_with_conversation().await;

        let err = engine
            .convert_to_case("ghost", CaseDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::NotFound { .. }));

        engine.close(&id).await.unwrap();
        let err = engine.convert_to_case(&id, CaseDraft::default()).await.unwrap_err();
        assert!(matches!(err, TriageError::InvalidTransition { .. }));

        // Rejection leaves no orphan case behind.
        assert!(engine.case_for_conversation(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn description_default_is_cleaned_preview_text() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("convert.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let engine = InboxEngine::with_defaults(db);
        let conv = engine
            .ingest(
                normalize(json!({
                    "channel": "email",
                    "from_address": "kai@example.com",
                    "body_html": "<p>The invoice total is <b>wrong</b>.</p>"
                }))
                .unwrap(),
            )
            .await
            .unwrap();

        let case = engine
            .convert_to_case(&conv.id, CaseDraft::default())
            .await
            .unwrap();
        assert!(case.description.contains("The invoice total is"));
        assert!(!case.description.contains('<'));
    }
}

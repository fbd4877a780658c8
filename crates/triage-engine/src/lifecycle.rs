// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle manager: conversation status transitions, snooze scheduling,
//! assignment, and read/unread tracking.
//!
//! Every transition is one transaction: not-found and precondition checks
//! happen against the current row, and a violated precondition rolls the
//! whole transaction back, so transitions never partially apply. Each
//! touch also persists the lazy snooze-wake correction (a snoozed
//! conversation past its wake time becomes open before the requested
//! action runs).

use chrono::DateTime;
use tracing::debug;

use triage_core::{Conversation, ConversationStatus, ReplyStatus, TriageError, now_iso};
use triage_storage::database::map_tr_err;
use triage_storage::queries::conversations::get_with_conn;

use crate::InboxEngine;
use crate::aggregator::reselect;

impl InboxEngine {
    /// Fetch a conversation by id, persisting the snooze-wake correction
    /// if its wake time has passed.
    pub async fn get_conversation(&self, id: &str) -> Result<Conversation, TriageError> {
        self.touch(id, "get", |_tx, _conversation| Ok(Ok(()))).await
    }

    /// Reset the unread counter. Moves an `unread` conversation to `open`;
    /// any other status is left alone. Idempotent.
    pub async fn mark_as_read(&self, id: &str) -> Result<Conversation, TriageError> {
        self.touch(id, "mark_as_read", |tx, conversation| {
            let status = if conversation.status == ConversationStatus::Unread {
                ConversationStatus::Open
            } else {
                conversation.status
            };
            tx.execute(
                "UPDATE conversations SET unread_count = 0, status = ?1 WHERE id = ?2",
                rusqlite::params![status.to_string(), conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Close a conversation. Allowed from any state and idempotent.
    pub async fn close(&self, id: &str) -> Result<Conversation, TriageError> {
        self.touch(id, "close", |tx, conversation| {
            tx.execute(
                "UPDATE conversations SET status = 'closed', snooze_until = NULL WHERE id = ?1",
                rusqlite::params![conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Defer a conversation until `until` (ISO-8601 UTC). Requires a
    /// future wake time and a non-closed conversation.
    pub async fn snooze(&self, id: &str, until: &str) -> Result<Conversation, TriageError> {
        let until = canonicalize_timestamp(until)?;
        self.touch(id, "snooze", move |tx, conversation| {
            if conversation.status == ConversationStatus::Closed {
                return Ok(Err(invalid(&conversation, "snooze")));
            }
            if until <= now_iso() {
                return Ok(Err(TriageError::InvalidTransition {
                    id: conversation.id,
                    status: conversation.status.to_string(),
                    action: "snooze into the past",
                }));
            }
            tx.execute(
                "UPDATE conversations SET status = 'snoozed', snooze_until = ?1 WHERE id = ?2",
                rusqlite::params![until, conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Manually end a snooze before its wake time. Only permitted from
    /// `snoozed`; returns the conversation to `open`.
    pub async fn unsnooze(&self, id: &str) -> Result<Conversation, TriageError> {
        self.touch(id, "unsnooze", |tx, conversation| {
            if conversation.status != ConversationStatus::Snoozed {
                return Ok(Err(invalid(&conversation, "unsnooze")));
            }
            tx.execute(
                "UPDATE conversations SET status = 'open', snooze_until = NULL WHERE id = ?1",
                rusqlite::params![conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Assign the conversation to an agent. Permitted in any non-closed
    /// state; does not change the status.
    pub async fn assign(&self, id: &str, agent_id: &str) -> Result<Conversation, TriageError> {
        let agent_id = agent_id.to_string();
        self.touch(id, "assign", move |tx, conversation| {
            if conversation.status == ConversationStatus::Closed {
                return Ok(Err(invalid(&conversation, "assign")));
            }
            tx.execute(
                "UPDATE conversations SET assigned_to = ?1 WHERE id = ?2",
                rusqlite::params![agent_id, conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Reopen a closed conversation. Only permitted from `closed`.
    pub async fn reopen(&self, id: &str) -> Result<Conversation, TriageError> {
        self.touch(id, "reopen", |tx, conversation| {
            if conversation.status != ConversationStatus::Closed {
                return Ok(Err(invalid(&conversation, "reopen")));
            }
            tx.execute(
                "UPDATE conversations SET status = 'open' WHERE id = ?1",
                rusqlite::params![conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Change triage priority. Permitted in any non-closed state.
    pub async fn set_priority(
        &self,
        id: &str,
        priority: triage_core::Priority,
    ) -> Result<Conversation, TriageError> {
        self.touch(id, "set_priority", move |tx, conversation| {
            if conversation.status == ConversationStatus::Closed {
                return Ok(Err(invalid(&conversation, "set_priority")));
            }
            tx.execute(
                "UPDATE conversations SET priority = ?1 WHERE id = ?2",
                rusqlite::params![priority.to_string(), conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Add a tag. Duplicates are ignored. Permitted in any non-closed state.
    pub async fn add_tag(&self, id: &str, tag: &str) -> Result<Conversation, TriageError> {
        let tag = tag.trim().to_string();
        if tag.is_empty() {
            return Err(TriageError::Validation("tag must not be empty".into()));
        }
        self.touch(id, "add_tag", move |tx, conversation| {
            if conversation.status == ConversationStatus::Closed {
                return Ok(Err(invalid(&conversation, "tag")));
            }
            let mut tags = conversation.tags.clone();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
            tx.execute(
                "UPDATE conversations SET tags = ?1 WHERE id = ?2",
                rusqlite::params![
                    serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string()),
                    conversation.id
                ],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Mark the conversation as not requiring a reply. The mark survives
    /// outbound messages and is cleared by the next inbound one.
    pub async fn mark_no_reply_needed(&self, id: &str) -> Result<Conversation, TriageError> {
        self.touch(id, "mark_no_reply_needed", |tx, conversation| {
            if conversation.status == ConversationStatus::Closed {
                return Ok(Err(invalid(&conversation, "mark_no_reply_needed")));
            }
            tx.execute(
                "UPDATE conversations SET reply_status = ?1 WHERE id = ?2",
                rusqlite::params![ReplyStatus::NoReplyNeeded.to_string(), conversation.id],
            )?;
            Ok(Ok(()))
        })
        .await
    }

    /// Shared transition plumbing: load the row (or `NotFound`), persist
    /// the snooze-wake correction, run the action, and return the updated
    /// row. A domain rejection from the action rolls everything back.
    async fn touch<F>(&self, id: &str, action_name: &'static str, action: F) -> Result<Conversation, TriageError>
    where
        F: FnOnce(
                &rusqlite::Transaction<'_>,
                Conversation,
            ) -> Result<Result<(), TriageError>, rusqlite::Error>
            + Send
            + 'static,
    {
        let id = id.to_string();
        let outcome = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<Conversation, TriageError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let Some(mut conversation) = get_with_conn(&tx, &id)? else {
                        return Ok(Err(TriageError::NotFound {
                            entity: "conversation",
                            id,
                        }));
                    };

                    let now = now_iso();
                    if conversation.effective_status(&now) == ConversationStatus::Open
                        && conversation.status == ConversationStatus::Snoozed
                    {
                        tx.execute(
                            "UPDATE conversations SET status = 'open', snooze_until = NULL
                             WHERE id = ?1",
                            rusqlite::params![conversation.id],
                        )?;
                        conversation.status = ConversationStatus::Open;
                        conversation.snooze_until = None;
                    }

                    match action(&tx, conversation)? {
                        Ok(()) => {
                            let updated = reselect(&tx, &id)?;
                            tx.commit()?;
                            Ok(Ok(updated))
                        }
                        // Dropping the transaction rolls back, including
                        // the wake correction; it will reapply on the next
                        // touch.
                        Err(rejection) => Ok(Err(rejection)),
                    }
                },
            )
            .await
            .map_err(map_tr_err)?;

        let conversation = outcome?;
        debug!(conversation_id = %conversation.id, action = action_name, status = %conversation.status, "transition applied");
        Ok(conversation)
    }
}

fn invalid(conversation: &Conversation, action: &'static str) -> TriageError {
    TriageError::InvalidTransition {
        id: conversation.id.clone(),
        status: conversation.status.to_string(),
        action,
    }
}

/// Parse and reformat a caller-supplied timestamp to the canonical shape.
fn canonicalize_timestamp(value: &str) -> Result<String, TriageError> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|e| TriageError::Validation(format!("invalid timestamp `{value}`: {e}")))?;
    Ok(parsed
        .to_utc()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string())
}

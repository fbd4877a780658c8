// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation aggregator: resolves a normalized message to an existing
//! or new conversation and updates the denormalized summary fields.
//!
//! The whole resolve + append + counter update runs as one SQLite
//! transaction on the single writer thread, so a message can never exist
//! without its owning conversation reflecting it. A bounded retry loop
//! covers lock contention from other processes sharing the database file.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use triage_core::{
    Conversation, ConversationStatus, Direction, Message, ReplyStatus, TriageError, now_iso,
};
use triage_storage::database::{is_busy, map_tr_err};
use triage_storage::queries::conversations::{
    CONVERSATION_COLUMNS, get_with_conn, insert_with_conn, row_to_conversation,
};
use triage_storage::queries::messages;

use crate::InboxEngine;
use crate::normalizer::NormalizedMessage;

impl InboxEngine {
    /// Ingest a normalized message, resolving it to an existing or new
    /// conversation.
    ///
    /// Resolution: a channel-supplied thread id takes precedence and may
    /// match a closed conversation (which reactivates); otherwise the
    /// correlation key (channel + sender identity) is matched against
    /// non-closed conversations; otherwise a new conversation is seeded
    /// from the message.
    pub async fn ingest(&self, message: NormalizedMessage) -> Result<Conversation, TriageError> {
        let correlation_key = correlation_key(&message);
        let mut attempt: u32 = 0;

        loop {
            let message = message.clone();
            let key = correlation_key.clone();
            let result = self
                .db
                .connection()
                .call(
                    move |conn| -> Result<Result<Conversation, TriageError>, rusqlite::Error> {
                        let tx = conn.transaction()?;
                        let resolved = resolve(&tx, &message, &key)?;
                        let conversation = match resolved {
                            Some(existing) => append(&tx, existing, &message)?,
                            None => create(&tx, &message, &key)?,
                        };
                        tx.commit()?;
                        Ok(Ok(conversation))
                    },
                )
                .await;

            match result {
                Ok(outcome) => {
                    let conversation = outcome?;
                    debug!(
                        conversation_id = %conversation.id,
                        channel = %conversation.channel,
                        message_count = conversation.message_count,
                        "message ingested"
                    );
                    return Ok(conversation);
                }
                Err(e) if is_busy(&e) && attempt < self.max_ingest_retries => {
                    attempt += 1;
                    warn!(attempt, "ingest hit a locked database, retrying");
                    tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt))).await;
                }
                Err(e) if is_busy(&e) => {
                    return Err(TriageError::Conflict(format!(
                        "ingest for {correlation_key} still contended after {attempt} retries"
                    )));
                }
                Err(e) => return Err(map_tr_err(e)),
            }
        }
    }

    /// Record an outbound message (an agent reply) on an existing
    /// conversation.
    ///
    /// Updates message bookkeeping and derives `reply_status`, but never
    /// changes the lifecycle status: replying to a closed thread does not
    /// reopen it, only new inbound contact does.
    pub async fn record_outbound(
        &self,
        conversation_id: &str,
        body: &str,
        agent_id: Option<&str>,
    ) -> Result<Conversation, TriageError> {
        let conversation_id = conversation_id.to_string();
        let body = body.to_string();
        let agent_id = agent_id.map(str::to_string);

        let outcome = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<Conversation, TriageError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let Some(existing) = get_with_conn(&tx, &conversation_id)? else {
                        return Ok(Err(TriageError::NotFound {
                            entity: "conversation",
                            id: conversation_id,
                        }));
                    };

                    let mut channel_metadata = serde_json::Map::new();
                    if let Some(agent_id) = agent_id {
                        channel_metadata.insert("agent_id".into(), agent_id.into());
                    }
                    let message = Message {
                        id: Uuid::new_v4().to_string(),
                        conversation_id: existing.id.clone(),
                        channel: existing.channel,
                        direction: Direction::Outbound,
                        body,
                        sender: Default::default(),
                        channel_metadata,
                        created_at: now_iso(),
                    };
                    messages::insert_with_conn(&tx, &message)?;

                    let reply_status = if existing.reply_status == ReplyStatus::NoReplyNeeded {
                        ReplyStatus::NoReplyNeeded
                    } else {
                        ReplyStatus::Replied
                    };
                    tx.execute(
                        "UPDATE conversations SET message_count = message_count + 1,
                             last_message_at = ?1, reply_status = ?2
                         WHERE id = ?3",
                        rusqlite::params![
                            message.created_at,
                            reply_status.to_string(),
                            existing.id
                        ],
                    )?;

                    let updated = reselect(&tx, &existing.id)?;
                    tx.commit()?;
                    Ok(Ok(updated))
                },
            )
            .await
            .map_err(map_tr_err)?;

        let conversation = outcome?;
        debug!(conversation_id = %conversation.id, "outbound message recorded");
        Ok(conversation)
    }
}

/// Correlation key grouping inbound messages: channel + strongest sender
/// identity. A sender with no identity at all gets a unique key so
/// unidentifiable notes never merge.
fn correlation_key(message: &NormalizedMessage) -> String {
    match message.sender.identity() {
        Some(identity) => format!("{}:{}", message.channel, identity),
        None => format!("{}:anon:{}", message.channel, message.id),
    }
}

fn resolve(
    tx: &rusqlite::Transaction<'_>,
    message: &NormalizedMessage,
    key: &str,
) -> rusqlite::Result<Option<Conversation>> {
    if let Some(thread_id) = &message.thread_id {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE thread_id = ?1 ORDER BY created_at DESC LIMIT 1"
        );
        let mut stmt = tx.prepare(&sql)?;
        match stmt.query_row(rusqlite::params![thread_id], row_to_conversation) {
            Ok(conversation) => return Ok(Some(conversation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(e),
        }
    }

    let sql = format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations
         WHERE correlation_key = ?1 AND status != 'closed'
         ORDER BY last_message_at DESC LIMIT 1"
    );
    let mut stmt = tx.prepare(&sql)?;
    match stmt.query_row(rusqlite::params![key], row_to_conversation) {
        Ok(conversation) => Ok(Some(conversation)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn append(
    tx: &rusqlite::Transaction<'_>,
    existing: Conversation,
    message: &NormalizedMessage,
) -> rusqlite::Result<Conversation> {
    let inbound = message.direction == Direction::Inbound;

    // A new inbound message reactivates a closed thread; no other status
    // change happens during aggregation.
    let status = if existing.status == ConversationStatus::Closed && inbound {
        ConversationStatus::Open
    } else {
        existing.status
    };
    let reply_status = if inbound {
        ReplyStatus::AwaitingReply
    } else if existing.reply_status == ReplyStatus::NoReplyNeeded {
        ReplyStatus::NoReplyNeeded
    } else {
        ReplyStatus::Replied
    };
    let unread_increment: i64 = if inbound { 1 } else { 0 };

    tx.execute(
        "UPDATE conversations SET
             status = ?1,
             unread_count = unread_count + ?2,
             message_count = message_count + 1,
             last_message_at = ?3,
             reply_status = ?4,
             sender_name = COALESCE(?5, sender_name),
             sender_email = COALESCE(?6, sender_email),
             sender_phone = COALESCE(?7, sender_phone),
             sender_company = COALESCE(?8, sender_company)
         WHERE id = ?9",
        rusqlite::params![
            status.to_string(),
            unread_increment,
            message.created_at,
            reply_status.to_string(),
            message.sender.name,
            message.sender.email,
            message.sender.phone,
            message.sender.company,
            existing.id,
        ],
    )?;

    messages::insert_with_conn(tx, &to_message(message, &existing.id))?;
    reselect(tx, &existing.id)
}

fn create(
    tx: &rusqlite::Transaction<'_>,
    message: &NormalizedMessage,
    key: &str,
) -> rusqlite::Result<Conversation> {
    let inbound = message.direction == Direction::Inbound;
    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        channel: message.channel,
        sender: message.sender.clone(),
        subject: message.subject.clone(),
        status: if inbound {
            ConversationStatus::Unread
        } else {
            ConversationStatus::Open
        },
        priority: Default::default(),
        unread_count: if inbound { 1 } else { 0 },
        message_count: 1,
        last_message_at: message.created_at.clone(),
        created_at: message.created_at.clone(),
        assigned_to: None,
        snooze_until: None,
        linked_case_id: None,
        tags: vec![],
        reply_status: if inbound {
            ReplyStatus::AwaitingReply
        } else {
            ReplyStatus::Replied
        },
        correlation_key: key.to_string(),
        thread_id: message.thread_id.clone(),
    };
    insert_with_conn(tx, &conversation)?;
    messages::insert_with_conn(tx, &to_message(message, &conversation.id))?;
    Ok(conversation)
}

fn to_message(message: &NormalizedMessage, conversation_id: &str) -> Message {
    Message {
        id: message.id.clone(),
        conversation_id: conversation_id.to_string(),
        channel: message.channel,
        direction: message.direction,
        body: message.body.clone(),
        sender: message.sender.clone(),
        channel_metadata: message.channel_metadata.clone(),
        created_at: message.created_at.clone(),
    }
}

pub(crate) fn reselect(tx: &rusqlite::Transaction<'_>, id: &str) -> rusqlite::Result<Conversation> {
    let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
    tx.query_row(&sql, rusqlite::params![id], row_to_conversation)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use triage_core::{Channel, ConversationStatus, Direction, ReplyStatus};
    use triage_storage::Database;
    use triage_storage::queries::messages::get_messages_for_conversation;

    use crate::InboxEngine;
    use crate::normalizer::normalize;

    async fn engine() -> (InboxEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("agg.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (InboxEngine::with_defaults(db), dir)
    }

    fn email(from: &str, body: &str) -> serde_json::Value {
        json!({ "channel": "email", "from_address": from, "body_html": body })
    }

    #[tokio::test]
    async fn first_inbound_message_seeds_an_unread_conversation() {
        let (engine, _dir) = engine().await;
        let conv = engine.ingest(normalize(email("a@x.com", "hi")).unwrap()).await.unwrap();

        assert_eq!(conv.status, ConversationStatus::Unread);
        assert_eq!(conv.message_count, 1);
        assert_eq!(conv.unread_count, 1);
        assert_eq!(conv.reply_status, ReplyStatus::AwaitingReply);
        assert_eq!(conv.correlation_key, "email:a@x.com");
    }

    #[tokio::test]
    async fn same_sender_same_channel_messages_merge() {
        let (engine, _dir) = engine().await;
        let first = engine.ingest(normalize(email("a@x.com", "one")).unwrap()).await.unwrap();
        let second = engine.ingest(normalize(email("a@x.com", "two")).unwrap()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.message_count, 2);
        assert_eq!(second.unread_count, 2);

        let messages = get_messages_for_conversation(engine.database(), &second.id, None)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn message_count_equals_number_of_ingests() {
        let (engine, _dir) = engine().await;
        let mut last = None;
        for i in 0..5 {
            last = Some(
                engine
                    .ingest(normalize(email("a@x.com", &format!("msg {i}"))).unwrap())
                    .await
                    .unwrap(),
            );
        }
        let conv = last.unwrap();
        assert_eq!(conv.message_count, 5);
        assert_eq!(conv.unread_count, 5);
    }

    #[tokio::test]
    async fn different_channels_never_merge() {
        let (engine, _dir) = engine().await;
        let by_email = engine.ingest(normalize(email("a@x.com", "hi")).unwrap()).await.unwrap();
        let by_form = engine
            .ingest(
                normalize(json!({
                    "channel": "contact_form",
                    "name": "A",
                    "email": "a@x.com",
                    "message": "hi again"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(by_email.id, by_form.id);
        assert_eq!(by_form.channel, Channel::ContactForm);
    }

    #[tokio::test]
    async fn thread_id_takes_precedence_over_sender_key() {
        let (engine, _dir) = engine().await;
        let with_thread = engine
            .ingest(
                normalize(json!({
                    "channel": "email",
                    "from_address": "a@x.com",
                    "body_html": "first",
                    "thread_id": "thr-1"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        // Different sender address, same thread: still the same conversation.
        let reply = engine
            .ingest(
                normalize(json!({
                    "channel": "email",
                    "from_address": "b@y.com",
                    "body_html": "second",
                    "thread_id": "thr-1"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(with_thread.id, reply.id);
        assert_eq!(reply.message_count, 2);
    }

    #[tokio::test]
    async fn closed_conversation_gets_a_fresh_one_for_sender_key_match() {
        let (engine, _dir) = engine().await;
        let first = engine.ingest(normalize(email("a@x.com", "hi")).unwrap()).await.unwrap();
        engine.close(&first.id).await.unwrap();

        let second = engine.ingest(normalize(email("a@x.com", "again")).unwrap()).await.unwrap();
        assert_ne!(first.id, second.id, "sender-key matching skips closed threads");
    }

    #[tokio::test]
    async fn inbound_into_closed_thread_reactivates_it() {
        let (engine, _dir) = engine().await;
        let first = engine
            .ingest(
                normalize(json!({
                    "channel": "email",
                    "from_address": "a@x.com",
                    "body_html": "first",
                    "thread_id": "thr-9"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        engine.close(&first.id).await.unwrap();

        let reopened = engine
            .ingest(
                normalize(json!({
                    "channel": "email",
                    "from_address": "a@x.com",
                    "body_html": "ping",
                    "thread_id": "thr-9"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(reopened.id, first.id);
        assert_eq!(reopened.status, ConversationStatus::Open);
        assert_eq!(reopened.message_count, 2);
    }

    #[tokio::test]
    async fn outbound_recording_flips_reply_status_without_touching_lifecycle() {
        let (engine, _dir) = engine().await;
        let conv = engine.ingest(normalize(email("a@x.com", "hi")).unwrap()).await.unwrap();
        assert_eq!(conv.reply_status, ReplyStatus::AwaitingReply);

        let updated = engine
            .record_outbound(&conv.id, "thanks, on it", Some("agent-1"))
            .await
            .unwrap();
        assert_eq!(updated.reply_status, ReplyStatus::Replied);
        assert_eq!(updated.message_count, 2);
        assert_eq!(updated.unread_count, 1, "outbound never counts as unread");
        assert_eq!(updated.status, ConversationStatus::Unread);

        let messages = get_messages_for_conversation(engine.database(), &conv.id, None)
            .await
            .unwrap();
        assert_eq!(messages[1].direction, Direction::Outbound);
    }

    #[tokio::test]
    async fn record_outbound_on_missing_conversation_is_not_found() {
        let (engine, _dir) = engine().await;
        let err = engine.record_outbound("ghost", "hello?", None).await.unwrap_err();
        assert!(matches!(err, triage_core::TriageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn manual_outbound_ingest_seeds_an_open_replied_conversation() {
        let (engine, _dir) = engine().await;
        let conv = engine
            .ingest(
                normalize(json!({
                    "channel": "manual",
                    "note": "cold-called the customer about their quote",
                    "direction": "outbound",
                    "phone": "+49123"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(conv.status, ConversationStatus::Open);
        assert_eq!(conv.unread_count, 0);
        assert_eq!(conv.reply_status, ReplyStatus::Replied);
    }
}

// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation row mapping, CRUD reads, filtered listing, and counts.
//!
//! The compound read-modify-write operations (ingest, lifecycle
//! transitions, conversion) live in `triage-engine` as single-closure
//! transactions; this module owns the row format and the read-side SQL.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use triage_core::{Channel, Conversation, ConversationStatus, Sender, TriageError};

use crate::database::Database;

/// Column list for every conversation SELECT, in [`row_to_conversation`] order.
pub const CONVERSATION_COLUMNS: &str = "id, channel, sender_name, sender_email, sender_phone, \
     sender_company, subject, status, priority, unread_count, message_count, last_message_at, \
     created_at, assigned_to, snooze_until, linked_case_id, tags, reply_status, correlation_key, \
     thread_id";

/// SQL expression for the status read paths must see: a snoozed
/// conversation past its wake time counts as open. Binds one parameter
/// (current time).
pub const EFFECTIVE_STATUS_SQL: &str = "CASE WHEN status = 'snoozed' AND snooze_until IS NOT NULL \
     AND snooze_until <= ? THEN 'open' ELSE status END";

/// SQL expression for the ordering/display timestamp: a thread that never
/// saw a second message sorts by its original creation time.
pub const EFFECTIVE_TIMESTAMP_SQL: &str =
    "CASE WHEN message_count > 1 THEN last_message_at ELSE created_at END";

fn parse_col<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Map a row selected with [`CONVERSATION_COLUMNS`] to a [`Conversation`].
pub fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let channel: String = row.get(1)?;
    let status: String = row.get(7)?;
    let priority: String = row.get(8)?;
    let tags_json: String = row.get(16)?;
    let reply_status: String = row.get(17)?;
    Ok(Conversation {
        id: row.get(0)?,
        channel: parse_col(1, &channel)?,
        sender: Sender {
            name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            company: row.get(5)?,
        },
        subject: row.get(6)?,
        status: parse_col(7, &status)?,
        priority: parse_col(8, &priority)?,
        unread_count: row.get(9)?,
        message_count: row.get(10)?,
        last_message_at: row.get(11)?,
        created_at: row.get(12)?,
        assigned_to: row.get(13)?,
        snooze_until: row.get(14)?,
        linked_case_id: row.get(15)?,
        tags: serde_json::from_str(&tags_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(16, rusqlite::types::Type::Text, Box::new(e))
        })?,
        reply_status: parse_col(17, &reply_status)?,
        correlation_key: row.get(18)?,
        thread_id: row.get(19)?,
    })
}

/// Insert a conversation row inside an existing transaction.
pub fn insert_with_conn(
    conn: &rusqlite::Connection,
    conversation: &Conversation,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, channel, sender_name, sender_email, sender_phone,
             sender_company, subject, status, priority, unread_count, message_count,
             last_message_at, created_at, assigned_to, snooze_until, linked_case_id, tags,
             reply_status, correlation_key, thread_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20)",
        params![
            conversation.id,
            conversation.channel.to_string(),
            conversation.sender.name,
            conversation.sender.email,
            conversation.sender.phone,
            conversation.sender.company,
            conversation.subject,
            conversation.status.to_string(),
            conversation.priority.to_string(),
            conversation.unread_count,
            conversation.message_count,
            conversation.last_message_at,
            conversation.created_at,
            conversation.assigned_to,
            conversation.snooze_until,
            conversation.linked_case_id,
            serde_json::to_string(&conversation.tags).unwrap_or_else(|_| "[]".to_string()),
            conversation.reply_status.to_string(),
            conversation.correlation_key,
            conversation.thread_id,
        ],
    )?;
    Ok(())
}

/// Fetch a conversation by id inside an existing transaction.
pub fn get_with_conn(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    match stmt.query_row(params![id], row_to_conversation) {
        Ok(conversation) => Ok(Some(conversation)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Get a conversation by id.
pub async fn get_conversation(db: &Database, id: &str) -> Result<Option<Conversation>, TriageError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| get_with_conn(conn, &id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// A listed conversation together with its most recent message body, used
/// by the query service to build preview text.
#[derive(Debug, Clone)]
pub struct ListedConversation {
    pub conversation: Conversation,
    pub latest_body: Option<String>,
}

/// List conversations matching the given filters, most recently active
/// first.
///
/// `statuses` filters on the *effective* status as of `now` (snoozed past
/// wake time matches `open`). `search` is a case-insensitive substring
/// match over sender name/email/company and subject.
pub async fn list_conversations(
    db: &Database,
    statuses: Option<Vec<ConversationStatus>>,
    channel: Option<Channel>,
    search: Option<String>,
    limit: i64,
    now: String,
) -> Result<Vec<ListedConversation>, TriageError> {
    db.connection()
        .call(move |conn| -> Result<Vec<ListedConversation>, rusqlite::Error> {
            let mut sql = format!(
                "SELECT {CONVERSATION_COLUMNS},
                    (SELECT body FROM messages m WHERE m.conversation_id = conversations.id
                     ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS latest_body
                 FROM conversations WHERE 1 = 1"
            );
            let mut bind: Vec<Value> = Vec::new();

            if let Some(statuses) = &statuses {
                let placeholders = vec!["?"; statuses.len()].join(", ");
                sql.push_str(&format!(" AND {EFFECTIVE_STATUS_SQL} IN ({placeholders})"));
                bind.push(Value::Text(now.clone()));
                for status in statuses {
                    bind.push(Value::Text(status.to_string()));
                }
            }
            if let Some(channel) = channel {
                sql.push_str(" AND channel = ?");
                bind.push(Value::Text(channel.to_string()));
            }
            if let Some(term) = &search {
                sql.push_str(
                    " AND (instr(lower(coalesce(sender_name, '')), ?) > 0
                        OR instr(lower(coalesce(sender_email, '')), ?) > 0
                        OR instr(lower(coalesce(sender_company, '')), ?) > 0
                        OR instr(lower(subject), ?) > 0)",
                );
                let needle = term.to_lowercase();
                for _ in 0..4 {
                    bind.push(Value::Text(needle.clone()));
                }
            }
            sql.push_str(&format!(" ORDER BY {EFFECTIVE_TIMESTAMP_SQL} DESC LIMIT ?"));
            bind.push(Value::Integer(limit));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind), |row| {
                let conversation = row_to_conversation(row)?;
                let latest_body: Option<String> = row.get(20)?;
                Ok(ListedConversation {
                    conversation,
                    latest_body,
                })
            })?;
            let mut listed = Vec::new();
            for row in rows {
                listed.push(row?);
            }
            Ok(listed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Per-effective-status, per-channel conversation counts as of `now`.
///
/// Returns `(effective_status, channel, count)` rows; the query service
/// folds them into the badge-count shape. Uses the same effective-status
/// rule as [`list_conversations`] so lists and badges never disagree.
pub async fn count_conversations(
    db: &Database,
    channel: Option<Channel>,
    now: String,
) -> Result<Vec<(String, String, i64)>, TriageError> {
    db.connection()
        .call(move |conn| -> Result<Vec<(String, String, i64)>, rusqlite::Error> {
            let mut sql = format!(
                "SELECT {EFFECTIVE_STATUS_SQL} AS eff_status, channel, COUNT(*)
                 FROM conversations"
            );
            let mut bind: Vec<Value> = vec![Value::Text(now)];
            if let Some(channel) = channel {
                sql.push_str(" WHERE channel = ?");
                bind.push(Value::Text(channel.to_string()));
            }
            sql.push_str(" GROUP BY eff_status, channel");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

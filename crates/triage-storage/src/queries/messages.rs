// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message row mapping and reads. Messages are append-only.

use rusqlite::params;

use triage_core::{Message, Sender, TriageError};

use crate::database::Database;

/// Column list for every message SELECT, in [`row_to_message`] order.
pub const MESSAGE_COLUMNS: &str = "id, conversation_id, channel, direction, body, sender_name, \
     sender_email, sender_phone, sender_company, channel_metadata, created_at";

/// Map a row selected with [`MESSAGE_COLUMNS`] to a [`Message`].
pub fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let channel: String = row.get(2)?;
    let direction: String = row.get(3)?;
    let metadata_json: String = row.get(9)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        channel: channel.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        direction: direction.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        body: row.get(4)?,
        sender: Sender {
            name: row.get(5)?,
            email: row.get(6)?,
            phone: row.get(7)?,
            company: row.get(8)?,
        },
        channel_metadata: serde_json::from_str(&metadata_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: row.get(10)?,
    })
}

/// Insert a message row inside an existing transaction.
///
/// Only ever called from the aggregator's ingest transaction so a message
/// can never exist without its owning conversation reflecting it.
pub fn insert_with_conn(conn: &rusqlite::Connection, message: &Message) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, channel, direction, body, sender_name,
             sender_email, sender_phone, sender_company, channel_metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            message.id,
            message.conversation_id,
            message.channel.to_string(),
            message.direction.to_string(),
            message.body,
            message.sender.name,
            message.sender.email,
            message.sender.phone,
            message.sender.company,
            serde_json::to_string(&message.channel_metadata)
                .unwrap_or_else(|_| "{}".to_string()),
            message.created_at,
        ],
    )?;
    Ok(())
}

/// Fetch the newest message of a conversation inside an existing transaction.
pub fn latest_with_conn(
    conn: &rusqlite::Connection,
    conversation_id: &str,
) -> rusqlite::Result<Option<Message>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    match stmt.query_row(params![conversation_id], row_to_message) {
        Ok(message) => Ok(Some(message)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Get a conversation's messages in chronological order.
pub async fn get_messages_for_conversation(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, TriageError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut messages = Vec::new();
            let sql = match limit {
                Some(_) => format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at ASC, id ASC LIMIT ?2"
                ),
                None => format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at ASC, id ASC"
                ),
            };
            let mut stmt = conn.prepare(&sql)?;
            match limit {
                Some(lim) => {
                    let rows = stmt.query_map(params![conversation_id, lim], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let rows = stmt.query_map(params![conversation_id], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations;
    use tempfile::tempdir;
    use triage_core::{Channel, Conversation, ConversationStatus, Direction, Priority, ReplyStatus};

    async fn setup_db_with_conversation() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let conversation = Conversation {
            id: "c-1".into(),
            channel: Channel::Email,
            sender: Sender {
                email: Some("a@x.com".into()),
                ..Default::default()
            },
            subject: "Hello".into(),
            status: ConversationStatus::Unread,
            priority: Priority::Normal,
            unread_count: 0,
            message_count: 0,
            last_message_at: "2026-01-01T00:00:00.000Z".into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            assigned_to: None,
            snooze_until: None,
            linked_case_id: None,
            tags: vec![],
            reply_status: ReplyStatus::AwaitingReply,
            correlation_key: "email:a@x.com".into(),
            thread_id: None,
        };
        db.connection()
            .call(move |conn| conversations::insert_with_conn(conn, &conversation))
            .await
            .unwrap();
        (db, dir)
    }

    fn make_message(id: &str, direction: Direction, created_at: &str) -> Message {
        let mut channel_metadata = serde_json::Map::new();
        channel_metadata.insert("importance".into(), serde_json::json!("high"));
        Message {
            id: id.to_string(),
            conversation_id: "c-1".into(),
            channel: Channel::Email,
            direction,
            body: format!("<p>body of {id}</p>"),
            sender: Sender {
                email: Some("a@x.com".into()),
                ..Default::default()
            },
            channel_metadata,
            created_at: created_at.to_string(),
        }
    }

    async fn insert(db: &Database, message: Message) {
        db.connection()
            .call(move |conn| insert_with_conn(conn, &message))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn messages_come_back_in_chronological_order_with_metadata() {
        let (db, _dir) = setup_db_with_conversation().await;
        insert(&db, make_message("m2", Direction::Outbound, "2026-01-01T00:00:02.000Z")).await;
        insert(&db, make_message("m1", Direction::Inbound, "2026-01-01T00:00:01.000Z")).await;

        let messages = get_messages_for_conversation(&db, "c-1", None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[0].direction, Direction::Inbound);
        assert_eq!(messages[1].id, "m2");
        assert_eq!(
            messages[0].channel_metadata.get("importance"),
            Some(&serde_json::json!("high"))
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn latest_with_conn_picks_newest() {
        let (db, _dir) = setup_db_with_conversation().await;
        insert(&db, make_message("m1", Direction::Inbound, "2026-01-01T00:00:01.000Z")).await;
        insert(&db, make_message("m2", Direction::Inbound, "2026-01-01T00:00:02.000Z")).await;

        let latest = db
            .connection()
            .call(|conn| latest_with_conn(conn, "c-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, "m2");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn limit_truncates_from_the_start() {
        let (db, _dir) = setup_db_with_conversation().await;
        for i in 0..4 {
            insert(
                &db,
                make_message(
                    &format!("m{i}"),
                    Direction::Inbound,
                    &format!("2026-01-01T00:00:0{i}.000Z"),
                ),
            )
            .await;
        }
        let messages = get_messages_for_conversation(&db, "c-1", Some(2)).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m0");
        db.close().await.unwrap();
    }
}

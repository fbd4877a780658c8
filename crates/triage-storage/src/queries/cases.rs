// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Case row mapping and reads.
//!
//! Case creation is transactional with the owning conversation's
//! `linked_case_id` update and therefore lives in the engine's conversion
//! service; this module owns the row format and the read SQL.

use rusqlite::params;

use triage_core::{Case, TriageError};

use crate::database::Database;

/// Column list for every case SELECT, in [`row_to_case`] order.
pub const CASE_COLUMNS: &str =
    "id, conversation_id, title, case_type, priority, description, created_by, created_at, status";

/// Map a row selected with [`CASE_COLUMNS`] to a [`Case`].
pub fn row_to_case(row: &rusqlite::Row<'_>) -> rusqlite::Result<Case> {
    let case_type: String = row.get(3)?;
    let priority: String = row.get(4)?;
    Ok(Case {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        title: row.get(2)?,
        case_type: case_type.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        priority: priority.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        description: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        status: row.get(8)?,
    })
}

/// Insert a case row inside an existing transaction.
pub fn insert_with_conn(conn: &rusqlite::Connection, case: &Case) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO cases (id, conversation_id, title, case_type, priority, description,
             created_by, created_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            case.id,
            case.conversation_id,
            case.title,
            case.case_type.to_string(),
            case.priority.to_string(),
            case.description,
            case.created_by,
            case.created_at,
            case.status,
        ],
    )?;
    Ok(())
}

/// Get a case by id.
pub async fn get_case(db: &Database, id: &str) -> Result<Option<Case>, TriageError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![id], row_to_case) {
                Ok(case) => Ok(Some(case)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the case escalated from a conversation, if any.
pub async fn get_case_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<Case>, TriageError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {CASE_COLUMNS} FROM cases WHERE conversation_id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![conversation_id], row_to_case) {
                Ok(case) => Ok(Some(case)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all cases, newest first.
pub async fn list_cases(db: &Database) -> Result<Vec<Case>, TriageError> {
    db.connection()
        .call(|conn| {
            let sql = format!("SELECT {CASE_COLUMNS} FROM cases ORDER BY created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_case)?;
            let mut cases = Vec::new();
            for row in rows {
                cases.push(row?);
            }
            Ok(cases)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

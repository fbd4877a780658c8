// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the inbox REST API.
//!
//! Thin translation layer: parse query/body, call the engine, map
//! [`TriageError`] variants onto status codes. No inbox logic lives here.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use triage_core::{Channel, ConversationStatus, TriageError};
use triage_engine::{CaseDraft, InboxFilter, StatusFilter};

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Query parameters for GET /inbox.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Status filter: a status name, a comma-separated list, or `active`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Request body for POST /inbox/{id}/snooze.
#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    /// ISO-8601 UTC wake time, must be in the future.
    pub until: String,
}

/// Request body for POST /inbox/{id}/assign.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub agent_id: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Map engine errors onto HTTP status codes. Rejections carry the
/// specific reason string so the caller can tell a closed thread from an
/// already-converted one.
fn error_response(err: TriageError) -> Response {
    let status = match &err {
        TriageError::Validation(_) | TriageError::UnsupportedChannel(_) => StatusCode::BAD_REQUEST,
        TriageError::NotFound { .. } => StatusCode::NOT_FOUND,
        TriageError::InvalidTransition { .. } | TriageError::AlreadyConverted { .. } => {
            StatusCode::CONFLICT
        }
        TriageError::Conflict(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn parse_status_filter(raw: &str) -> Result<StatusFilter, TriageError> {
    if raw.eq_ignore_ascii_case("active") {
        return Ok(StatusFilter::Active);
    }
    let statuses = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ConversationStatus::from_str(s)
                .map_err(|_| TriageError::Validation(format!("unknown status: {s}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if statuses.is_empty() {
        return Err(TriageError::Validation("empty status filter".into()));
    }
    Ok(StatusFilter::Many(statuses))
}

fn parse_filter(query: ListQuery) -> Result<InboxFilter, TriageError> {
    let statuses = query.status.as_deref().map(parse_status_filter).transpose()?;
    let channel = query
        .channel
        .as_deref()
        .map(|c| {
            Channel::from_str(c).map_err(|_| TriageError::UnsupportedChannel(c.to_string()))
        })
        .transpose()?;
    if let Some(limit) = query.limit {
        if limit < 1 {
            return Err(TriageError::Validation("limit must be positive".into()));
        }
    }
    Ok(InboxFilter {
        statuses,
        channel,
        search: query.search,
        limit: query.limit,
    })
}

/// GET /inbox
pub async fn get_inbox(
    State(state): State<GatewayState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let filter = match parse_filter(query) {
        Ok(filter) => filter,
        Err(err) => return error_response(err),
    };
    match state.engine.list(filter).await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(err) => error_response(err),
    }
}

/// Query parameters for GET /inbox/counts.
#[derive(Debug, Default, Deserialize)]
pub struct CountsQuery {
    #[serde(default)]
    pub channel: Option<String>,
}

/// GET /inbox/counts
pub async fn get_counts(
    State(state): State<GatewayState>,
    Query(query): Query<CountsQuery>,
) -> Response {
    let channel = match query
        .channel
        .as_deref()
        .map(|c| Channel::from_str(c).map_err(|_| TriageError::UnsupportedChannel(c.to_string())))
        .transpose()
    {
        Ok(channel) => channel,
        Err(err) => return error_response(err),
    };
    match state.engine.counts(channel).await {
        Ok(counts) => Json(counts).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/messages
///
/// Accepts a raw channel payload, normalizes it, and ingests it into a
/// new or existing conversation.
pub async fn post_message(
    State(state): State<GatewayState>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let normalized = match triage_engine::normalize(payload) {
        Ok(message) => message,
        Err(err) => return error_response(err),
    };
    match state.engine.ingest(normalized).await {
        Ok(conversation) => (StatusCode::CREATED, Json(conversation)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /inbox/{id}
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.engine.get_conversation(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/{id}/read
pub async fn post_read(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.mark_as_read(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/{id}/close
pub async fn post_close(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.close(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/{id}/snooze
pub async fn post_snooze(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SnoozeRequest>,
) -> Response {
    match state.engine.snooze(&id, &body.until).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/{id}/unsnooze
pub async fn post_unsnooze(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.unsnooze(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/{id}/assign
pub async fn post_assign(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> Response {
    match state.engine.assign(&id, &body.agent_id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/{id}/reopen
pub async fn post_reopen(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.reopen(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /inbox/{id}/convert
pub async fn post_convert(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(draft): Json<CaseDraft>,
) -> Response {
    match state.engine.convert_to_case(&id, draft).await {
        Ok(case) => (StatusCode::CREATED, Json(case)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /health
///
/// Unauthenticated liveness probe.
pub async fn get_public_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

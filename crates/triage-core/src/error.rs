// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the triage inbox engine.

use thiserror::Error;

/// The primary error type used across all triage crates.
///
/// Transition and conversion variants carry enough context for an operator
/// to understand why an action was rejected, not just that it failed.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Malformed channel payload (missing or empty required fields).
    #[error("invalid payload: {0}")]
    Validation(String),

    /// Payload carried a channel tag the normalizer does not know.
    #[error("unsupported channel: {0}")]
    UnsupportedChannel(String),

    /// Operation addressed a conversation or case id that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Lifecycle precondition violated. Never partially applied.
    #[error("invalid transition: cannot {action} conversation {id} while {status}")]
    InvalidTransition {
        id: String,
        status: String,
        action: &'static str,
    },

    /// A case already exists for this conversation.
    #[error("conversation {conversation_id} already converted to case {case_id}")]
    AlreadyConverted {
        conversation_id: String,
        case_id: String,
    },

    /// Lost-update conflict that survived the bounded internal retries.
    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Gateway transport errors (bind failure, serve failure).
    #[error("server error: {message}")]
    Server {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

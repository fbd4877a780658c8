// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the triage inbox engine.
//!
//! Provides the canonical domain model, the error taxonomy, and the
//! consumed text-normalization collaborator interface used throughout the
//! triage workspace.

pub mod error;
pub mod preview;
pub mod types;

pub use error::TriageError;
pub use preview::{PreviewCleaner, PreviewOptions};
pub use types::{
    Case, CaseType, Channel, Conversation, ConversationStatus, Direction, Message, Priority,
    ReplyStatus, Sender, now_iso,
};

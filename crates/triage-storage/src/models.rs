// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `triage-core::types` for use across
//! crate boundaries. This module re-exports them for convenience within
//! the storage crate and its callers.

pub use triage_core::types::{Case, Conversation, Message, Sender};

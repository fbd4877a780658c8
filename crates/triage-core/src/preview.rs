// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumed interface for the external text-normalization collaborator.
//!
//! The inbox core only ever calls this for display purposes -- conversation
//! list previews and default case descriptions. Stored message bodies are
//! never mutated.

/// Options controlling how aggressively a raw body is cleaned.
#[derive(Debug, Clone, Copy)]
pub struct PreviewOptions {
    /// Strip quoted-reply blocks (`> ...` lines, "On ... wrote:" tails).
    pub remove_quotes: bool,
    /// Strip signature blocks (everything after a `-- ` delimiter).
    pub remove_signature: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            remove_quotes: true,
            remove_signature: true,
        }
    }
}

/// Pure text-normalization collaborator.
///
/// Implementations strip markup, decode entities, drop quoted-reply and
/// signature blocks per the options, and collapse whitespace. Must be
/// side-effect free.
pub trait PreviewCleaner: Send + Sync {
    fn clean_preview(&self, raw_body: &str, options: &PreviewOptions) -> String;
}

// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The triage inbox engine: channel normalization, conversation
//! aggregation, lifecycle management, case conversion, and inbox queries.
//!
//! All state lives in the shared single-writer [`Database`]; every
//! read-modify-write runs as one SQLite transaction inside one closure on
//! the writer thread, so concurrent ingestion and agent actions cannot
//! lose counter updates.

use std::sync::Arc;

use triage_config::model::InboxConfig;
use triage_core::PreviewCleaner;
use triage_storage::Database;

pub mod aggregator;
pub mod convert;
pub mod inbox;
pub mod lifecycle;
pub mod normalizer;
pub mod preview;

pub use convert::CaseDraft;
pub use inbox::{ConversationSummary, InboxCounts, InboxFilter, StatusFilter};
pub use normalizer::{ChannelPayload, NormalizedMessage, normalize, normalize_payload};
pub use preview::HtmlPreviewCleaner;

/// Handle bundling the database, the preview collaborator, and tuning knobs.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct InboxEngine {
    db: Database,
    cleaner: Arc<dyn PreviewCleaner>,
    max_ingest_retries: u32,
    default_list_limit: i64,
}

impl InboxEngine {
    /// Create an engine over an opened database with the given preview
    /// collaborator and inbox configuration.
    pub fn new(db: Database, cleaner: Arc<dyn PreviewCleaner>, config: &InboxConfig) -> Self {
        Self {
            db,
            cleaner,
            max_ingest_retries: config.max_ingest_retries,
            default_list_limit: config.default_list_limit,
        }
    }

    /// Engine with the built-in HTML preview cleaner and default tuning.
    pub fn with_defaults(db: Database) -> Self {
        Self::new(
            db,
            Arc::new(HtmlPreviewCleaner::new()),
            &InboxConfig::default(),
        )
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub(crate) fn cleaner(&self) -> &Arc<dyn PreviewCleaner> {
        &self.cleaner
    }
}

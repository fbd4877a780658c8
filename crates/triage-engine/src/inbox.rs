// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox queries: filtered conversation listing and badge counts.
//!
//! Both paths apply the effective-status rule from the storage layer, so
//! a snoozed conversation past its wake time shows up as open in lists
//! and in counts at the same moment. Listing never writes; the persisted
//! wake correction happens on lifecycle touches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use triage_core::{
    Channel, Conversation, ConversationStatus, PreviewOptions, TriageError, now_iso,
};
use triage_storage::queries::conversations;

use crate::InboxEngine;

/// Maximum preview length in characters.
const PREVIEW_CHARS: usize = 160;

/// Status selection for [`InboxFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    One(ConversationStatus),
    Many(Vec<ConversationStatus>),
    /// The working set an agent looks at: open and pending.
    Active,
}

impl StatusFilter {
    fn statuses(&self) -> Vec<ConversationStatus> {
        match self {
            StatusFilter::One(status) => vec![*status],
            StatusFilter::Many(statuses) => statuses.clone(),
            StatusFilter::Active => {
                vec![ConversationStatus::Open, ConversationStatus::Pending]
            }
        }
    }
}

/// Filters for [`InboxEngine::list`]. `Default` lists everything up to
/// the configured limit.
#[derive(Debug, Clone, Default)]
pub struct InboxFilter {
    pub statuses: Option<StatusFilter>,
    pub channel: Option<Channel>,
    /// Case-insensitive substring over sender name/email/company and subject.
    pub search: Option<String>,
    pub limit: Option<i64>,
}

/// A conversation as shown in inbox lists: the record with its effective
/// status applied, plus cleaned preview text of the latest message.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub preview: String,
}

/// Badge counts for the dashboard, bucketed by effective status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxCounts {
    pub total: i64,
    pub unread: i64,
    pub open: i64,
    pub pending: i64,
    pub snoozed: i64,
    pub closed: i64,
    pub by_channel: BTreeMap<String, i64>,
}

impl InboxEngine {
    /// List conversations matching `filter`, most recently active first.
    pub async fn list(&self, filter: InboxFilter) -> Result<Vec<ConversationSummary>, TriageError> {
        if let Some(StatusFilter::Many(statuses)) = &filter.statuses {
            if statuses.is_empty() {
                return Err(TriageError::Validation("empty status filter".into()));
            }
        }
        let now = now_iso();
        let listed = conversations::list_conversations(
            &self.db,
            filter.statuses.as_ref().map(StatusFilter::statuses),
            filter.channel,
            filter.search,
            filter.limit.unwrap_or(self.default_list_limit),
            now.clone(),
        )
        .await?;

        Ok(listed
            .into_iter()
            .map(|row| {
                let mut conversation = row.conversation;
                let effective = conversation.effective_status(&now);
                if effective != conversation.status {
                    conversation.status = effective;
                    conversation.snooze_until = None;
                }
                let preview = row
                    .latest_body
                    .map(|body| self.preview_text(&body))
                    .unwrap_or_default();
                ConversationSummary {
                    conversation,
                    preview,
                }
            })
            .collect())
    }

    /// Badge counts as of now, optionally restricted to one channel.
    pub async fn counts(&self, channel: Option<Channel>) -> Result<InboxCounts, TriageError> {
        let rows = conversations::count_conversations(&self.db, channel, now_iso()).await?;
        let mut counts = InboxCounts::default();
        for (status, channel, n) in rows {
            counts.total += n;
            match status.as_str() {
                "unread" => counts.unread += n,
                "open" => counts.open += n,
                "pending" => counts.pending += n,
                "snoozed" => counts.snoozed += n,
                "closed" => counts.closed += n,
                _ => {}
            }
            *counts.by_channel.entry(channel).or_insert(0) += n;
        }
        Ok(counts)
    }

    fn preview_text(&self, body: &str) -> String {
        let cleaned = self.cleaner().clean_preview(body, &PreviewOptions::default());
        if cleaned.chars().count() <= PREVIEW_CHARS {
            return cleaned;
        }
        let truncated: String = cleaned.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{}…", truncated.trim_end())
    }
}

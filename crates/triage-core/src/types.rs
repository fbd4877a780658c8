// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical domain types shared across the triage workspace.
//!
//! Timestamps are ISO-8601 UTC strings with millisecond precision
//! (`2026-01-01T00:00:00.000Z`), the same shape SQLite's
//! `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` produces, so string comparison
//! and chronological comparison agree everywhere.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Origin medium of a customer contact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    ContactForm,
    QuoteForm,
    Email,
    Phone,
    Whatsapp,
    Manual,
}

impl Channel {
    /// All channels, in a stable order used by per-channel count maps.
    pub const ALL: [Channel; 6] = [
        Channel::ContactForm,
        Channel::QuoteForm,
        Channel::Email,
        Channel::Phone,
        Channel::Whatsapp,
        Channel::Manual,
    ];
}

/// Whether a message came from the customer or went out to them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Inbound,
    Outbound,
}

/// Conversation lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Unread,
    Open,
    Pending,
    Snoozed,
    Closed,
}

/// Triage priority, shared by conversations and cases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Derived indicator of whether the latest activity awaits an outbound reply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    AwaitingReply,
    Replied,
    NoReplyNeeded,
}

/// Category of an escalated case.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Complaint,
    Inquiry,
    #[default]
    Other,
}

/// Sender identity attached to messages and conversations.
///
/// All fields are optional because channels differ in what they supply;
/// per-channel required-identity rules are enforced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl Sender {
    /// The strongest available identity handle, used for correlation.
    ///
    /// Precedence: email (lowercased) > phone > name (lowercased).
    pub fn identity(&self) -> Option<String> {
        if let Some(email) = self.email.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(email.trim().to_lowercase());
        }
        if let Some(phone) = self.phone.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(phone.trim().to_string());
        }
        self.name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|n| n.trim().to_lowercase())
    }
}

/// One immutable inbound or outbound communication unit.
///
/// Corrections are represented as new messages; rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub channel: Channel,
    pub direction: Direction,
    /// Raw content as received. Email bodies stay HTML; cleaning is a
    /// presentation-time concern, never applied to stored content.
    pub body: String,
    pub sender: Sender,
    /// Channel-specific fields preserved verbatim (headers, thread ids,
    /// call durations, ...). Lossless: unmapped payload fields land here.
    pub channel_metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: String,
}

/// The unit of triage: one thread of messages tied to one sender/context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub channel: Channel,
    pub sender: Sender,
    pub subject: String,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub unread_count: i64,
    pub message_count: i64,
    pub last_message_at: String,
    /// First-message time. Never advances, even as `last_message_at` does.
    pub created_at: String,
    pub assigned_to: Option<String>,
    /// Only meaningful while `status` is `Snoozed`.
    pub snooze_until: Option<String>,
    /// Set exactly once by case conversion, never cleared.
    pub linked_case_id: Option<String>,
    pub tags: Vec<String>,
    pub reply_status: ReplyStatus,
    /// Channel + sender-identity key used to group inbound messages.
    pub correlation_key: String,
    /// Channel-supplied thread identifier; takes precedence over the
    /// correlation key when resolving an inbound message.
    pub thread_id: Option<String>,
}

impl Conversation {
    /// The timestamp a conversation sorts and displays by.
    ///
    /// A thread that never saw a second message keeps its original
    /// creation time rather than looking artificially fresh from
    /// aggregation bookkeeping. Used identically for list ordering and
    /// displayed dates.
    pub fn effective_timestamp(&self) -> &str {
        if self.message_count > 1 {
            &self.last_message_at
        } else {
            &self.created_at
        }
    }

    /// Status as read paths must see it: a snoozed conversation whose
    /// wake time has passed counts as open. `now` is an ISO-8601 UTC
    /// timestamp string.
    pub fn effective_status(&self, now: &str) -> ConversationStatus {
        if self.status == ConversationStatus::Snoozed
            && self
                .snooze_until
                .as_deref()
                .is_some_and(|until| until <= now)
        {
            ConversationStatus::Open
        } else {
            self.status
        }
    }
}

/// A tracked work item escalated from a conversation.
///
/// Holds a back-reference only; the conversation's lifecycle is not
/// coupled to the case's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub conversation_id: String,
    pub title: String,
    pub case_type: CaseType,
    pub priority: Priority,
    pub description: String,
    pub created_by: Option<String>,
    pub created_at: String,
    /// Independent case lifecycle, managed outside the inbox core.
    pub status: String,
}

/// Current UTC time in the canonical timestamp format.
pub fn now_iso() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_conversation() -> Conversation {
        Conversation {
            id: "c-1".into(),
            channel: Channel::Email,
            sender: Sender {
                name: Some("Ada".into()),
                email: Some("ada@example.com".into()),
                phone: None,
                company: None,
            },
            subject: "Hello".into(),
            status: ConversationStatus::Unread,
            priority: Priority::Normal,
            unread_count: 1,
            message_count: 1,
            last_message_at: "2026-01-02T10:00:00.000Z".into(),
            created_at: "2026-01-01T09:00:00.000Z".into(),
            assigned_to: None,
            snooze_until: None,
            linked_case_id: None,
            tags: vec![],
            reply_status: ReplyStatus::AwaitingReply,
            correlation_key: "email:ada@example.com".into(),
            thread_id: None,
        }
    }

    #[test]
    fn channel_round_trips_through_display_and_from_str() {
        for channel in Channel::ALL {
            let s = channel.to_string();
            assert_eq!(Channel::from_str(&s).unwrap(), channel);
        }
        assert_eq!(Channel::Whatsapp.to_string(), "whatsapp");
        assert_eq!(Channel::ContactForm.to_string(), "contact_form");
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&ConversationStatus::Snoozed).unwrap();
        assert_eq!(json, "\"snoozed\"");
        let back: ConversationStatus = serde_json::from_str("\"unread\"").unwrap();
        assert_eq!(back, ConversationStatus::Unread);
    }

    #[test]
    fn identity_prefers_email_then_phone_then_name() {
        let full = Sender {
            name: Some("Ada".into()),
            email: Some("Ada@Example.COM ".into()),
            phone: Some("+4912345".into()),
            company: None,
        };
        assert_eq!(full.identity().unwrap(), "ada@example.com");

        let phone_only = Sender {
            phone: Some("+4912345".into()),
            ..Default::default()
        };
        assert_eq!(phone_only.identity().unwrap(), "+4912345");

        let name_only = Sender {
            name: Some("Ada Lovelace".into()),
            ..Default::default()
        };
        assert_eq!(name_only.identity().unwrap(), "ada lovelace");

        assert_eq!(Sender::default().identity(), None);
    }

    #[test]
    fn effective_timestamp_ignores_bookkeeping_on_single_message_threads() {
        let mut conv = sample_conversation();
        assert_eq!(conv.effective_timestamp(), "2026-01-01T09:00:00.000Z");
        conv.message_count = 2;
        assert_eq!(conv.effective_timestamp(), "2026-01-02T10:00:00.000Z");
    }

    #[test]
    fn effective_status_wakes_past_due_snoozes() {
        let mut conv = sample_conversation();
        conv.status = ConversationStatus::Snoozed;
        conv.snooze_until = Some("2026-01-03T00:00:00.000Z".into());

        let before = "2026-01-02T23:59:59.000Z";
        let after = "2026-01-03T00:00:01.000Z";
        assert_eq!(conv.effective_status(before), ConversationStatus::Snoozed);
        assert_eq!(conv.effective_status(after), ConversationStatus::Open);

        conv.status = ConversationStatus::Closed;
        assert_eq!(conv.effective_status(after), ConversationStatus::Closed);
    }
}

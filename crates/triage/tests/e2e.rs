// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end inbox flows across ingestion, lifecycle, conversion, and
//! queries, driven through the test harness.

use serde_json::json;

use triage_core::{ConversationStatus, ReplyStatus, TriageError};
use triage_engine::{CaseDraft, InboxFilter, StatusFilter};
use triage_test_utils::{TestHarness, email_payload, whatsapp_payload};

#[tokio::test]
async fn email_thread_from_first_contact_to_case() {
    let harness = TestHarness::new().await.unwrap();

    // First inbound contact opens a fresh unread conversation.
    let conv = harness
        .ingest_payload(email_payload("a@x.com", "Broken gate", "<p>The gate is broken.</p>"))
        .await
        .unwrap();
    assert_eq!(conv.status, ConversationStatus::Unread);
    assert_eq!(conv.message_count, 1);
    assert_eq!(conv.unread_count, 1);
    assert_eq!(conv.reply_status, ReplyStatus::AwaitingReply);

    // An agent reply flips the reply status without reopening bookkeeping.
    let conv = harness
        .engine
        .record_outbound(&conv.id, "We will send someone today.", Some("agent-1"))
        .await
        .unwrap();
    assert_eq!(conv.message_count, 2);
    assert_eq!(conv.reply_status, ReplyStatus::Replied);

    // Escalation creates exactly one case and links it back.
    let case = harness
        .engine
        .convert_to_case(
            &conv.id,
            CaseDraft {
                title: Some("T".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(case.conversation_id, conv.id);

    let conv = harness.engine.get_conversation(&conv.id).await.unwrap();
    assert_eq!(conv.linked_case_id.as_deref(), Some(case.id.as_str()));

    let err = harness
        .engine
        .convert_to_case(&conv.id, CaseDraft::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::AlreadyConverted { .. }));
}

#[tokio::test]
async fn repeat_sender_lands_in_the_same_conversation() {
    let harness = TestHarness::new().await.unwrap();

    let first = harness
        .ingest_payload(email_payload("a@x.com", "Hi", "one"))
        .await
        .unwrap();
    let second = harness
        .ingest_payload(email_payload("a@x.com", "Hi again", "two"))
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.message_count, 2);
    assert_eq!(second.unread_count, 2);

    // A different sender gets a different thread; so does the same
    // identity arriving on a different channel.
    let other = harness
        .ingest_payload(email_payload("b@x.com", "Hi", "three"))
        .await
        .unwrap();
    assert_ne!(other.id, first.id);

    let whatsapp = harness
        .ingest_payload(whatsapp_payload("+4512345678", "hello"))
        .await
        .unwrap();
    assert_ne!(whatsapp.id, first.id);

    let counts = harness.engine.counts(None).await.unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.by_channel.get("email"), Some(&2));
    assert_eq!(counts.by_channel.get("whatsapp"), Some(&1));
}

#[tokio::test]
async fn inbound_message_reactivates_a_closed_thread() {
    let harness = TestHarness::new().await.unwrap();

    let conv = harness
        .ingest_payload(email_payload("a@x.com", "Hi", "one"))
        .await
        .unwrap();
    harness.engine.mark_as_read(&conv.id).await.unwrap();
    harness.engine.close(&conv.id).await.unwrap();

    // thread_id routing may target closed conversations; plain
    // sender-identity correlation skips them and starts fresh.
    let fresh = harness
        .ingest_payload(email_payload("a@x.com", "Hi again", "two"))
        .await
        .unwrap();
    assert_ne!(fresh.id, conv.id);
    assert_eq!(fresh.status, ConversationStatus::Unread);

    let threaded_first = harness
        .ingest_payload(json!({
            "channel": "email",
            "from_address": "c@x.com",
            "body_html": "start",
            "thread_id": "imap-77",
        }))
        .await
        .unwrap();
    harness.engine.mark_as_read(&threaded_first.id).await.unwrap();
    let case = harness
        .engine
        .convert_to_case(&threaded_first.id, CaseDraft::default())
        .await
        .unwrap();
    harness.engine.close(&threaded_first.id).await.unwrap();

    let reactivated = harness
        .ingest_payload(json!({
            "channel": "email",
            "from_address": "c@x.com",
            "body_html": "follow-up",
            "thread_id": "imap-77",
        }))
        .await
        .unwrap();
    assert_eq!(reactivated.id, threaded_first.id);
    assert_eq!(reactivated.status, ConversationStatus::Open);
    assert_eq!(reactivated.message_count, 2);
    // Reactivation reopens the thread but leaves the case link intact.
    assert_eq!(reactivated.linked_case_id.as_deref(), Some(case.id.as_str()));
}

#[tokio::test]
async fn snoozed_thread_disappears_then_wakes_as_open() {
    let harness = TestHarness::new().await.unwrap();

    let conv = harness
        .ingest_payload(email_payload("a@x.com", "Later", "ping me next week"))
        .await
        .unwrap();
    harness.engine.mark_as_read(&conv.id).await.unwrap();
    harness
        .engine
        .snooze(&conv.id, "2099-01-01T00:00:00.000Z")
        .await
        .unwrap();

    let active = harness
        .engine
        .list(InboxFilter {
            statuses: Some(StatusFilter::Active),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(active.is_empty());
    let counts = harness.engine.counts(None).await.unwrap();
    assert_eq!(counts.snoozed, 1);
    assert_eq!(counts.open, 0);

    // Bring the wake time into the past.
    let id = conv.id.clone();
    harness
        .engine
        .database()
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE conversations SET snooze_until = '2020-01-01T00:00:00.000Z' WHERE id = ?1",
                rusqlite::params![id],
            )
        })
        .await
        .unwrap();

    let active = harness
        .engine
        .list(InboxFilter {
            statuses: Some(StatusFilter::Active),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].conversation.status, ConversationStatus::Open);
    let counts = harness.engine.counts(None).await.unwrap();
    assert_eq!(counts.snoozed, 0);
    assert_eq!(counts.open, 1);
}

#[tokio::test]
async fn unread_count_tracks_inbound_minus_read_resets() {
    let harness = TestHarness::new().await.unwrap();

    let mut conv = harness
        .ingest_payload(whatsapp_payload("+4512345678", "first"))
        .await
        .unwrap();
    for text in ["second", "third"] {
        conv = harness
            .ingest_payload(whatsapp_payload("+4512345678", text))
            .await
            .unwrap();
    }
    assert_eq!(conv.message_count, 3);
    assert_eq!(conv.unread_count, 3);

    let conv = harness.engine.mark_as_read(&conv.id).await.unwrap();
    assert_eq!(conv.unread_count, 0);

    let conv = harness
        .ingest_payload(whatsapp_payload("+4512345678", "fourth"))
        .await
        .unwrap();
    assert_eq!(conv.message_count, 4);
    assert_eq!(conv.unread_count, 1);
    assert!(conv.unread_count <= conv.message_count);
}

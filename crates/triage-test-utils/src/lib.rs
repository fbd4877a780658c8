// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for triage integration tests.
//!
//! Provides a [`TestHarness`] wiring the inbox engine over a temp SQLite
//! database, plus ready-made channel payload builders.

pub mod harness;

pub use harness::{TestHarness, email_payload, whatsapp_payload};

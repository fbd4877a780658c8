// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP query and command API over the inbox engine.
//!
//! Exposes listing, counts, ingestion, lifecycle transitions, and case
//! conversion as a small REST surface. All domain rules live in
//! `triage-engine`; this crate only translates HTTP to engine calls.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, ServerConfig, build_router, start_server};

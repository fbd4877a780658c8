// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for read operations and row mapping on storage entities.

pub mod cases;
pub mod conversations;
pub mod messages;

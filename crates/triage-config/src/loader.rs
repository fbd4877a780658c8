// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./triage.toml` > `~/.config/triage/triage.toml` > `/etc/triage/triage.toml`
//! with environment variable overrides via `TRIAGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TriageConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/triage/triage.toml` (system-wide)
/// 3. `~/.config/triage/triage.toml` (user XDG config)
/// 4. `./triage.toml` (local directory)
/// 5. `TRIAGE_*` environment variables
pub fn load_config() -> Result<TriageConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TriageConfig::default()))
        .merge(Toml::file("/etc/triage/triage.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("triage/triage.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("triage.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<TriageConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TriageConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TriageConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TriageConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `TRIAGE_STORAGE_DATABASE_PATH` must map
/// to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("TRIAGE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("inbox_", "inbox.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("server_", "server.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8320);
        assert_eq!(config.inbox.default_list_limit, 50);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [server]
            port = 9000

            [storage]
            database_path = "/tmp/inbox.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.database_path, "/tmp/inbox.db");
        // Untouched sections keep defaults.
        assert_eq!(config.inbox.log_level, "info");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [inbox]
            log_levle = "debug"
            "#,
        );
        assert!(result.is_err(), "typo'd key should be rejected");
    }
}

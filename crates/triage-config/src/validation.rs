// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses and positive limits.

use crate::diagnostic::ConfigError;
use crate::model::TriageConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &TriageConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let host = config.server.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.inbox.default_list_limit < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "inbox.default_list_limit must be at least 1, got {}",
                config.inbox.default_list_limit
            ),
        });
    }

    const KNOWN_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if !KNOWN_LEVELS.contains(&config.inbox.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "inbox.log_level `{}` is not one of trace, debug, info, warn, error",
                config.inbox.log_level
            ),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&TriageConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors_without_failing_fast() {
        let mut config = TriageConfig::default();
        config.server.host = "".to_string();
        config.storage.database_path = "  ".to_string();
        config.inbox.default_list_limit = 0;
        config.inbox.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn rejects_garbage_host() {
        let mut config = TriageConfig::default();
        config.server.host = "not a host!".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}

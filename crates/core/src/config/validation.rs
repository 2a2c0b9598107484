//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 30 seconds
    /// - `max_icon_bytes` is 0 or exceeds 10MiB
    /// - `icon_size` is 0 or exceeds 512
    /// - `coalesce_ms` exceeds 10 seconds
    /// - `user_agent` is empty
    /// - a proxy endpoint template is not an absolute HTTP(S) URL prefix
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 30_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 30 seconds (30000ms)".into(),
            });
        }

        if self.max_icon_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_icon_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_icon_bytes > 10 * 1024 * 1024 {
            return Err(ConfigError::Invalid {
                field: "max_icon_bytes".into(),
                reason: "must not exceed 10MiB".into(),
            });
        }

        if self.icon_size == 0 || self.icon_size > 512 {
            return Err(ConfigError::Invalid { field: "icon_size".into(), reason: "must be 1-512".into() });
        }

        if self.coalesce_ms > 10_000 {
            return Err(ConfigError::Invalid {
                field: "coalesce_ms".into(),
                reason: "must not exceed 10 seconds (10000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for endpoint in &self.proxy_endpoints {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    field: "proxy_endpoints".into(),
                    reason: format!("not an absolute HTTP(S) prefix: {endpoint}"),
                });
            }
            if endpoint.contains(char::is_whitespace) {
                return Err(ConfigError::Invalid {
                    field: "proxy_endpoints".into(),
                    reason: format!("contains whitespace: {endpoint}"),
                });
            }
        }

        if self.proxy_endpoints.is_empty() {
            tracing::warn!("proxy_endpoints is empty; CORS-restricted providers will be fetched directly");
        }

        Ok(())
    }
}

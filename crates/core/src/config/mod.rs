//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ICONDUIT_*)
//! 2. TOML config file (if ICONDUIT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ICONDUIT_*)
/// 2. TOML config file (if ICONDUIT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite icon store.
    ///
    /// Set via ICONDUIT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via ICONDUIT_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-attempt network timeout in milliseconds.
    ///
    /// Bounds every proxy or direct fetch; a full proxy fallback chain
    /// takes at most `timeout_ms * proxy_endpoints.len()`.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum accepted icon payload size in bytes.
    #[serde(default = "default_max_icon_bytes")]
    pub max_icon_bytes: usize,

    /// Pixel size requested from icon providers that accept one.
    #[serde(default = "default_icon_size")]
    pub icon_size: u32,

    /// Coalescing window for concurrent icon upgrades, in milliseconds.
    ///
    /// Upgrade requests for the same origin within this window share a
    /// single fetch attempt.
    #[serde(default = "default_coalesce_ms")]
    pub coalesce_ms: u64,

    /// Ordered CORS-proxy endpoint templates.
    ///
    /// The percent-encoded target URL is appended to the template. Order
    /// is the fallback order; it never changes at runtime.
    #[serde(default = "default_proxy_endpoints")]
    pub proxy_endpoints: Vec<String>,

    /// Substrings that mark a candidate icon URL as a placeholder.
    #[serde(default = "default_icon_markers")]
    pub default_icon_markers: Vec<String>,

    /// Whether the provider chain may fall back to fetching the site's
    /// root HTML and trying its declared icon links.
    #[serde(default = "default_true")]
    pub discover_html: bool,

    /// Listen port for the relay service.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./iconduit-cache.sqlite")
}

fn default_user_agent() -> String {
    "iconduit/0.1".into()
}

fn default_timeout_ms() -> u64 {
    6_000
}

fn default_max_icon_bytes() -> usize {
    1_048_576 // 1MiB
}

fn default_icon_size() -> u32 {
    64
}

fn default_coalesce_ms() -> u64 {
    100
}

fn default_proxy_endpoints() -> Vec<String> {
    vec![
        "https://api.allorigins.win/raw?url=".into(),
        "https://corsproxy.io/?".into(),
        "https://api.codetabs.com/v1/proxy?quest=".into(),
    ]
}

fn default_icon_markers() -> Vec<String> {
    vec!["/icon/default".into(), "default-favicon".into(), "placeholder".into()]
}

fn default_true() -> bool {
    true
}

fn default_listen_port() -> u16 {
    8787
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_icon_bytes: default_max_icon_bytes(),
            icon_size: default_icon_size(),
            coalesce_ms: default_coalesce_ms(),
            proxy_endpoints: default_proxy_endpoints(),
            default_icon_markers: default_icon_markers(),
            discover_html: true,
            listen_port: default_listen_port(),
        }
    }
}

impl AppConfig {
    /// Per-attempt timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Coalescing window as Duration.
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ICONDUIT_`
    /// 2. TOML file from `ICONDUIT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ICONDUIT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ICONDUIT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

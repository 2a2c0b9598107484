//! CORS-proxy registry and ordered fallback resolver.
//!
//! ### Registry
//! - Fixed, configuration-ordered list of relay endpoint templates.
//! - Lazy health tracking: an endpoint's status only changes when it is
//!   actually used, never from a background probe.
//!
//! ### Fallback policy
//! - Endpoints are tried strictly in configuration order, one at a time;
//!   a failed endpoint is skipped immediately, not retried, so a full
//!   chain is bounded by `timeout * endpoint_count`.
//! - The first 2xx response with a non-empty body wins.
//! - Ordered (not random/round-robin) selection keeps behavior
//!   deterministic across calls.

pub mod error;

pub use error::{EndpointFailure, ProxyError};

use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::ssrf;

/// Characters kept verbatim when percent-encoding a target URL for
/// template substitution. Matches JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Last-known health of a proxy endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    Unknown,
    Working,
    Failed,
}

impl ProxyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStatus::Unknown => "unknown",
            ProxyStatus::Working => "working",
            ProxyStatus::Failed => "failed",
        }
    }
}

/// A configured relay endpoint. The percent-encoded target URL is
/// appended to the template.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub template: String,
}

/// Ordered candidate list of proxy services and their last-known health.
///
/// Endpoints are created once from configuration and never removed;
/// only their status is re-evaluated, on each real usage attempt.
#[derive(Debug)]
pub struct ProxyRegistry {
    endpoints: Vec<ProxyEndpoint>,
    statuses: RwLock<Vec<ProxyStatus>>,
}

impl ProxyRegistry {
    pub fn new(templates: Vec<String>) -> Self {
        let endpoints: Vec<ProxyEndpoint> = templates.into_iter().map(|template| ProxyEndpoint { template }).collect();
        let statuses = RwLock::new(vec![ProxyStatus::Unknown; endpoints.len()]);
        Self { endpoints, statuses }
    }

    /// The configured endpoints, in stable configuration order.
    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    /// Record the outcome of a usage attempt against endpoint `index`.
    pub fn mark_outcome(&self, index: usize, success: bool) {
        let mut statuses = self.statuses.write().expect("proxy registry lock poisoned");
        if let Some(slot) = statuses.get_mut(index) {
            *slot = if success { ProxyStatus::Working } else { ProxyStatus::Failed };
        }
    }

    /// Current status of endpoint `index`.
    pub fn status_of(&self, index: usize) -> ProxyStatus {
        let statuses = self.statuses.read().expect("proxy registry lock poisoned");
        statuses.get(index).copied().unwrap_or(ProxyStatus::Unknown)
    }

    /// Per-endpoint status mapping, for observability only.
    pub fn status_snapshot(&self) -> Vec<(String, ProxyStatus)> {
        let statuses = self.statuses.read().expect("proxy registry lock poisoned");
        self.endpoints
            .iter()
            .zip(statuses.iter())
            .map(|(endpoint, status)| (endpoint.template.clone(), *status))
            .collect()
    }
}

/// Build the proxied form of a target URL for one endpoint.
pub fn proxied_url(template: &str, target: &str) -> String {
    let encoded = utf8_percent_encode(target, COMPONENT);
    format!("{template}{encoded}")
}

/// Configuration for the proxy resolver.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// User agent string (default: "iconduit/0.1")
    pub user_agent: String,

    /// Per-attempt timeout (default: 6s)
    pub timeout: Duration,

    /// Maximum response body size in bytes (default: 1MiB)
    pub max_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self { user_agent: "iconduit/0.1".to_string(), timeout: Duration::from_millis(6_000), max_bytes: 1_048_576 }
    }
}

/// Payload from a successful fetch, with the endpoint that served it.
#[derive(Debug, Clone)]
pub struct ProxyFetch {
    /// Response body bytes
    pub bytes: Bytes,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Template of the endpoint that served the payload; None for a
    /// direct (unproxied) fetch.
    pub endpoint: Option<String>,
    /// Time taken across all attempts in milliseconds
    pub fetch_ms: u64,
}

/// Resolver producing a fetchable payload for a target that may be
/// blocked by browser CORS policy.
pub struct ProxyResolver {
    http: reqwest::Client,
    registry: Arc<ProxyRegistry>,
    config: ProxyConfig,
}

impl ProxyResolver {
    /// Create a new resolver over the given registry.
    pub fn new(registry: Arc<ProxyRegistry>, config: ProxyConfig) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(ProxyError::from)?;

        Ok(Self { http, registry, config })
    }

    /// Get reference to the registry.
    pub fn registry(&self) -> &Arc<ProxyRegistry> {
        &self.registry
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Fetch `target` through the proxy chain, trying endpoints in order
    /// until one succeeds or all are exhausted.
    ///
    /// Every endpoint attempted in this call has its registry status
    /// updated from the outcome.
    pub async fn resolve(&self, target: &str) -> Result<ProxyFetch, ProxyError> {
        let start = Instant::now();
        let mut failures = Vec::new();

        for (index, endpoint) in self.registry.endpoints().iter().enumerate() {
            let proxied = proxied_url(&endpoint.template, target);

            match self.attempt(&proxied).await {
                Ok((bytes, content_type)) => {
                    self.registry.mark_outcome(index, true);
                    tracing::debug!("proxied {} via {} ({} bytes)", target, endpoint.template, bytes.len());
                    return Ok(ProxyFetch {
                        bytes,
                        content_type,
                        endpoint: Some(endpoint.template.clone()),
                        fetch_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Err(reason) => {
                    self.registry.mark_outcome(index, false);
                    tracing::debug!("proxy {} failed for {}: {}", endpoint.template, target, reason);
                    failures.push(EndpointFailure { endpoint: endpoint.template.clone(), reason: reason.to_string() });
                }
            }
        }

        Err(ProxyError::AllExhausted { target: target.to_string(), failures })
    }

    /// Fetch `target` directly, without a relay.
    ///
    /// The target passes the SSRF guard first; relayed fetches skip it
    /// because their endpoints come from trusted configuration.
    pub async fn fetch_direct(&self, target: &str) -> Result<ProxyFetch, ProxyError> {
        let url = ssrf::validate_target(target)?;
        let start = Instant::now();
        let (bytes, content_type) = self.attempt(url.as_str()).await?;
        Ok(ProxyFetch { bytes, content_type, endpoint: None, fetch_ms: start.elapsed().as_millis() as u64 })
    }

    /// Policy wrapper: relay chain first for CORS-restricted targets,
    /// degrading to one direct attempt when every relay fails.
    pub async fn fetch(&self, target: &str, via_proxy: bool) -> Result<ProxyFetch, ProxyError> {
        if !via_proxy {
            return self.fetch_direct(target).await;
        }

        match self.resolve(target).await {
            Ok(fetch) => Ok(fetch),
            Err(exhausted @ ProxyError::AllExhausted { .. }) => {
                tracing::debug!("{}; attempting direct fetch", exhausted);
                self.fetch_direct(target).await
            }
            Err(other) => Err(other),
        }
    }

    /// One bounded GET attempt. 2xx with a non-empty body within the
    /// size limit succeeds; anything else is an error for this attempt.
    async fn attempt(&self, url: &str) -> Result<(Bytes, Option<String>), ProxyError> {
        let response = self.http.get(url).send().await.map_err(ProxyError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::HttpStatus { status: status.as_u16() });
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(ProxyError::TooLarge { size: len as usize, limit: self.config.max_bytes });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(ProxyError::from)?;

        if bytes.is_empty() {
            return Err(ProxyError::EmptyBody);
        }
        if bytes.len() > self.config.max_bytes {
            return Err(ProxyError::TooLarge { size: bytes.len(), limit: self.config.max_bytes });
        }

        Ok((bytes, content_type))
    }
}

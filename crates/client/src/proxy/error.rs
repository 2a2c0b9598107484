//! Proxy fallback chain error types.

use crate::ssrf::SsrfError;
use std::sync::Arc;

/// One endpoint's failure within a fallback chain.
#[derive(Debug, Clone)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub reason: String,
}

impl std::fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.reason)
    }
}

/// Errors from the proxy fallback chain.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Request timeout on a single attempt.
    #[error("request timeout")]
    Timeout,

    /// Network error on a single attempt.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Non-2xx HTTP response.
    #[error("HTTP error: {status}")]
    HttpStatus { status: u16 },

    /// 2xx response with an empty body.
    #[error("empty response body")]
    EmptyBody,

    /// Response body exceeded the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },

    /// Direct fetch vetoed by the SSRF guard.
    #[error("ssrf: {0}")]
    Ssrf(#[from] SsrfError),

    /// Every configured proxy endpoint failed for this target.
    #[error("all proxies exhausted for {target} ({} attempts)", failures.len())]
    AllExhausted { target: String, failures: Vec<EndpointFailure> },
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ProxyError::Timeout } else { ProxyError::Network(Arc::new(err)) }
    }
}

//! Relay error types and HTTP status mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use iconduit_client::{FaviconError, ProxyError};
use thiserror::Error;

/// Errors surfaced by relay handlers.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("invalid parameter {param}: {reason}")]
    InvalidParam { param: &'static str, reason: String },

    #[error("blocked target: {0}")]
    Blocked(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::MissingParam(_) | RelayError::InvalidParam { .. } | RelayError::Blocked(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

impl From<FaviconError> for RelayError {
    fn from(err: FaviconError) -> Self {
        match err {
            FaviconError::InvalidOrigin(e) => RelayError::InvalidParam { param: "domain", reason: e.to_string() },
            exhausted @ FaviconError::AllProvidersExhausted { .. } => RelayError::Upstream(exhausted.to_string()),
        }
    }
}

impl From<ProxyError> for RelayError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Ssrf(e) => RelayError::Blocked(e.to_string()),
            other => RelayError::Upstream(other.to_string()),
        }
    }
}

impl From<iconduit_core::Error> for RelayError {
    fn from(err: iconduit_core::Error) -> Self {
        RelayError::Upstream(err.to_string())
    }
}

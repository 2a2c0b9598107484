//! Favicon pipeline error types.

use iconduit_core::OriginError;

/// One provider's failure within an upgrade chain.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Errors from the favicon resolution pipeline.
///
/// Provider exhaustion is soft-failed to the placeholder icon at the
/// pipeline boundary; it only surfaces here for callers that need the
/// raw payload, like the relay's `/favicon` handler.
#[derive(Debug, thiserror::Error)]
pub enum FaviconError {
    /// The site URL could not be normalized to an origin key.
    #[error("invalid origin: {0}")]
    InvalidOrigin(#[from] OriginError),

    /// Every icon provider failed for this origin.
    #[error("all icon providers exhausted for {origin} ({} attempts)", attempts.len())]
    AllProvidersExhausted { origin: String, attempts: Vec<ProviderFailure> },
}

//! `GET /proxy?url=`: generic CORS relay.
//!
//! Fetches the target server-side (behind the SSRF guard) and re-serves
//! the body with its upstream content type and permissive CORS headers.

use crate::error::RelayError;
use crate::routes::AppState;
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ProxyParams {
    /// Absolute URL to relay.
    pub url: Option<String>,
}

pub async fn serve_proxy(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProxyParams>,
) -> Result<Response, RelayError> {
    let target = params
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(RelayError::MissingParam("url"))?;

    let fetch = state.resolver.fetch_direct(target).await?;

    tracing::debug!("relayed {} ({} bytes in {}ms)", target, fetch.bytes.len(), fetch.fetch_ms);

    let content_type = fetch.content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        fetch.bytes,
    )
        .into_response())
}

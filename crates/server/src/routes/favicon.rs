//! `GET /favicon?domain=&size=`: resolve an icon server-side and serve
//! the winning payload with permissive CORS headers.

use crate::error::RelayError;
use crate::routes::AppState;
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use iconduit_core::origin_key;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct FaviconParams {
    /// Domain or site URL to resolve an icon for.
    pub domain: Option<String>,

    /// Requested pixel size; defaults to the configured size.
    pub size: Option<u32>,
}

pub async fn serve_favicon(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FaviconParams>,
) -> Result<Response, RelayError> {
    let domain = params
        .domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or(RelayError::MissingParam("domain"))?;

    let key = origin_key(domain).map_err(|e| RelayError::InvalidParam { param: "domain", reason: e.to_string() })?;

    let icon = state.pipeline.fetch_icon(&key, params.size).await?;

    tracing::debug!("served icon for {} from {} ({} bytes)", key, icon.provider, icon.bytes.len());

    let content_type = icon.content_type.unwrap_or_else(|| "image/png".to_string());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        icon.bytes,
    )
        .into_response())
}

//! `/notion/{*path}`: passthrough to the Notion API for OAuth relay.
//!
//! Browser-side OAuth token exchange cannot call `api.notion.com`
//! directly (no CORS headers there), so the relay forwards the request
//! verbatim and re-serves the answer with permissive CORS headers.

use crate::error::RelayError;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

const NOTION_BASE: &str = "https://api.notion.com";

/// Request headers worth forwarding upstream; everything else is
/// hop-by-hop or relay-internal.
const FORWARDED_HEADERS: &[&str] = &["authorization", "content-type", "notion-version"];

pub(crate) fn forwarded_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    FORWARDED_HEADERS
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

pub async fn passthrough(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    let target = format!("{NOTION_BASE}/{path}");

    let mut request = state.http.request(method.clone(), &target);
    for (name, value) in forwarded_headers(&headers) {
        request = request.header(name, value);
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| RelayError::Upstream(format!("notion passthrough failed: {e}")))?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| RelayError::Upstream(format!("notion passthrough read failed: {e}")))?;

    tracing::debug!("notion passthrough {} /{} -> {}", method, path, status);

    Ok((
        status,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_headers_filters_to_allowlist() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        headers.insert("notion-version", HeaderValue::from_static("2022-06-28"));
        headers.insert("cookie", HeaderValue::from_static("session=abc"));
        headers.insert("host", HeaderValue::from_static("relay.example"));

        let forwarded = forwarded_headers(&headers);
        let names: Vec<_> = forwarded.iter().map(|(n, _)| n.as_str()).collect();

        assert!(names.contains(&"authorization"));
        assert!(names.contains(&"notion-version"));
        assert!(!names.contains(&"cookie"));
        assert!(!names.contains(&"host"));
    }

    #[test]
    fn test_forwarded_headers_empty_input() {
        assert!(forwarded_headers(&HeaderMap::new()).is_empty());
    }
}

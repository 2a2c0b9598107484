//! `GET /status`: observability snapshot.
//!
//! Reports per-endpoint proxy health and the persisted icon count. The
//! snapshot feeds a status indicator only; nothing makes control
//! decisions from it.

use crate::error::RelayError;
use crate::routes::AppState;
use axum::{Json, extract::State};
use iconduit_client::ProxyStatus;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ProxyStatusRow {
    pub endpoint: String,
    pub status: ProxyStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub proxies: Vec<ProxyStatusRow>,
    pub cached_icons: u64,
}

pub async fn serve_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusOutput>, RelayError> {
    let proxies = state
        .registry
        .status_snapshot()
        .into_iter()
        .map(|(endpoint, status)| ProxyStatusRow { endpoint, status })
        .collect();

    let cached_icons = state.db.count_icons().await?;

    Ok(Json(StatusOutput { proxies, cached_icons }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_state;

    #[tokio::test]
    async fn test_status_reports_empty_state() {
        let state = test_state().await;
        let Json(output) = serve_status(State(state)).await.unwrap();

        assert!(output.proxies.is_empty());
        assert_eq!(output.cached_icons, 0);
    }

    #[tokio::test]
    async fn test_status_serializes() {
        let output = StatusOutput {
            proxies: vec![ProxyStatusRow { endpoint: "https://relay.example/?".into(), status: ProxyStatus::Working }],
            cached_icons: 3,
        };

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["proxies"][0]["status"], "working");
        assert_eq!(json["cached_icons"], 3);
    }
}

//! Route handlers and shared application state.

pub mod favicon;
pub mod notion;
pub mod proxy;
pub mod status;

use axum::{
    Router,
    routing::{any, get},
};
use iconduit_client::{FaviconCache, IconPipeline, PipelineConfig, ProxyConfig, ProxyRegistry, ProxyResolver};
use iconduit_core::{AppConfig, BlobArena, IconDb};
use std::sync::Arc;

/// Shared state for all relay handlers, built once at startup and
/// threaded through axum's `State` extractor.
pub struct AppState {
    pub registry: Arc<ProxyRegistry>,
    pub resolver: Arc<ProxyResolver>,
    pub pipeline: IconPipeline,
    pub db: IconDb,
    pub http: reqwest::Client,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Arc<Self>> {
        let db = IconDb::open(&config.db_path).await?;
        Self::build(config, db)
    }

    fn build(config: &AppConfig, db: IconDb) -> anyhow::Result<Arc<Self>> {
        let registry = Arc::new(ProxyRegistry::new(config.proxy_endpoints.clone()));
        let resolver = Arc::new(ProxyResolver::new(
            registry.clone(),
            ProxyConfig {
                user_agent: config.user_agent.clone(),
                timeout: config.timeout(),
                max_bytes: config.max_icon_bytes,
            },
        )?);

        let cache = Arc::new(FaviconCache::new(Arc::new(BlobArena::new()), Some(db.clone())));
        let pipeline = IconPipeline::new(resolver.clone(), cache, PipelineConfig::from_app(config));

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;

        Ok(Arc::new(Self { registry, resolver, pipeline, db, http }))
    }
}

/// Build the relay router. Wrong methods on routed paths answer 405 via
/// axum's method routing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/favicon", get(favicon::serve_favicon))
        .route("/proxy", get(proxy::serve_proxy))
        .route("/status", get(status::serve_status))
        .route("/notion/{*path}", any(notion::passthrough))
        .with_state(state)
}

#[cfg(test)]
pub(crate) async fn test_state() -> Arc<AppState> {
    let config = AppConfig {
        timeout_ms: 500,
        proxy_endpoints: Vec::new(),
        discover_html: false,
        ..Default::default()
    };
    let db = IconDb::open_in_memory().await.unwrap();
    AppState::build(&config, db).unwrap()
}

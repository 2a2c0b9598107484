//! Favicon resolution pipeline.
//!
//! ### Fast path
//! [`IconPipeline::get_display_icon`] is synchronous: a cached non-default
//! entry wins immediately, otherwise the caller's candidate URL is shown
//! as an interim value while an asynchronous upgrade may be in flight.
//!
//! ### Upgrade path
//! [`IconPipeline::upgrade_icon`] walks an ordered provider chain (via the
//! proxy resolver for CORS-restricted providers), accepts the first
//! payload that sniffs as an image, and stores it in the cache. Provider
//! exhaustion degrades to the placeholder icon: a missing icon is
//! cosmetic, so no error reaches the user.
//!
//! ### Coalescing
//! Concurrent upgrades for one origin share a single in-flight attempt
//! through a per-origin slot; the slot is retired after the configured
//! window, so a burst of re-renders costs one fetch chain.

pub mod cache;
pub mod discover;
pub mod error;
pub mod providers;

pub use cache::{CacheEntry, FAVICON_CATEGORY, FaviconCache};
pub use error::{FaviconError, ProviderFailure};
pub use providers::{DEFAULT_PROVIDERS, ProviderSpec, looks_like_image};

use crate::proxy::{ProxyError, ProxyFetch, ProxyResolver};
use async_trait::async_trait;
use bytes::Bytes;
use iconduit_core::{AppConfig, origin_key};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

/// How many discovered HTML icon links are worth trying before giving up.
const MAX_DISCOVERED_CANDIDATES: usize = 3;

/// The icon a caller should display for a site.
///
/// Tagged rather than stringly-typed: callers branch on the variant, not
/// on comparing the URL against known placeholder paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayIcon {
    /// Placeholder awaiting (or after a failed) upgrade
    Default(String),
    /// A real icon: blob URL from the cache or a direct candidate URL
    Resolved(String),
}

impl DisplayIcon {
    pub fn url(&self) -> &str {
        match self {
            DisplayIcon::Default(url) | DisplayIcon::Resolved(url) => url,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, DisplayIcon::Default(_))
    }
}

/// Network access used by the pipeline; the proxy resolver in
/// production, a fake in tests.
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str, via_proxy: bool) -> Result<ProxyFetch, ProxyError>;
}

#[async_trait]
impl IconFetcher for ProxyResolver {
    async fn fetch_image(&self, url: &str, via_proxy: bool) -> Result<ProxyFetch, ProxyError> {
        self.fetch(url, via_proxy).await
    }
}

/// An icon payload won from the provider chain.
#[derive(Debug, Clone)]
pub struct FetchedIcon {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub provider: String,
    pub source_url: String,
}

/// Configuration for the favicon pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pixel size requested from providers that accept one
    pub icon_size: u32,
    /// Window within which concurrent upgrades for one origin coalesce
    pub coalesce_window: Duration,
    /// Substrings marking a candidate URL as a placeholder
    pub default_icon_markers: Vec<String>,
    /// Whether to fall back to the site's declared icon links
    pub discover_html: bool,
    /// Ordered provider chain
    pub providers: Vec<ProviderSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            icon_size: 64,
            coalesce_window: Duration::from_millis(100),
            default_icon_markers: vec!["/icon/default".into(), "default-favicon".into(), "placeholder".into()],
            discover_html: true,
            providers: DEFAULT_PROVIDERS.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Derive pipeline settings from the application configuration.
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            icon_size: config.icon_size,
            coalesce_window: config.coalesce_window(),
            default_icon_markers: config.default_icon_markers.clone(),
            discover_html: config.discover_html,
            providers: DEFAULT_PROVIDERS.to_vec(),
        }
    }
}

/// Decides what icon to show for a bookmark and drives the upgrade from
/// a placeholder to a real icon.
pub struct IconPipeline {
    fetcher: Arc<dyn IconFetcher>,
    cache: Arc<FaviconCache>,
    config: PipelineConfig,
    inflight: Arc<Mutex<HashMap<String, Arc<OnceCell<DisplayIcon>>>>>,
}

impl IconPipeline {
    pub fn new(fetcher: Arc<dyn IconFetcher>, cache: Arc<FaviconCache>, config: PipelineConfig) -> Self {
        Self { fetcher, cache, config, inflight: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// The cache backing this pipeline.
    pub fn cache(&self) -> &Arc<FaviconCache> {
        &self.cache
    }

    /// Whether a candidate URL is a recognized placeholder.
    pub fn is_default_candidate(&self, candidate: &str) -> bool {
        candidate.is_empty()
            || self
                .config
                .default_icon_markers
                .iter()
                .any(|marker| candidate.contains(marker.as_str()))
    }

    /// Synchronous fast path: what should be displayed right now.
    ///
    /// Never touches the network; a cached non-default entry wins,
    /// otherwise the candidate is passed through (tagged `Default` when
    /// it is a recognized placeholder).
    pub fn get_display_icon(&self, site_url: &str, candidate: &str) -> Result<DisplayIcon, FaviconError> {
        let key = origin_key(site_url)?;

        if let Some(entry) = self.cache.get_cached(&key)
            && !entry.is_default
        {
            return Ok(DisplayIcon::Resolved(entry.url));
        }

        if self.is_default_candidate(candidate) {
            Ok(DisplayIcon::Default(candidate.to_string()))
        } else {
            Ok(DisplayIcon::Resolved(candidate.to_string()))
        }
    }

    /// Asynchronous upgrade from a placeholder to a real icon.
    ///
    /// No-ops when the cache already holds a non-default entry.
    /// Concurrent calls for the same origin within the coalescing window
    /// share one fetch chain and observe its single result. Exhaustion
    /// soft-fails to `Default(candidate)`.
    pub async fn upgrade_icon(&self, site_url: &str, candidate: &str) -> Result<DisplayIcon, FaviconError> {
        let key = origin_key(site_url)?;

        if let Some(entry) = self.cache.get_cached(&key)
            && !entry.is_default
        {
            return Ok(DisplayIcon::Resolved(entry.url));
        }

        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(key.clone()).or_default().clone()
        };

        let icon = cell.get_or_init(|| self.run_chain(&key, candidate)).await.clone();

        self.retire_slot_later(key);

        Ok(icon)
    }

    /// Read-through lookup: hydrated cache entry when available,
    /// otherwise the upgrade path.
    pub async fn get_favicon(&self, site_url: &str, fallback: &str) -> Result<DisplayIcon, FaviconError> {
        let key = origin_key(site_url)?;

        if let Some(entry) = self.cache.hydrate(&key).await
            && !entry.is_default
        {
            return Ok(DisplayIcon::Resolved(entry.url));
        }

        self.upgrade_icon(site_url, fallback).await
    }

    /// Run the bare provider chain for an origin, without cache or blob
    /// side effects. The relay's `/favicon` handler serves these bytes
    /// directly.
    pub async fn fetch_icon(&self, origin: &str, size: Option<u32>) -> Result<FetchedIcon, FaviconError> {
        let size = size.unwrap_or(self.config.icon_size);
        let mut attempts = Vec::new();

        for provider in &self.config.providers {
            let url = provider.url_for(origin, size);
            match self.fetcher.fetch_image(&url, provider.via_proxy).await {
                Ok(fetch) if looks_like_image(&fetch.bytes, fetch.content_type.as_deref()) => {
                    tracing::debug!("icon for {} served by {} ({} bytes)", origin, provider.name, fetch.bytes.len());
                    return Ok(FetchedIcon {
                        bytes: fetch.bytes,
                        content_type: fetch.content_type,
                        provider: provider.name.to_string(),
                        source_url: url,
                    });
                }
                Ok(_) => {
                    attempts.push(ProviderFailure {
                        provider: provider.name.to_string(),
                        reason: "payload is not an image".into(),
                    });
                }
                Err(err) => {
                    attempts.push(ProviderFailure { provider: provider.name.to_string(), reason: err.to_string() });
                }
            }
        }

        if self.config.discover_html {
            match self.discover_from_site(origin).await {
                Ok(icon) => return Ok(icon),
                Err(reason) => attempts.push(ProviderFailure { provider: "html-link".into(), reason }),
            }
        }

        Err(FaviconError::AllProvidersExhausted { origin: origin.to_string(), attempts })
    }

    async fn run_chain(&self, key: &str, candidate: &str) -> DisplayIcon {
        match self.fetch_icon(key, None).await {
            Ok(icon) => {
                let url = self
                    .cache
                    .store(
                        key,
                        &icon.bytes,
                        icon.content_type.as_deref(),
                        Some(&icon.provider),
                        Some(&icon.source_url),
                    )
                    .await;
                DisplayIcon::Resolved(url)
            }
            Err(err) => {
                tracing::debug!("icon upgrade failed for {key}: {err}; keeping placeholder");
                DisplayIcon::Default(candidate.to_string())
            }
        }
    }

    /// Last-resort discovery: fetch the site root and try its declared
    /// icon links, largest first.
    async fn discover_from_site(&self, origin: &str) -> Result<FetchedIcon, String> {
        let base_str = format!("https://{origin}/");
        let base = Url::parse(&base_str).map_err(|e| e.to_string())?;

        let page = self
            .fetcher
            .fetch_image(&base_str, false)
            .await
            .map_err(|e| format!("site root fetch failed: {e}"))?;
        let html = String::from_utf8_lossy(&page.bytes);

        for link in discover::discover_icon_links(&html, &base)
            .iter()
            .take(MAX_DISCOVERED_CANDIDATES)
        {
            if let Ok(fetch) = self.fetcher.fetch_image(&link.href, true).await
                && looks_like_image(&fetch.bytes, fetch.content_type.as_deref())
            {
                tracing::debug!("icon for {} discovered at {}", origin, link.href);
                return Ok(FetchedIcon {
                    bytes: fetch.bytes,
                    content_type: fetch.content_type,
                    provider: "html-link".to_string(),
                    source_url: link.href.clone(),
                });
            }
        }

        Err("no usable icon links in site HTML".to_string())
    }

    fn retire_slot_later(&self, key: String) {
        let inflight = Arc::clone(&self.inflight);
        let window = self.config.coalesce_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            inflight.lock().await.remove(&key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iconduit_core::BlobArena;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n-test-icon-bytes";

    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingFetcher {
        fn new(delay: Duration) -> Self {
            Self { calls: AtomicUsize::new(0), delay }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IconFetcher for CountingFetcher {
        async fn fetch_image(&self, _url: &str, _via_proxy: bool) -> Result<ProxyFetch, ProxyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(ProxyFetch {
                bytes: Bytes::from_static(PNG),
                content_type: Some("image/png".to_string()),
                endpoint: None,
                fetch_ms: 0,
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl IconFetcher for FailingFetcher {
        async fn fetch_image(&self, _url: &str, _via_proxy: bool) -> Result<ProxyFetch, ProxyError> {
            Err(ProxyError::HttpStatus { status: 404 })
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            discover_html: false,
            providers: vec![ProviderSpec {
                name: "test-provider",
                template: "https://icons.test/{domain}?sz={size}",
                via_proxy: false,
            }],
            ..Default::default()
        }
    }

    fn pipeline_with(fetcher: Arc<dyn IconFetcher>) -> IconPipeline {
        let cache = Arc::new(FaviconCache::new(Arc::new(BlobArena::new()), None));
        IconPipeline::new(fetcher, cache, test_config())
    }

    #[tokio::test]
    async fn test_display_icon_recognizes_default_candidate() {
        let pipeline = pipeline_with(Arc::new(FailingFetcher));
        let icon = pipeline.get_display_icon("https://example.com", "/icon/default.png").unwrap();
        assert_eq!(icon, DisplayIcon::Default("/icon/default.png".to_string()));
    }

    #[tokio::test]
    async fn test_display_icon_passes_real_candidate_through() {
        let pipeline = pipeline_with(Arc::new(FailingFetcher));
        let icon = pipeline
            .get_display_icon("https://example.com", "https://example.com/favicon.ico")
            .unwrap();
        assert_eq!(icon, DisplayIcon::Resolved("https://example.com/favicon.ico".to_string()));
    }

    #[tokio::test]
    async fn test_display_icon_empty_candidate_is_default() {
        let pipeline = pipeline_with(Arc::new(FailingFetcher));
        let icon = pipeline.get_display_icon("https://example.com", "").unwrap();
        assert!(icon.is_default());
    }

    #[tokio::test]
    async fn test_upgrade_populates_cache_and_fast_path() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::ZERO));
        let pipeline = pipeline_with(fetcher.clone());

        let icon = pipeline.upgrade_icon("https://example.com", "/icon/default.png").await.unwrap();
        let DisplayIcon::Resolved(url) = &icon else {
            panic!("expected Resolved, got {icon:?}");
        };
        assert!(url.starts_with("blob:iconduit/"));

        let entry = pipeline.cache().get_cached("example.com").unwrap();
        assert!(!entry.is_default);
        assert_eq!(&entry.url, url);
        assert_eq!(pipeline.cache().blobs().category_len(FAVICON_CATEGORY), 1);

        // The synchronous path now serves the upgraded icon.
        let display = pipeline.get_display_icon("https://example.com", "/icon/default.png").unwrap();
        assert_eq!(display, icon);
    }

    #[tokio::test]
    async fn test_concurrent_upgrades_coalesce_into_one_chain() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::from_millis(50)));
        let pipeline = pipeline_with(fetcher.clone());

        let (a, b) = tokio::join!(
            pipeline.upgrade_icon("https://example.com", "/icon/default.png"),
            pipeline.upgrade_icon("https://example.com", "/icon/default.png"),
        );

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_upgrade_after_success_skips_refetch() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::ZERO));
        let pipeline = pipeline_with(fetcher.clone());

        let first = pipeline.upgrade_icon("https://example.com", "/icon/default.png").await.unwrap();
        let second = pipeline.upgrade_icon("https://example.com", "/icon/default.png").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_distinct_origins_do_not_coalesce() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::ZERO));
        let pipeline = pipeline_with(fetcher.clone());

        pipeline.upgrade_icon("https://a.example", "").await.unwrap();
        pipeline.upgrade_icon("https://b.example", "").await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_upgrade_exhaustion_keeps_placeholder() {
        let pipeline = pipeline_with(Arc::new(FailingFetcher));

        let icon = pipeline.upgrade_icon("https://example.com", "/icon/default.png").await.unwrap();
        assert_eq!(icon, DisplayIcon::Default("/icon/default.png".to_string()));
        assert!(pipeline.cache().get_cached("example.com").is_none());
        assert_eq!(pipeline.cache().blobs().len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_icon_exhaustion_lists_attempts() {
        let pipeline = pipeline_with(Arc::new(FailingFetcher));

        let err = pipeline.fetch_icon("example.com", None).await.unwrap_err();
        match err {
            FaviconError::AllProvidersExhausted { origin, attempts } => {
                assert_eq!(origin, "example.com");
                assert_eq!(attempts.len(), 1);
                assert!(attempts[0].reason.contains("404"));
            }
            other => panic!("expected AllProvidersExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_upgrade_invalid_origin() {
        let pipeline = pipeline_with(Arc::new(FailingFetcher));
        let result = pipeline.upgrade_icon("", "/icon/default.png").await;
        assert!(matches!(result, Err(FaviconError::InvalidOrigin(_))));
    }

    #[tokio::test]
    async fn test_get_favicon_read_through() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::ZERO));
        let pipeline = pipeline_with(fetcher.clone());

        let icon = pipeline.get_favicon("https://example.com", "/icon/default.png").await.unwrap();
        assert!(!icon.is_default());
        assert_eq!(fetcher.calls(), 1);

        // Second read is served from cache.
        let again = pipeline.get_favicon("https://example.com", "/icon/default.png").await.unwrap();
        assert_eq!(icon, again);
        assert_eq!(fetcher.calls(), 1);
    }
}

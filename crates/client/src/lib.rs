//! Client code for iconduit.
//!
//! This crate provides the CORS-proxy fallback chain, the icon-provider
//! pipeline, and the favicon cache shared by the relay server and
//! embedding applications.

pub mod favicon;
pub mod proxy;
pub mod ssrf;

pub use favicon::{
    CacheEntry, DisplayIcon, FaviconCache, FaviconError, FetchedIcon, IconFetcher, IconPipeline, PipelineConfig,
};

pub use proxy::{ProxyConfig, ProxyError, ProxyFetch, ProxyRegistry, ProxyResolver, ProxyStatus};

pub use ssrf::{SsrfError, validate_ip, validate_target};

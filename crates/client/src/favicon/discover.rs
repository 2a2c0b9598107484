//! Icon link discovery from site HTML.
//!
//! Last-resort step of the provider chain: when every favicon service
//! comes up empty, the site's own `<link rel>` declarations often still
//! point at a usable icon.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static SIZES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)[xX](\d+)").expect("invalid sizes regex"));

/// A declared icon link, resolved against the page URL.
#[derive(Debug, Clone)]
pub struct IconLink {
    /// Resolved href URL
    pub href: String,
    /// Pixel area from the `sizes` attribute, when declared
    pub area: Option<u64>,
}

/// Extract icon links from an HTML document, resolving relative URLs
/// against the base URL.
///
/// Matches any `<link>` whose rel tokens mention an icon (`icon`,
/// `shortcut icon`, `apple-touch-icon`, ...), removes duplicates by
/// resolved href, and sorts largest declared size first so callers can
/// try the best candidates within a small cap.
pub fn discover_icon_links(html: &str, base_url: &Url) -> Vec<IconLink> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("link[rel][href]").expect("invalid selector");

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let rel = element.value().attr("rel").unwrap_or_default();
        if !rel
            .split_whitespace()
            .any(|token| token.to_ascii_lowercase().contains("icon"))
        {
            continue;
        }

        let href = match element.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty() || href.starts_with("data:") {
            continue;
        }

        let resolved = match base_url.join(href) {
            Ok(u) => u.to_string(),
            Err(_) => continue,
        };

        if !seen.insert(resolved.clone()) {
            continue;
        }

        let area = element.value().attr("sizes").and_then(parse_sizes_area);

        links.push(IconLink { href: resolved, area });
    }

    links.sort_by_key(|link| std::cmp::Reverse(link.area.unwrap_or(0)));
    links
}

/// Largest `WxH` product declared in a `sizes` attribute, if any.
fn parse_sizes_area(sizes: &str) -> Option<u64> {
    SIZES_RE
        .captures_iter(sizes)
        .filter_map(|cap| {
            let w: u64 = cap.get(1)?.as_str().parse().ok()?;
            let h: u64 = cap.get(2)?.as_str().parse().ok()?;
            Some(w * h)
        })
        .max()
}

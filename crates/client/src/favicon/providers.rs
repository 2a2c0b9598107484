//! Icon provider templates and image payload validation.

/// One third-party favicon service.
///
/// `{domain}` and `{size}` placeholders in the template are substituted
/// with the origin key and the requested pixel size. `via_proxy` marks
/// providers that browsers cannot read cross-origin, so their fetches go
/// through the relay chain.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub template: &'static str,
    pub via_proxy: bool,
}

impl ProviderSpec {
    /// Expand the template for one origin.
    pub fn url_for(&self, domain: &str, size: u32) -> String {
        self.template
            .replace("{domain}", domain)
            .replace("{size}", &size.to_string())
    }
}

/// Ordered provider fallback chain. Order is the try order.
pub const DEFAULT_PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "google-s2",
        template: "https://www.google.com/s2/favicons?domain={domain}&sz={size}",
        via_proxy: true,
    },
    ProviderSpec { name: "duckduckgo", template: "https://icons.duckduckgo.com/ip3/{domain}.ico", via_proxy: true },
    ProviderSpec { name: "favicon-im", template: "https://favicon.im/{domain}?larger=true", via_proxy: true },
    ProviderSpec { name: "site-root", template: "https://{domain}/favicon.ico", via_proxy: false },
];

/// Decide whether a fetched payload is a usable icon.
///
/// Providers answer 200 with HTML or JSON error pages often enough that
/// status alone cannot be trusted; the payload has to sniff as an image.
pub fn looks_like_image(bytes: &[u8], content_type: Option<&str>) -> bool {
    if bytes.is_empty() {
        return false;
    }

    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.starts_with("text/html") || ct.starts_with("application/json") {
            return false;
        }
        if ct.starts_with("image/") {
            return true;
        }
    }

    has_image_magic(bytes) || looks_like_svg(bytes)
}

fn has_image_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || bytes.starts_with(b"\xff\xd8\xff")
        || bytes.starts_with(b"\x00\x00\x01\x00")
        || bytes.starts_with(b"BM")
        || (bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP")
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let trimmed = head.trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && head.contains("<svg"))
}

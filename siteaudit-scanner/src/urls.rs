// URL canonicalization helpers shared by every stage

use url::Url;

/// Path suffixes that identify static assets rather than pages.
pub const ASSET_SUFFIXES: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".avif", ".ico", ".bmp", ".tif", ".tiff",
    ".pdf", ".css", ".js", ".mjs", ".map", ".json", ".xml", ".txt", ".csv", ".zip", ".gz",
    ".mp3", ".mp4", ".webm", ".mov", ".avi", ".woff", ".woff2", ".ttf", ".otf", ".eot",
];

/// True when the URL path ends in a known static-asset suffix.
pub fn is_asset_url(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase(),
    };
    ASSET_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Key used to compare URLs across reports: scheme, host, port and path.
/// Query and fragment are dropped and a trailing slash is removed unless the
/// path is the root.
pub fn normalize_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    let mut path = parsed.path().to_string();
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() {
        path.push('/');
    }

    Some(format!("{}://{}{}{}", parsed.scheme(), host, port, path))
}

/// Like [`normalize_url`] but falls back to the trimmed input for strings the
/// URL parser rejects, so callers always get a key.
pub fn url_key(url: &str) -> String {
    normalize_url(url).unwrap_or_else(|| url.trim().to_string())
}

/// Scheme and `www.` host alternates of a canonical URL.
///
/// Only a secure URL gets a scheme variant (https -> http); an insecure URL
/// is never flipped to https. The host variant toggles a leading `www.`.
/// Path and query are carried over unchanged and the canonical URL itself is
/// never returned.
pub fn url_variants(canonical: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(canonical) else {
        return Vec::new();
    };

    let mut variants = Vec::new();

    if parsed.scheme() == "https" {
        let mut insecure = parsed.clone();
        if insecure.set_scheme("http").is_ok() {
            variants.push(insecure.to_string());
        }
    }

    if let Some(url::Host::Domain(host)) = parsed.host() {
        let toggled = match host.strip_prefix("www.") {
            Some(bare) if !bare.is_empty() => bare.to_string(),
            Some(_) => String::new(),
            None => format!("www.{}", host),
        };
        if !toggled.is_empty() {
            let mut alternate = parsed.clone();
            if alternate.set_host(Some(&toggled)).is_ok() {
                variants.push(alternate.to_string());
            }
        }
    }

    let canonical_serialized = parsed.to_string();
    variants.retain(|v| v != &canonical_serialized && v != canonical);
    variants.dedup();
    variants
}

/// Resolve an href found on `base` into an absolute http(s) URL without its
/// fragment. Non-navigational hrefs yield `None`.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);

    Some(resolved.to_string())
}

/// The URL parser's serialization of `url`, e.g. `https://a.test` becomes
/// `https://a.test/`. Unparseable input is returned trimmed.
pub fn canonical_form(url: &str) -> String {
    Url::parse(url.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.trim().to_string())
}

// Sitemap loading with lenient <loc> extraction

use crate::error::{Result, ScanError};
use crate::http::send_with_retry;
use crate::retry::RetryPolicy;
use reqwest::{Client, Method};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Where a sitemap comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapSource {
    Remote(String),
    File(String),
}

impl SitemapSource {
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SitemapSource::Remote(trimmed.to_string())
        } else {
            SitemapSource::File(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SitemapSource::Remote(s) | SitemapSource::File(s) => s,
        }
    }
}

pub struct SitemapResolver {
    client: Client,
    retry: RetryPolicy,
}

impl SitemapResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::http_default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve a sitemap reference (file path or http(s) URL) into its ordered,
    /// de-duplicated list of page URLs. Unreadable sources and sitemaps with no
    /// `<loc>` entries are errors.
    pub async fn resolve(&self, reference: &str) -> Result<Vec<String>> {
        let source = SitemapSource::parse(reference);
        let body = self.read_source(&source).await?;
        let locs = extract_loc_values(&body);

        let urls = if is_sitemap_index(&body) {
            info!("{} is a sitemap index with {} children", reference, locs.len());
            let mut urls = Vec::new();
            for child in &locs {
                match self.read_source(&SitemapSource::parse(child)).await {
                    Ok(child_body) => urls.extend(extract_loc_values(&child_body)),
                    Err(e) => warn!("Skipping nested sitemap {}: {}", child, e),
                }
            }
            urls
        } else {
            locs
        };

        let urls = dedup_preserving_order(urls);
        if urls.is_empty() {
            return Err(ScanError::EmptySitemap(reference.to_string()));
        }

        info!("Resolved {} URLs from {}", urls.len(), reference);
        Ok(urls)
    }

    async fn read_source(&self, source: &SitemapSource) -> Result<String> {
        match source {
            SitemapSource::File(path) => {
                debug!("Reading sitemap file {}", path);
                tokio::fs::read_to_string(Path::new(path))
                    .await
                    .map_err(|e| ScanError::fetch(path.clone(), e))
            }
            SitemapSource::Remote(url) => {
                debug!("Fetching sitemap {}", url);
                let response = send_with_retry(&self.client, Method::GET, url, &self.retry)
                    .await
                    .map_err(|e| ScanError::fetch(url.clone(), e))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ScanError::fetch(url.clone(), format!("HTTP {}", status)));
                }
                response
                    .text()
                    .await
                    .map_err(|e| ScanError::fetch(url.clone(), e))
            }
        }
    }
}

/// Pull every `<loc>...</loc>` value out of a document without requiring it
/// to be well-formed XML. CDATA wrappers and the common XML entities are
/// unwrapped.
pub fn extract_loc_values(xml: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while let Some(open_idx) = find_ascii_ci(&xml[start..], "<loc>") {
        let open = start + open_idx + 5;
        let Some(close_rel) = find_ascii_ci(&xml[open..], "</loc>") else {
            break;
        };
        let close = open + close_rel;
        let value = unescape_loc(xml[open..close].trim());
        if !value.is_empty() {
            out.push(value);
        }
        start = close + 6;
    }
    out
}

pub fn is_sitemap_index(xml: &str) -> bool {
    find_ascii_ci(xml, "<sitemapindex").is_some()
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn unescape_loc(raw: &str) -> String {
    let inner = raw
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(raw)
        .trim();
    inner
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn resolver() -> SitemapResolver {
        let client = build_client(Duration::from_secs(5), true).unwrap();
        SitemapResolver::new(client).with_retry_policy(RetryPolicy::none())
    }

    #[test]
    fn test_extract_loc_values_is_lenient() {
        let xml = r#"<urlset><url><loc> https://example.com/ </loc></url>
            <url><LOC>https://example.com/a?x=1&amp;y=2</LOC>
            <url><loc><![CDATA[https://example.com/b]]></loc>
            <loc></loc><loc>https://example.com/unterminated"#;
        assert_eq!(
            extract_loc_values(xml),
            vec![
                "https://example.com/".to_string(),
                "https://example.com/a?x=1&y=2".to_string(),
                "https://example.com/b".to_string(),
            ]
        );
    }

    #[test]
    fn test_source_detection() {
        assert_eq!(
            SitemapSource::parse("HTTPS://example.com/sitemap.xml"),
            SitemapSource::Remote("HTTPS://example.com/sitemap.xml".to_string())
        );
        assert_eq!(
            SitemapSource::parse("./sitemap.xml"),
            SitemapSource::File("./sitemap.xml".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_from_file_dedups() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "<urlset><loc>https://example.com/</loc><loc>https://example.com/a</loc><loc>https://example.com/</loc></urlset>"
        )
        .unwrap();

        let urls = resolver()
            .resolve(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://example.com/", "https://example.com/a"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let err = resolver()
            .resolve("/definitely/not/here/sitemap.xml")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::FetchError { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_sitemap_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<urlset></urlset>"))
            .mount(&mock_server)
            .await;

        let err = resolver()
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::EmptySitemap(_)));
    }

    #[tokio::test]
    async fn test_http_error_status_is_fetch_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let err = resolver()
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::FetchError { .. }));
    }

    #[tokio::test]
    async fn test_sitemap_index_is_followed() {
        let mock_server = MockServer::start().await;
        let index = format!(
            "<sitemapindex><sitemap><loc>{0}/pages.xml</loc></sitemap><sitemap><loc>{0}/missing.xml</loc></sitemap></sitemapindex>",
            mock_server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pages.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<urlset><url><loc>https://example.com/</loc></url><url><loc>https://example.com/rooms</loc></url></urlset>",
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let urls = resolver()
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://example.com/", "https://example.com/rooms"]);
    }
}

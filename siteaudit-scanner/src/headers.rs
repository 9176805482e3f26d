// HTTP header capture for canonical URLs and their variants

use crate::http::send_with_retry;
use crate::retry::RetryPolicy;
use crate::urls::url_variants;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Headers worth recording. Anything else on the response is ignored.
pub const HEADER_ALLOWLIST: &[&str] = &[
    "strict-transport-security",
    "cache-control",
    "content-type",
    "server",
    "x-vercel-cache",
    "x-vercel-id",
    "age",
    "vary",
    "etag",
];

/// Outcome of inspecting one URL. Absent headers are simply missing from
/// `headers`; a network failure yields the `Failed` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderResult {
    #[serde(rename_all = "camelCase")]
    Captured {
        requested: String,
        final_url: String,
        status: u16,
        headers: BTreeMap<String, String>,
    },
    Failed { requested: String, error: String },
}

impl HeaderResult {
    pub fn requested(&self) -> &str {
        match self {
            HeaderResult::Captured { requested, .. } | HeaderResult::Failed { requested, .. } => {
                requested
            }
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            HeaderResult::Captured { headers, .. } => headers.get(name).map(String::as_str),
            HeaderResult::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, HeaderResult::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCheck {
    pub variant: String,
    pub result: HeaderResult,
}

/// All header checks for one canonical URL. The first check is always the
/// canonical URL itself, followed by its variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub url: String,
    pub checks: Vec<HeaderCheck>,
}

impl HeaderEntry {
    pub fn canonical(&self) -> Option<&HeaderResult> {
        self.checks
            .iter()
            .find(|check| check.variant == self.url)
            .or_else(|| self.checks.first())
            .map(|check| &check.result)
    }
}

pub struct HeaderInspector {
    client: Client,
    retry: RetryPolicy,
}

impl HeaderInspector {
    /// `client` decides whether redirects are followed before headers are
    /// read; the resulting URL is reported as `final_url`.
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

    /// HEAD the URL, falling back to GET when the server rejects HEAD with
    /// 405 or 501.
    pub async fn inspect(&self, url: &str) -> HeaderResult {
        let head = send_with_retry(&self.client, Method::HEAD, url, &self.retry).await;

        let response = match head {
            Ok(response)
                if response.status() == StatusCode::METHOD_NOT_ALLOWED
                    || response.status() == StatusCode::NOT_IMPLEMENTED =>
            {
                debug!("HEAD rejected by {} ({}), retrying with GET", url, response.status());
                send_with_retry(&self.client, Method::GET, url, &self.retry).await
            }
            other => other,
        };

        match response {
            Ok(response) => {
                let headers = HEADER_ALLOWLIST
                    .iter()
                    .filter_map(|name| {
                        response
                            .headers()
                            .get(*name)
                            .and_then(|v| v.to_str().ok())
                            .map(|v| (name.to_string(), v.to_string()))
                    })
                    .collect();
                HeaderResult::Captured {
                    requested: url.to_string(),
                    final_url: response.url().to_string(),
                    status: response.status().as_u16(),
                    headers,
                }
            }
            Err(e) => {
                warn!("Header inspection failed for {}: {}", url, e);
                HeaderResult::Failed {
                    requested: url.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Inspect the canonical URL and every variant of it.
    pub async fn inspect_all(&self, canonical: &str) -> HeaderEntry {
        let mut checks = vec![HeaderCheck {
            variant: canonical.to_string(),
            result: self.inspect(canonical).await,
        }];
        for variant in url_variants(canonical) {
            let result = self.inspect(&variant).await;
            checks.push(HeaderCheck { variant, result });
        }
        HeaderEntry {
            url: canonical.to_string(),
            checks,
        }
    }
}

// Manual redirect-chain following for canonical URLs and their variants

use crate::http::send_with_retry;
use crate::retry::RetryPolicy;
use crate::urls::{canonical_form, url_variants};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

pub const MAX_REDIRECT_HOPS: usize = 10;

/// One request in a redirect chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectHop {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    /// Absolute Location header, resolved against `url`.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Why a chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStop {
    /// Non-redirect status reached.
    Completed,
    /// 3xx without a usable Location header.
    MissingLocation,
    /// Location pointed back at the requested URL.
    SelfLoop,
    /// Hop bound reached while still redirecting.
    HopLimit,
    /// Network failure on the last hop.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectChain {
    pub hops: Vec<RedirectHop>,
    pub stop: ChainStop,
}

impl RedirectChain {
    /// URL of the last request made.
    pub fn final_url(&self) -> Option<&str> {
        self.hops.last().map(|hop| hop.url.as_str())
    }

    pub fn final_status(&self) -> Option<u16> {
        self.hops.last().and_then(|hop| hop.status)
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn redirect_count(&self) -> usize {
        self.hops
            .iter()
            .filter(|hop| matches!(hop.status, Some(300..=399)))
            .count()
    }
}

/// Redirect results for a canonical URL and each of its variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectResult {
    pub url: String,
    pub chain: RedirectChain,
    pub variants: BTreeMap<String, RedirectChain>,
}

pub struct RedirectChainResolver {
    client: Client,
    retry: RetryPolicy,
}

impl RedirectChainResolver {
    /// `client` must be built with automatic redirects disabled.
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

    /// Follow redirects from `start_url` one GET at a time. Network failures
    /// end the chain with an error hop instead of returning an error.
    ///
    /// Every hop URL is in parsed form, so the first hop compares equal to a
    /// Location pointing at the same resource.
    pub async fn follow(&self, start_url: &str) -> RedirectChain {
        let mut hops = Vec::new();
        let mut current = canonical_form(start_url);

        loop {
            if hops.len() >= MAX_REDIRECT_HOPS {
                debug!("Hop limit reached for {}", start_url);
                return RedirectChain {
                    hops,
                    stop: ChainStop::HopLimit,
                };
            }

            let response =
                match send_with_retry(&self.client, Method::GET, &current, &self.retry).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Redirect probe failed for {}: {}", current, e);
                        hops.push(RedirectHop {
                            url: current,
                            status: None,
                            location: None,
                            error: Some(e.to_string()),
                        });
                        return RedirectChain {
                            hops,
                            stop: ChainStop::Error,
                        };
                    }
                };

            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|raw| resolve_location(&current, &raw));

            hops.push(RedirectHop {
                url: current.clone(),
                status: Some(status),
                location: location.clone(),
                error: None,
            });

            if !(300..400).contains(&status) {
                return RedirectChain {
                    hops,
                    stop: ChainStop::Completed,
                };
            }

            match location {
                None => {
                    return RedirectChain {
                        hops,
                        stop: ChainStop::MissingLocation,
                    };
                }
                Some(next) if next == current => {
                    return RedirectChain {
                        hops,
                        stop: ChainStop::SelfLoop,
                    };
                }
                Some(next) => current = next,
            }
        }
    }

    /// Chain for the canonical URL plus one chain per generated variant.
    pub async fn resolve(&self, canonical: &str) -> RedirectResult {
        let chain = self.follow(canonical).await;
        let mut variants = BTreeMap::new();
        for variant in url_variants(canonical) {
            let variant_chain = self.follow(&variant).await;
            variants.insert(variant, variant_chain);
        }
        RedirectResult {
            url: canonical.to_string(),
            chain,
            variants,
        }
    }
}

fn resolve_location(current: &str, raw: &str) -> String {
    Url::parse(current)
        .ok()
        .and_then(|base| base.join(raw).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| raw.to_string())
}

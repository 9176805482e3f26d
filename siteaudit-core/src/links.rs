// Inbound-link graph over the sitemap's closed set of pages, plus social
// preview metadata checks

use siteaudit_scanner::result::{OpenGraphMeta, PageOutcome, TwitterMeta};
use siteaudit_scanner::urls::{is_asset_url, url_key};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::report::{LinkPage, LinkReport, generated_at};

/// A page "has an X card" when it declares a Twitter card type, or when any
/// of the Open Graph title, description or image is present as a fallback.
pub fn has_x_card(twitter: &TwitterMeta, og: &OpenGraphMeta) -> bool {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    present(&twitter.card) || present(&og.title) || present(&og.description) || present(&og.image)
}

/// Inbound referrers per sitemap page. Only links whose normalized target is
/// a sitemap key are credited, and each referrer counts once per target.
#[derive(Debug, Default)]
pub struct LinkGraphBuilder {
    inbound: HashMap<String, BTreeSet<String>>,
}

impl LinkGraphBuilder {
    pub fn new(sitemap_urls: &[String]) -> Self {
        Self {
            inbound: sitemap_urls
                .iter()
                .map(|url| (url_key(url), BTreeSet::new()))
                .collect(),
        }
    }

    /// Record the outbound links of the page at `referrer`.
    pub fn add_page(&mut self, referrer: &str, outbound_links: &[String]) {
        for link in outbound_links {
            match self.inbound.get_mut(&url_key(link)) {
                Some(referrers) => {
                    referrers.insert(referrer.to_string());
                }
                None => debug!("Ignoring link to {} outside the sitemap", link),
            }
        }
    }

    pub fn inbound(&self, url: &str) -> Option<&BTreeSet<String>> {
        self.inbound.get(&url_key(url))
    }

    pub fn inbound_count(&self, url: &str) -> usize {
        self.inbound(url).map_or(0, BTreeSet::len)
    }

    pub fn is_orphan(&self, url: &str) -> bool {
        self.inbound_count(url) == 0
    }
}

/// Build the link/social report for the sitemap. Assets are left out; pages
/// that failed to render are listed with their error and are not counted as
/// missing an X card.
pub fn build_link_report(sitemap: &str, urls: &[String], outcomes: &[PageOutcome]) -> LinkReport {
    let mut graph = LinkGraphBuilder::new(urls);
    for page in outcomes.iter().filter_map(PageOutcome::page) {
        graph.add_page(&page.url, &page.outbound_links);
    }

    let by_url: HashMap<&str, &PageOutcome> = outcomes.iter().map(|o| (o.url(), o)).collect();

    let mut pages = Vec::new();
    let mut pages_with_no_inbound = Vec::new();
    let mut pages_missing_x_card = Vec::new();

    for url in urls.iter().filter(|url| !is_asset_url(url)) {
        let inbound_from: Vec<String> = graph
            .inbound(url)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        if inbound_from.is_empty() {
            pages_with_no_inbound.push(url.clone());
        }

        let outcome = by_url.get(url.as_str());
        let (twitter, og, error) = match outcome.and_then(|o| o.page()) {
            Some(page) => (page.twitter.clone(), page.og.clone(), None),
            None => (
                TwitterMeta::default(),
                OpenGraphMeta::default(),
                Some(
                    outcome
                        .and_then(|o| o.error())
                        .unwrap_or("not rendered")
                        .to_string(),
                ),
            ),
        };

        let x_card = has_x_card(&twitter, &og);
        if !x_card && error.is_none() {
            pages_missing_x_card.push(url.clone());
        }

        pages.push(LinkPage {
            url: url.clone(),
            inbound_count: inbound_from.len(),
            inbound_from,
            has_x_card: x_card,
            twitter,
            og,
            error,
        });
    }

    LinkReport {
        generated_at: generated_at(),
        sitemap: sitemap.to_string(),
        total_pages: pages.len(),
        pages,
        pages_with_no_inbound,
        pages_missing_x_card,
    }
}

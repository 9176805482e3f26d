// Title, description, indexing and duplicate-content checks over rendered pages

use siteaudit_scanner::result::{PageExtract, PageOutcome};
use siteaudit_scanner::urls::{is_asset_url, url_key};
use std::collections::HashMap;

use crate::report::{
    CanonicalMismatch, ContentReport, ContentSummary, DuplicateGroup, FailedPage, generated_at,
};
use crate::similarity::ContentSimilarityDetector;

/// Build the content report. `urls` is the raw sitemap list (assets
/// included, for counting); only rendered pages take part in the analyses.
pub fn build_content_report(
    sitemap: &str,
    urls: &[String],
    outcomes: &[PageOutcome],
    detector: &ContentSimilarityDetector,
) -> ContentReport {
    let pages: Vec<&PageExtract> = outcomes
        .iter()
        .filter_map(PageOutcome::page)
        .filter(|page| !is_asset_url(&page.url))
        .collect();

    let failed_pages: Vec<FailedPage> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            PageOutcome::Failed {
                url,
                error,
                attempts,
            } => Some(FailedPage {
                url: url.clone(),
                error: error.clone(),
                attempts: *attempts,
            }),
            _ => None,
        })
        .collect();

    let duplicate_titles = duplicate_groups(&pages, |page| &page.title);
    let duplicate_descriptions = duplicate_groups(&pages, |page| &page.description);

    let missing_descriptions: Vec<String> = pages
        .iter()
        .filter(|page| page.description.trim().is_empty())
        .map(|page| page.url.clone())
        .collect();

    let noindex_pages: Vec<String> = pages
        .iter()
        .filter(|page| page.is_noindex())
        .map(|page| page.url.clone())
        .collect();

    let canonical_mismatches: Vec<CanonicalMismatch> = pages
        .iter()
        .filter_map(|page| {
            let canonical = page.canonical_link.as_deref()?;
            (url_key(canonical) != url_key(&page.url)).then(|| CanonicalMismatch {
                url: page.url.clone(),
                canonical: canonical.to_string(),
            })
        })
        .collect();

    let texts: Vec<(&str, &str)> = pages
        .iter()
        .map(|page| (page.url.as_str(), page.normalized_body_text.as_str()))
        .collect();
    let similar_content_pairs = detector.detect(&texts);

    let summary = ContentSummary {
        total_urls: urls.len(),
        asset_urls: urls.iter().filter(|url| is_asset_url(url)).count(),
        rendered_pages: pages.len(),
        failed_pages: failed_pages.len(),
        duplicate_title_groups: duplicate_titles.len(),
        missing_descriptions: missing_descriptions.len(),
        duplicate_description_groups: duplicate_descriptions.len(),
        similar_pairs: similar_content_pairs.len(),
        noindex_pages: noindex_pages.len(),
        canonical_mismatches: canonical_mismatches.len(),
    };

    ContentReport {
        generated_at: generated_at(),
        sitemap: sitemap.to_string(),
        urls: urls.to_vec(),
        summary,
        duplicate_titles,
        missing_descriptions,
        duplicate_descriptions,
        similar_content_pairs,
        noindex_pages,
        canonical_mismatches,
        failed_pages,
    }
}

/// Group pages by a non-empty field value, keeping groups with more than one
/// page. Groups and their URLs are in first-seen order.
fn duplicate_groups<'a, F>(pages: &[&'a PageExtract], field: F) -> Vec<DuplicateGroup>
where
    F: Fn(&'a PageExtract) -> &'a String,
{
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<String>> = HashMap::new();

    for page in pages {
        let value = field(page).trim();
        if value.is_empty() {
            continue;
        }
        groups
            .entry(value)
            .or_insert_with(|| {
                order.push(value);
                Vec::new()
            })
            .push(page.url.clone());
    }

    order
        .into_iter()
        .filter_map(|value| {
            let urls = groups.remove(value)?;
            (urls.len() > 1).then(|| DuplicateGroup {
                value: value.to_string(),
                urls,
            })
        })
        .collect()
}

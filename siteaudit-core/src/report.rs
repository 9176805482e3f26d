// Report documents written by each stage, and their persistence

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use siteaudit_scanner::error::{Result, ScanError};
use siteaudit_scanner::headers::HeaderEntry;
use siteaudit_scanner::redirect::RedirectResult;
use siteaudit_scanner::result::{OpenGraphMeta, TwitterMeta};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::similarity::SimilarityPair;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectReport {
    pub generated_at: String,
    pub sitemap: String,
    pub results: Vec<RedirectResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderReport {
    pub generated_at: String,
    pub sitemap: String,
    pub entries: Vec<HeaderEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    /// Every sitemap URL, assets included.
    pub total_urls: usize,
    pub asset_urls: usize,
    pub rendered_pages: usize,
    pub failed_pages: usize,
    pub duplicate_title_groups: usize,
    pub missing_descriptions: usize,
    pub duplicate_description_groups: usize,
    pub similar_pairs: usize,
    pub noindex_pages: usize,
    pub canonical_mismatches: usize,
}

/// Pages sharing one title or description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub value: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMismatch {
    pub url: String,
    pub canonical: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPage {
    pub url: String,
    pub error: String,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentReport {
    pub generated_at: String,
    pub sitemap: String,
    pub urls: Vec<String>,
    pub summary: ContentSummary,
    pub duplicate_titles: Vec<DuplicateGroup>,
    pub missing_descriptions: Vec<String>,
    pub duplicate_descriptions: Vec<DuplicateGroup>,
    pub similar_content_pairs: Vec<SimilarityPair>,
    pub noindex_pages: Vec<String>,
    pub canonical_mismatches: Vec<CanonicalMismatch>,
    pub failed_pages: Vec<FailedPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPage {
    pub url: String,
    pub inbound_count: usize,
    pub inbound_from: Vec<String>,
    pub has_x_card: bool,
    pub twitter: TwitterMeta,
    pub og: OpenGraphMeta,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkReport {
    pub generated_at: String,
    pub sitemap: String,
    pub total_pages: usize,
    pub pages: Vec<LinkPage>,
    pub pages_with_no_inbound: Vec<String>,
    pub pages_missing_x_card: Vec<String>,
}

pub fn generated_at() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Serialize `report` as pretty JSON, replacing any existing file.
pub fn save_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    save_report(&json, path)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ScanError::fetch(path.display().to_string(), format!("cannot read report: {}", e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ScanError::ParseError(format!("{} is not a valid report: {}", path.display(), e))
    })
}

// Join of the redirect and header reports into the final audit (text + CSV)

use serde::Serialize;
use siteaudit_scanner::error::Result;
use siteaudit_scanner::headers::{HeaderEntry, HeaderResult};
use siteaudit_scanner::redirect::{ChainStop, RedirectResult};
use siteaudit_scanner::urls::{canonical_form, url_key};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::report::{HeaderReport, RedirectReport};

pub const CSV_HEADER: [&str; 8] = [
    "url",
    "finalUrl",
    "finalStatus",
    "variantIssues",
    "hsts",
    "cache",
    "x-vercel-cache",
    "content-type",
];

/// A variant whose redirects end somewhere other than the canonical URL's.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantIssue {
    pub variant: String,
    pub final_url: Option<String>,
    pub final_status: Option<u16>,
}

impl VariantIssue {
    fn describe(&self) -> String {
        format!(
            "{} -> {} ({})",
            self.variant,
            self.final_url.as_deref().unwrap_or("-"),
            self.final_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "error".to_string())
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRow {
    pub url: String,
    pub final_url: Option<String>,
    pub final_status: Option<u16>,
    pub chain_stop: Option<ChainStop>,
    pub redirect_count: usize,
    pub variant_issues: Vec<VariantIssue>,
    pub hsts: Option<String>,
    pub cache: Option<String>,
    pub vercel_cache: Option<String>,
    pub content_type: Option<String>,
    pub header_error: Option<String>,
}

impl AuditRow {
    fn with_redirects(result: &RedirectResult) -> Self {
        let canonical_final = result.chain.final_url();
        let expected = canonical_final.map(canonical_form);
        let variant_issues = result
            .variants
            .iter()
            .filter(|(_, chain)| chain.final_url().map(canonical_form) != expected)
            .map(|(variant, chain)| VariantIssue {
                variant: variant.clone(),
                final_url: chain.final_url().map(str::to_string),
                final_status: chain.final_status(),
            })
            .collect();

        Self {
            url: result.url.clone(),
            final_url: canonical_final.map(str::to_string),
            final_status: result.chain.final_status(),
            chain_stop: Some(result.chain.stop),
            redirect_count: result.chain.redirect_count(),
            variant_issues,
            ..Default::default()
        }
    }

    fn apply_headers(&mut self, entry: &HeaderEntry) {
        let Some(canonical) = entry.canonical() else {
            return;
        };
        if let HeaderResult::Failed { error, .. } = canonical {
            self.header_error = Some(error.clone());
            return;
        }
        let get = |name: &str| canonical.header(name).map(str::to_string);
        self.hsts = get("strict-transport-security");
        self.cache = get("cache-control");
        self.vercel_cache = get("x-vercel-cache");
        self.content_type = get("content-type");
    }

    pub fn has_issues(&self) -> bool {
        !self.variant_issues.is_empty()
            || self.header_error.is_some()
            || !matches!(self.chain_stop, Some(ChainStop::Completed) | None)
    }
}

/// Join redirect results with header entries by normalized URL. Rows follow
/// redirect report order; header-only URLs are appended after.
pub fn aggregate(redirects: &RedirectReport, headers: &HeaderReport) -> Vec<AuditRow> {
    let header_by_key: HashMap<String, &HeaderEntry> = headers
        .entries
        .iter()
        .map(|entry| (url_key(&entry.url), entry))
        .collect();

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(redirects.results.len());

    for result in &redirects.results {
        let key = url_key(&result.url);
        let mut row = AuditRow::with_redirects(result);
        match header_by_key.get(&key) {
            Some(entry) => row.apply_headers(entry),
            None => debug!("No header entry for {}", result.url),
        }
        seen.insert(key);
        rows.push(row);
    }

    for entry in &headers.entries {
        if seen.insert(url_key(&entry.url)) {
            let mut row = AuditRow {
                url: entry.url.clone(),
                ..Default::default()
            };
            row.apply_headers(entry);
            rows.push(row);
        }
    }

    rows
}

pub fn generate_text_report(rows: &[AuditRow], sitemap: &str, generated_at: &str) -> String {
    let rule = "━".repeat(80);
    let mut report = String::new();

    report.push_str(&format!("{}\n", rule));
    report.push_str("                           SITEAUDIT AUDIT REPORT\n");
    report.push_str(&format!("{}\n\n", rule));

    report.push_str(&format!("Sitemap:      {}\n", sitemap));
    report.push_str(&format!("Generated:    {}\n", generated_at));
    report.push_str(&format!("URLs:         {}\n", rows.len()));

    let with_issues = rows.iter().filter(|r| r.has_issues()).count();
    let variant_issues: usize = rows.iter().map(|r| r.variant_issues.len()).sum();
    let missing_hsts = rows
        .iter()
        .filter(|r| r.header_error.is_none() && r.hsts.is_none())
        .count();
    report.push_str(&format!("With issues:  {}\n", with_issues));
    report.push_str(&format!("Variant mismatches: {}\n", variant_issues));
    report.push_str(&format!("Missing HSTS: {}\n\n", missing_hsts));

    report.push_str(&format!("{}\n", rule));
    report.push_str("PER-URL DETAIL\n");
    report.push_str(&format!("{}\n\n", rule));

    for row in rows {
        let marker = if row.has_issues() { "[!]" } else { "[+]" };
        report.push_str(&format!("{} {}\n", marker, row.url));
        report.push_str(&format!(
            "    Final:         {} ({})\n",
            row.final_url.as_deref().unwrap_or("-"),
            row.final_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
        if row.redirect_count > 0 {
            report.push_str(&format!("    Redirects:     {}\n", row.redirect_count));
        }
        if let Some(stop) = row.chain_stop
            && stop != ChainStop::Completed
        {
            report.push_str(&format!("    Chain stopped: {:?}\n", stop));
        }
        for issue in &row.variant_issues {
            report.push_str(&format!("    Variant:       {}\n", issue.describe()));
        }
        if let Some(ref error) = row.header_error {
            report.push_str(&format!("    Headers:       error: {}\n", error));
        } else {
            report.push_str(&format!("    HSTS:          {}\n", dash(&row.hsts)));
            report.push_str(&format!("    Cache-Control: {}\n", dash(&row.cache)));
            report.push_str(&format!("    Vercel cache:  {}\n", dash(&row.vercel_cache)));
            report.push_str(&format!("    Content-Type:  {}\n", dash(&row.content_type)));
        }
        report.push('\n');
    }

    report.push_str(&format!("{}\n", rule));
    report.push_str("                               End of Report\n");
    report.push_str(&format!("{}\n", rule));

    report
}

fn dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Write the rows as CSV with every field quoted.
pub fn write_csv<W: Write>(rows: &[AuditRow], writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    csv.write_record(CSV_HEADER)?;
    for row in rows {
        let issues = row
            .variant_issues
            .iter()
            .map(VariantIssue::describe)
            .collect::<Vec<_>>()
            .join("; ");
        let status = row.final_status.map(|s| s.to_string()).unwrap_or_default();
        csv.write_record([
            row.url.as_str(),
            row.final_url.as_deref().unwrap_or(""),
            status.as_str(),
            issues.as_str(),
            row.hsts.as_deref().unwrap_or(""),
            row.cache.as_deref().unwrap_or(""),
            row.vercel_cache.as_deref().unwrap_or(""),
            row.content_type.as_deref().unwrap_or(""),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn save_csv(rows: &[AuditRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(rows, file)
}

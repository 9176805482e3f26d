// Audit configuration: defaults, environment and output locations

use siteaudit_scanner::RetryPolicy;
use siteaudit_scanner::error::{Result, ScanError};
use siteaudit_scanner::render::NAVIGATION_TIMEOUT;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SITEMAP: &str = "https://www.example.com/sitemap.xml";
pub const SITEMAP_ENV: &str = "SITEAUDIT_SITEMAP";
pub const DEFAULT_OUT_DIR: &str = "./audit-reports";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub const REDIRECT_REPORT_FILE: &str = "redirect-report.json";
pub const HEADER_REPORT_FILE: &str = "header-report.json";
pub const CONTENT_REPORT_FILE: &str = "content-report.json";
pub const LINK_REPORT_FILE: &str = "link-report.json";
pub const AUDIT_TEXT_FILE: &str = "audit-report.txt";
pub const AUDIT_CSV_FILE: &str = "audit-report.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    /// Headless Chromium, scripts executed.
    Chromium,
    /// Raw HTML over HTTP, no scripts.
    Static,
}

impl FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" | "browser" => Ok(RendererKind::Chromium),
            "static" | "html" => Ok(RendererKind::Static),
            other => Err(format!("unknown renderer '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub out_dir: PathBuf,
    pub http_timeout: Duration,
    pub nav_timeout: Duration,
    pub render_retry: RetryPolicy,
    pub batch_size: usize,
    /// Redirect and header probes in flight at once. 1 means sequential.
    pub probe_concurrency: usize,
    pub similarity_threshold: f64,
    pub shingle_size: usize,
    /// Pages with fewer shingles than this are left out of similarity
    /// pairing. 0 keeps every page, including blank ones.
    pub min_shingles: usize,
    pub renderer: RendererKind,
    pub show_progress: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            out_dir: expand_path(DEFAULT_OUT_DIR),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            nav_timeout: NAVIGATION_TIMEOUT,
            render_retry: RetryPolicy::render_default(),
            batch_size: siteaudit_scanner::crawler::DEFAULT_BATCH_SIZE,
            probe_concurrency: 1,
            similarity_threshold: crate::similarity::DEFAULT_SIMILARITY_THRESHOLD,
            shingle_size: crate::similarity::DEFAULT_SHINGLE_SIZE,
            min_shingles: 0,
            renderer: RendererKind::Chromium,
            show_progress: false,
        }
    }
}

impl AuditConfig {
    pub fn with_out_dir(mut self, raw: &str) -> Self {
        self.out_dir = expand_path(raw);
        self
    }

    pub fn report_path(&self, file_name: &str) -> PathBuf {
        self.out_dir.join(file_name)
    }

    /// Create the output directory if needed.
    pub fn ensure_out_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.out_dir).map_err(|e| {
            ScanError::Other(format!(
                "cannot create output directory {}: {}",
                self.out_dir.display(),
                e
            ))
        })?;
        Ok(&self.out_dir)
    }
}

/// Pick the sitemap reference: explicit argument, then `SITEAUDIT_SITEMAP`,
/// then the built-in default.
pub fn resolve_sitemap_reference(arg: Option<&str>) -> String {
    arg.map(str::to_string)
        .or_else(|| std::env::var(SITEMAP_ENV).ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SITEMAP.to_string())
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.nav_timeout, Duration::from_secs(60));
        assert_eq!(config.render_retry.max_attempts, 3);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.probe_concurrency, 1);
        assert_eq!(config.shingle_size, 5);
        assert_eq!(config.min_shingles, 0);
        assert!((config.similarity_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.renderer, RendererKind::Chromium);
    }

    #[test]
    fn test_explicit_sitemap_wins() {
        assert_eq!(
            resolve_sitemap_reference(Some("./sitemap.xml")),
            "./sitemap.xml"
        );
    }

    #[test]
    fn test_renderer_kind_parsing() {
        assert_eq!("static".parse(), Ok(RendererKind::Static));
        assert_eq!("Chromium".parse(), Ok(RendererKind::Chromium));
        assert!("firefox".parse::<RendererKind>().is_err());
    }

    #[test]
    fn test_tilde_out_dir_is_expanded() {
        let config = AuditConfig::default().with_out_dir("~/reports");
        assert!(!config.out_dir.to_string_lossy().starts_with('~'));
        assert!(config.report_path(AUDIT_CSV_FILE).ends_with("reports/audit-report.csv"));
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Fetch failed for {source_ref}: {reason}")]
    FetchError { source_ref: String, reason: String },

    #[error("No <loc> entries found in sitemap {0}")]
    EmptySitemap(String),

    #[error("Render failed for {url}: {reason}")]
    RenderError { url: String, reason: String },

    #[error(
        "Browser engine not available: {0}\n  Install Chromium/Chrome, or set SITEAUDIT_CHROMIUM_PATH to its executable, \
         or rerun with --renderer static"
    )]
    MissingDependency(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    pub fn fetch(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        ScanError::FetchError {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render(url: impl Into<String>, reason: impl ToString) -> Self {
        ScanError::RenderError {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Failures that make the whole run pointless rather than a single URL.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::FetchError { .. }
                | ScanError::EmptySitemap(_)
                | ScanError::MissingDependency(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

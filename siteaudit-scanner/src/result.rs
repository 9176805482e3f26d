use serde::{Deserialize, Serialize};

/// Twitter Card fields found on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwitterMeta {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub card: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub site: Option<String>,
}

/// Open Graph fields found on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenGraphMeta {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<String>,
}

/// Everything pulled out of one rendered page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExtract {
    pub url: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub canonical_link: Option<String>,
    #[serde(default)]
    pub robots_meta: Option<String>,
    pub normalized_body_text: String,
    pub outbound_links: Vec<String>,
    #[serde(default)]
    pub twitter: TwitterMeta,
    #[serde(default)]
    pub og: OpenGraphMeta,
}

impl PageExtract {
    pub fn new(url: String) -> Self {
        Self {
            url,
            ..Default::default()
        }
    }

    pub fn is_noindex(&self) -> bool {
        self.robots_meta
            .as_deref()
            .map(|r| r.to_ascii_lowercase().contains("noindex"))
            .unwrap_or(false)
    }
}

/// Result of processing one sitemap URL in the rendering stage. A failed
/// render is kept distinct from a page that rendered with no content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    Rendered(PageExtract),
    Failed {
        url: String,
        error: String,
        attempts: usize,
    },
    Skipped {
        url: String,
        reason: String,
    },
}

impl PageOutcome {
    pub fn with_error(url: String, error: String, attempts: usize) -> Self {
        PageOutcome::Failed {
            url,
            error,
            attempts,
        }
    }

    pub fn skipped_asset(url: String) -> Self {
        PageOutcome::Skipped {
            url,
            reason: "asset".to_string(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            PageOutcome::Rendered(page) => &page.url,
            PageOutcome::Failed { url, .. } | PageOutcome::Skipped { url, .. } => url,
        }
    }

    pub fn page(&self) -> Option<&PageExtract> {
        match self {
            PageOutcome::Rendered(page) => Some(page),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PageOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PageOutcome::Skipped { .. })
    }
}

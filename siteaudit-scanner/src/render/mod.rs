//! Page rendering capability.
//!
//! [`PageRenderer`] is the only thing the crawl stage depends on. A
//! [`BrowserRenderer`] adapts any [`BrowserEngine`] (currently Chromium via
//! chromiumoxide) to it and owns the per-page context lifecycle;
//! [`StaticHtmlRenderer`] satisfies the same contract without executing
//! scripts.

pub mod chromium;
pub mod static_html;

pub use chromium::{ChromiumEngine, find_chromium};
pub use static_html::StaticHtmlRenderer;

use crate::error::{Result, ScanError};
use crate::extract::extract_page;
use crate::result::PageExtract;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);
const NETWORK_IDLE_POLL: Duration = Duration::from_millis(100);

/// Ready when the document has loaded and the number of fetched resources
/// stops changing.
const IDLE_PROBE_JS: &str = "(() => ({ ready: document.readyState === 'complete', \
     resources: performance.getEntriesByType('resource').length }))()";
const HTML_JS: &str = "document.documentElement ? document.documentElement.outerHTML : ''";
const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// Render a URL and extract its page data.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_page(&self, url: &str, timeout: Duration) -> Result<PageExtract>;

    fn name(&self) -> &'static str;

    /// Release engine resources. Called once after the last render.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A browser engine that can open isolated browsing contexts.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn new_context(&self) -> anyhow::Result<Box<dyn BrowserContext>>;
    /// Number of contexts opened and not yet closed.
    fn active_contexts(&self) -> usize;
    async fn shutdown(&self) -> anyhow::Result<()>;
}

/// A single browsing context (tab).
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()>;
    async fn evaluate(&self, script: &str) -> anyhow::Result<serde_json::Value>;
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

/// [`PageRenderer`] over a shared [`BrowserEngine`]. Every context it opens
/// is closed before `render_page` returns, whether rendering succeeded,
/// failed or timed out.
pub struct BrowserRenderer<E: BrowserEngine> {
    engine: E,
}

impl<E: BrowserEngine> BrowserRenderer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    async fn render_in(
        &self,
        ctx: &mut dyn BrowserContext,
        url: &str,
    ) -> anyhow::Result<PageExtract> {
        ctx.navigate(url).await?;
        wait_for_network_idle(ctx, NETWORK_IDLE_WINDOW).await?;

        let html = ctx
            .evaluate(HTML_JS)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let body_text = ctx.evaluate(BODY_TEXT_JS).await?;

        Ok(extract_page(url, &html, body_text.as_str()))
    }
}

#[async_trait]
impl<E: BrowserEngine> PageRenderer for BrowserRenderer<E> {
    async fn render_page(&self, url: &str, timeout: Duration) -> Result<PageExtract> {
        let mut ctx = self
            .engine
            .new_context()
            .await
            .map_err(|e| ScanError::render(url, format!("failed to open context: {e}")))?;

        let outcome = tokio::time::timeout(timeout, self.render_in(ctx.as_mut(), url)).await;

        if let Err(e) = ctx.close().await {
            warn!("Failed to close browsing context for {}: {}", url, e);
        }

        match outcome {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => Err(ScanError::render(url, e)),
            Err(_) => Err(ScanError::render(
                url,
                format!("navigation timed out after {}ms", timeout.as_millis()),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "browser"
    }

    async fn shutdown(&self) -> Result<()> {
        self.engine
            .shutdown()
            .await
            .map_err(|e| ScanError::Other(format!("browser shutdown failed: {e}")))
    }
}

async fn wait_for_network_idle(ctx: &dyn BrowserContext, window: Duration) -> anyhow::Result<()> {
    let mut last_count: Option<u64> = None;
    let mut stable_since = Instant::now();

    loop {
        let probe = ctx.evaluate(IDLE_PROBE_JS).await?;
        let ready = probe["ready"].as_bool().unwrap_or(false);
        let count = probe["resources"].as_u64().unwrap_or(0);

        if ready && last_count == Some(count) {
            if stable_since.elapsed() >= window {
                debug!("Network idle after {} resources", count);
                return Ok(());
            }
        } else {
            last_count = ready.then_some(count);
            stable_since = Instant::now();
        }

        tokio::time::sleep(NETWORK_IDLE_POLL).await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted engine: each URL maps to the HTML its context returns, or
    /// to an error when navigation should fail.
    #[derive(Clone, Default)]
    pub struct FakeEngine {
        pub pages: Arc<HashMap<String, std::result::Result<String, String>>>,
        pub active: Arc<AtomicUsize>,
        pub opened: Arc<AtomicUsize>,
        pub hang: bool,
    }

    impl FakeEngine {
        pub fn with_pages(pages: Vec<(&str, std::result::Result<&str, &str>)>) -> Self {
            Self {
                pages: Arc::new(
                    pages
                        .into_iter()
                        .map(|(url, page)| {
                            (
                                url.to_string(),
                                page.map(str::to_string).map_err(str::to_string),
                            )
                        })
                        .collect(),
                ),
                ..Default::default()
            }
        }
    }

    pub struct FakeContext {
        engine: FakeEngine,
        html: String,
    }

    #[async_trait]
    impl BrowserEngine for FakeEngine {
        async fn new_context(&self) -> anyhow::Result<Box<dyn BrowserContext>> {
            self.active.fetch_add(1, Ordering::SeqCst);
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeContext {
                engine: self.clone(),
                html: String::new(),
            }))
        }

        fn active_contexts(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }

        async fn shutdown(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserContext for FakeContext {
        async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
            if self.engine.hang {
                std::future::pending::<()>().await;
            }
            match self.engine.pages.get(url) {
                Some(Ok(html)) => {
                    self.html = html.clone();
                    Ok(())
                }
                Some(Err(e)) => anyhow::bail!("{}", e),
                None => anyhow::bail!("net::ERR_NAME_NOT_RESOLVED"),
            }
        }

        async fn evaluate(&self, script: &str) -> anyhow::Result<serde_json::Value> {
            if script == IDLE_PROBE_JS {
                Ok(serde_json::json!({ "ready": true, "resources": 3 }))
            } else if script == HTML_JS {
                Ok(serde_json::Value::String(self.html.clone()))
            } else {
                let text = scraper::Html::parse_document(&self.html)
                    .root_element()
                    .text()
                    .collect::<Vec<_>>()
                    .join(" ");
                Ok(serde_json::Value::String(text))
            }
        }

        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            self.engine.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

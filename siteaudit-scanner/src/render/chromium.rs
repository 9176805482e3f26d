//! Chromium engine using chromiumoxide.

use super::{BrowserContext, BrowserEngine};
use crate::error::{Result, ScanError};
use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const CHROMIUM_PATH_ENV: &str = "SITEAUDIT_CHROMIUM_PATH";

/// Find a Chromium/Chrome executable: the env override first, then `PATH`,
/// then the usual macOS install location.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for candidate in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(candidate) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// One headless Chromium process shared by every browsing context.
pub struct ChromiumEngine {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumEngine {
    /// Launch headless Chromium. A missing executable is reported as
    /// [`ScanError::MissingDependency`].
    pub async fn launch() -> Result<Self> {
        let chrome_path = find_chromium().ok_or_else(|| {
            ScanError::MissingDependency(format!(
                "no Chromium/Chrome executable found on PATH or in ${}",
                CHROMIUM_PATH_ENV
            ))
        })?;
        info!("Launching headless browser at {}", chrome_path.display());

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| ScanError::Other(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScanError::Other(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_context(&self) -> anyhow::Result<Box<dyn BrowserContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close browser")?;
        let _ = browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// A single Chromium page.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        if let Err(e) = self.page.wait_for_navigation().await {
            debug!("Waiting for navigation of {} ended early: {}", url, e);
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> anyhow::Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS evaluation failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{BrowserRenderer, NAVIGATION_TIMEOUT, PageRenderer};

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_render_data_url() {
        let engine = ChromiumEngine::launch()
            .await
            .expect("failed to launch Chromium");
        let renderer = BrowserRenderer::new(engine);

        let page = renderer
            .render_page(
                "data:text/html,<title>Hello</title><p>Rendered World</p><a href='https://example.com/x'>x</a>",
                NAVIGATION_TIMEOUT,
            )
            .await
            .expect("render failed");

        assert_eq!(page.title, "Hello");
        assert!(page.normalized_body_text.contains("rendered world"));
        assert_eq!(page.outbound_links, vec!["https://example.com/x".to_string()]);
        assert_eq!(renderer.engine().active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }
}

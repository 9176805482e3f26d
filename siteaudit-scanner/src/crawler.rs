use crate::error::ScanError;
use crate::events::{AuditEvent, ProgressCallback, emit};
use crate::render::{NAVIGATION_TIMEOUT, PageRenderer};
use crate::result::PageOutcome;
use crate::retry::RetryPolicy;
use crate::urls::is_asset_url;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Renders sitemap pages in fixed-size batches. A batch is fully settled
/// before the next one starts, so at most `batch_size` pages are open at any
/// moment.
pub struct Crawler {
    renderer: Arc<dyn PageRenderer>,
    batch_size: usize,
    retry: RetryPolicy,
    nav_timeout: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            renderer,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::render_default(),
            nav_timeout: NAVIGATION_TIMEOUT,
            progress_callback: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Render every URL. The returned outcomes line up one-to-one with
    /// `urls`; asset URLs come back as `Skipped` without being rendered.
    pub async fn crawl(&self, urls: &[String]) -> Vec<PageOutcome> {
        let mut outcomes: Vec<Option<PageOutcome>> = vec![None; urls.len()];

        let mut pending = Vec::new();
        for (idx, url) in urls.iter().enumerate() {
            if is_asset_url(url) {
                debug!("Skipping asset {}", url);
                emit(
                    &self.progress_callback,
                    AuditEvent::PageSkipped { url: url.clone() },
                );
                outcomes[idx] = Some(PageOutcome::skipped_asset(url.clone()));
            } else {
                pending.push(idx);
            }
        }

        let total_batches = pending.len().div_ceil(self.batch_size);
        info!(
            "Rendering {} pages in {} batches of up to {} with {}",
            pending.len(),
            total_batches,
            self.batch_size,
            self.renderer.name()
        );

        for (batch_no, batch) in pending.chunks(self.batch_size).enumerate() {
            let rendered = join_all(batch.iter().map(|&idx| self.render_one(&urls[idx]))).await;
            for (&idx, outcome) in batch.iter().zip(rendered) {
                outcomes[idx] = Some(outcome);
            }
            emit(
                &self.progress_callback,
                AuditEvent::BatchCompleted {
                    batch: batch_no + 1,
                    total_batches,
                },
            );
        }

        outcomes
            .into_iter()
            .zip(urls)
            .map(|(outcome, url)| {
                outcome.unwrap_or_else(|| {
                    PageOutcome::with_error(url.clone(), "not rendered".to_string(), 0)
                })
            })
            .collect()
    }

    async fn render_one(&self, url: &str) -> PageOutcome {
        let mut last_attempt = 0;
        let result = self
            .retry
            .run(
                |attempt| {
                    last_attempt = attempt;
                    emit(
                        &self.progress_callback,
                        AuditEvent::PageStarted {
                            url: url.to_string(),
                            attempt,
                        },
                    );
                    self.renderer.render_page(url, self.nav_timeout)
                },
                |e: &ScanError| !e.is_fatal(),
                |attempt, e, delay| {
                    warn!("Attempt {} failed for {}: {}", attempt, url, e);
                    emit(
                        &self.progress_callback,
                        AuditEvent::RetryScheduled {
                            url: url.to_string(),
                            attempt,
                            delay,
                            error: e.to_string(),
                        },
                    );
                },
            )
            .await;

        let outcome = match result {
            Ok(page) => PageOutcome::Rendered(page),
            Err(e) => {
                warn!("Giving up on {} after {} attempts: {}", url, last_attempt, e);
                PageOutcome::with_error(url.to_string(), e.to_string(), last_attempt)
            }
        };

        emit(
            &self.progress_callback,
            AuditEvent::PageFinished {
                url: url.to_string(),
                ok: outcome.page().is_some(),
            },
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::render::BrowserRenderer;
    use crate::render::testing::FakeEngine;
    use crate::result::PageExtract;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails each URL a fixed number of times before rendering it, and
    /// records how many renders overlap.
    #[derive(Default)]
    struct FlakyRenderer {
        failures: HashMap<String, usize>,
        calls: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FlakyRenderer {
        fn failing(failures: Vec<(&str, usize)>) -> Self {
            Self {
                failures: failures
                    .into_iter()
                    .map(|(u, n)| (u.to_string(), n))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PageRenderer for FlakyRenderer {
        async fn render_page(&self, url: &str, _timeout: Duration) -> Result<PageExtract> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let call = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(url.to_string()).or_insert(0);
                *n += 1;
                *n
            };
            if call <= self.failures.get(url).copied().unwrap_or(0) {
                return Err(ScanError::render(url, format!("flake {}", call)));
            }
            let mut page = PageExtract::new(url.to_string());
            page.title = format!("Title of {}", url);
            Ok(page)
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn recording_callback() -> (ProgressCallback, Arc<Mutex<Vec<AuditEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let cb: ProgressCallback = Arc::new(move |e| sink.lock().unwrap().push(e));
        (cb, events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_never_exceed_batch_size() {
        let renderer = Arc::new(FlakyRenderer::default());
        let crawler = Crawler::new(renderer.clone());
        let list = urls(&[
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/c",
            "https://example.com/d",
            "https://example.com/e",
            "https://example.com/f",
            "https://example.com/g",
        ]);

        let outcomes = crawler.crawl(&list).await;

        assert_eq!(outcomes.len(), 7);
        assert!(outcomes.iter().all(|o| o.page().is_some()));
        assert_eq!(renderer.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_batch_waits_for_previous() {
        let renderer = Arc::new(FlakyRenderer::default());
        let (cb, events) = recording_callback();
        let crawler = Crawler::new(renderer)
            .with_batch_size(2)
            .with_progress_callback(cb);
        let list = urls(&[
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
        ]);

        crawler.crawl(&list).await;

        let events = events.lock().unwrap();
        let first_batch_done = events
            .iter()
            .position(|e| matches!(e, AuditEvent::BatchCompleted { batch: 1, .. }))
            .unwrap();
        let third_started = events
            .iter()
            .position(|e| matches!(e, AuditEvent::PageStarted { url, .. } if url.ends_with("/3")))
            .unwrap();
        assert!(first_batch_done < third_started);
        assert!(events.contains(&AuditEvent::BatchCompleted {
            batch: 2,
            total_batches: 2
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let renderer = Arc::new(FlakyRenderer::failing(vec![("https://example.com/flaky", 2)]));
        let (cb, events) = recording_callback();
        let crawler = Crawler::new(renderer).with_progress_callback(cb);

        let outcomes = crawler.crawl(&urls(&["https://example.com/flaky"])).await;

        assert_eq!(
            outcomes[0].page().unwrap().title,
            "Title of https://example.com/flaky"
        );
        let delays: Vec<Duration> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                AuditEvent::RetryScheduled { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(1500), Duration::from_millis(3000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_record_failure() {
        let renderer = Arc::new(FlakyRenderer::failing(vec![("https://example.com/down", 10)]));
        let crawler = Crawler::new(renderer);

        let outcomes = crawler
            .crawl(&urls(&["https://example.com/ok", "https://example.com/down"]))
            .await;

        assert!(outcomes[0].page().is_some());
        match &outcomes[1] {
            PageOutcome::Failed {
                url,
                error,
                attempts,
            } => {
                assert_eq!(url, "https://example.com/down");
                assert!(error.contains("flake 3"));
                assert_eq!(*attempts, 3);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_assets_skipped_and_order_kept() {
        let renderer = Arc::new(FlakyRenderer::default());
        let crawler = Crawler::new(renderer.clone());
        let list = urls(&[
            "https://example.com/",
            "https://example.com/brochure.pdf",
            "https://example.com/rooms",
            "https://example.com/img/hero.JPG",
        ]);

        let outcomes = crawler.crawl(&list).await;

        let order: Vec<&str> = outcomes.iter().map(|o| o.url()).collect();
        assert_eq!(order, list.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(outcomes[1].is_skipped());
        assert!(outcomes[3].is_skipped());
        assert_eq!(renderer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_contexts_all_closed() {
        let engine = FakeEngine::with_pages(vec![
            ("https://example.com/", Ok("<title>Home</title>")),
            ("https://example.com/broken", Err("net::ERR_CONNECTION_RESET")),
        ]);
        let renderer = Arc::new(BrowserRenderer::new(engine.clone()));
        let crawler = Crawler::new(renderer)
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));

        let outcomes = crawler
            .crawl(&urls(&["https://example.com/", "https://example.com/broken"]))
            .await;

        assert_eq!(outcomes[0].page().unwrap().title, "Home");
        assert!(outcomes[1].error().unwrap().contains("ERR_CONNECTION_RESET"));
        assert_eq!(engine.opened.load(Ordering::SeqCst), 3);
        assert_eq!(engine.active.load(Ordering::SeqCst), 0);
    }
}

// Stage execution: sitemap loading, HTTP probes, rendering and report output

use futures::StreamExt;
use futures::stream;
use indicatif::{ProgressBar, ProgressStyle};
use siteaudit_scanner::error::{Result, ScanError};
use siteaudit_scanner::events::{AuditEvent, ProgressCallback, emit};
use siteaudit_scanner::http::build_client;
use siteaudit_scanner::render::{BrowserRenderer, ChromiumEngine, PageRenderer, StaticHtmlRenderer};
use siteaudit_scanner::result::PageOutcome;
use siteaudit_scanner::urls::is_asset_url;
use siteaudit_scanner::{
    BrowserLoader, Crawler, HeaderInspector, RedirectChainResolver, SitemapResolver,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::aggregate::{AuditRow, aggregate, generate_text_report, save_csv};
use crate::config::{
    AUDIT_CSV_FILE, AUDIT_TEXT_FILE, AuditConfig, HEADER_REPORT_FILE, REDIRECT_REPORT_FILE,
    RendererKind,
};
use crate::report::{
    ContentReport, HeaderReport, LinkReport, RedirectReport, generated_at, load_json,
    save_json, save_report,
};
use crate::similarity::ContentSimilarityDetector;
use crate::{links, seo};

/// Fetch the sitemap and return its URLs in document order.
pub async fn load_sitemap(config: &AuditConfig, sitemap: &str) -> Result<Vec<String>> {
    let client = build_client(config.http_timeout, true)?;
    let urls = SitemapResolver::new(client).resolve(sitemap).await?;
    info!("Sitemap {} lists {} URLs", sitemap, urls.len());
    Ok(urls)
}

/// A progress bar for `total` items that also forwards every event to
/// `observer`. Without progress output only the observer is kept.
fn stage_progress(
    config: &AuditConfig,
    label: &str,
    total: usize,
    observer: Option<ProgressCallback>,
) -> (Option<ProgressBar>, Option<ProgressCallback>) {
    if !config.show_progress {
        return (None, observer);
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} {prefix:>10} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(label.to_string());

    let bar = pb.clone();
    let callback: ProgressCallback = Arc::new(move |event: AuditEvent| {
        match &event {
            AuditEvent::UrlProbed { url, done, .. } => {
                bar.set_position(*done as u64);
                bar.set_message(url.clone());
            }
            AuditEvent::PageStarted { url, attempt } if *attempt > 1 => {
                bar.set_message(format!("{} (attempt {})", url, attempt));
            }
            AuditEvent::PageFinished { url, .. } => {
                bar.inc(1);
                bar.set_message(url.clone());
            }
            AuditEvent::PageSkipped { .. } => bar.inc(1),
            _ => {}
        }
        if let Some(ref observer) = observer {
            observer(event);
        }
    });

    (Some(pb), Some(callback))
}

fn finish(pb: Option<ProgressBar>, message: String) {
    if let Some(pb) = pb {
        pb.finish_with_message(message);
    }
}

/// Run `probe` over every URL with at most `concurrency` in flight, keeping
/// results in input order.
async fn probe_all<'a, T, F, Fut>(
    urls: &'a [String],
    concurrency: usize,
    stage: &'static str,
    progress: &Option<ProgressCallback>,
    probe: F,
) -> Vec<T>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = T>,
{
    let total = urls.len();
    let done = &AtomicUsize::new(0);

    stream::iter(urls)
        .map(|url| {
            let fut = probe(url.as_str());
            async move {
                let result = fut.await;
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                emit(
                    progress,
                    AuditEvent::UrlProbed {
                        stage,
                        url: url.clone(),
                        done: n,
                        total,
                    },
                );
                result
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

pub async fn execute_redirects(
    config: &AuditConfig,
    sitemap: &str,
    urls: &[String],
    observer: Option<ProgressCallback>,
) -> Result<RedirectReport> {
    let resolver = RedirectChainResolver::new(build_client(config.http_timeout, false)?);
    let (pb, progress) = stage_progress(config, "redirects", urls.len(), observer);

    let results = probe_all(urls, config.probe_concurrency, "redirects", &progress, |url| {
        resolver.resolve(url)
    })
    .await;

    finish(pb, format!("{} redirect chains resolved", results.len()));
    Ok(RedirectReport {
        generated_at: generated_at(),
        sitemap: sitemap.to_string(),
        results,
    })
}

pub async fn execute_headers(
    config: &AuditConfig,
    sitemap: &str,
    urls: &[String],
    observer: Option<ProgressCallback>,
) -> Result<HeaderReport> {
    let inspector = HeaderInspector::new(build_client(config.http_timeout, true)?);
    let (pb, progress) = stage_progress(config, "headers", urls.len(), observer);

    let entries = probe_all(urls, config.probe_concurrency, "headers", &progress, |url| {
        inspector.inspect_all(url)
    })
    .await;

    finish(pb, format!("{} URLs inspected", entries.len()));
    Ok(HeaderReport {
        generated_at: generated_at(),
        sitemap: sitemap.to_string(),
        entries,
    })
}

/// A loader for the configured renderer. Chromium is launched on first use;
/// the static renderer needs no launch.
pub fn renderer_loader(config: &AuditConfig) -> Result<BrowserLoader> {
    match config.renderer {
        RendererKind::Chromium => Ok(BrowserLoader::new(|| async {
            let engine = ChromiumEngine::launch().await?;
            let renderer: Arc<dyn PageRenderer> = Arc::new(BrowserRenderer::new(engine));
            Ok::<_, ScanError>(renderer)
        })),
        RendererKind::Static => {
            let client = build_client(config.http_timeout, true)?;
            Ok(BrowserLoader::preloaded(Arc::new(StaticHtmlRenderer::new(
                client,
            ))))
        }
    }
}

/// Render every sitemap URL. The renderer is only started when at least one
/// URL is a page rather than an asset.
pub async fn render_pages(
    config: &AuditConfig,
    loader: &BrowserLoader,
    urls: &[String],
    observer: Option<ProgressCallback>,
) -> Result<Vec<PageOutcome>> {
    if urls.iter().all(|url| is_asset_url(url)) {
        return Ok(urls
            .iter()
            .map(|url| PageOutcome::skipped_asset(url.clone()))
            .collect());
    }

    let renderer = loader.get().await?;
    let (pb, progress) = stage_progress(config, "render", urls.len(), observer);

    let mut crawler = Crawler::new(renderer)
        .with_batch_size(config.batch_size)
        .with_retry_policy(config.render_retry)
        .with_timeout(config.nav_timeout);
    if let Some(cb) = progress {
        crawler = crawler.with_progress_callback(cb);
    }

    let outcomes = crawler.crawl(urls).await;
    let rendered = outcomes.iter().filter(|o| o.page().is_some()).count();
    let failed = outcomes.iter().filter(|o| o.error().is_some()).count();
    finish(pb, format!("{} pages rendered, {} failed", rendered, failed));
    Ok(outcomes)
}

pub fn similarity_detector(config: &AuditConfig) -> ContentSimilarityDetector {
    ContentSimilarityDetector::new()
        .with_shingle_size(config.shingle_size)
        .with_threshold(config.similarity_threshold)
        .with_min_shingles(config.min_shingles)
}

pub fn content_report(
    config: &AuditConfig,
    sitemap: &str,
    urls: &[String],
    outcomes: &[PageOutcome],
) -> ContentReport {
    seo::build_content_report(sitemap, urls, outcomes, &similarity_detector(config))
}

pub fn link_report(sitemap: &str, urls: &[String], outcomes: &[PageOutcome]) -> LinkReport {
    links::build_link_report(sitemap, urls, outcomes)
}

/// Write `report` as JSON under the output directory.
pub fn write_json_report<T: serde::Serialize>(
    config: &AuditConfig,
    file_name: &str,
    report: &T,
) -> Result<PathBuf> {
    config.ensure_out_dir()?;
    let path = config.report_path(file_name);
    save_json(report, &path)?;
    info!("Wrote {}", path.display());
    Ok(path)
}

pub struct AggregateOutput {
    pub rows: Vec<AuditRow>,
    pub text_path: PathBuf,
    pub csv_path: PathBuf,
}

/// Read the redirect and header reports back from the output directory and
/// write the joined text and CSV audit next to them.
pub fn execute_aggregate(config: &AuditConfig) -> Result<AggregateOutput> {
    let redirects: RedirectReport = load_json(&config.report_path(REDIRECT_REPORT_FILE))?;
    let headers: HeaderReport = load_json(&config.report_path(HEADER_REPORT_FILE))?;

    let rows = aggregate(&redirects, &headers);
    let text = generate_text_report(&rows, &redirects.sitemap, &generated_at());

    config.ensure_out_dir()?;
    let text_path = config.report_path(AUDIT_TEXT_FILE);
    let csv_path = config.report_path(AUDIT_CSV_FILE);
    save_report(&text, &text_path)?;
    save_csv(&rows, &csv_path)?;
    info!("Aggregated {} URLs", rows.len());

    Ok(AggregateOutput {
        rows,
        text_path,
        csv_path,
    })
}

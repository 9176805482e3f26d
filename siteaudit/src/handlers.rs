use clap::ArgMatches;
use colored::Colorize;
use siteaudit_core::config::{
    CONTENT_REPORT_FILE, HEADER_REPORT_FILE, LINK_REPORT_FILE, REDIRECT_REPORT_FILE,
    resolve_sitemap_reference,
};
use siteaudit_core::pipeline::{
    content_report, execute_aggregate, execute_headers, execute_redirects, link_report,
    load_sitemap, render_pages, renderer_loader, write_json_report,
};
use siteaudit_core::{AuditConfig, RendererKind};
use siteaudit_scanner::events::{AuditEvent, ProgressCallback};
use siteaudit_scanner::{RetryPolicy, ScanError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_MISSING_BROWSER: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Redirects,
    Headers,
    Content,
    Links,
    Aggregate,
    All,
}

impl Stage {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "redirects" => Some(Stage::Redirects),
            "headers" => Some(Stage::Headers),
            "content" => Some(Stage::Content),
            "links" => Some(Stage::Links),
            "aggregate" => Some(Stage::Aggregate),
            "all" => Some(Stage::All),
            _ => None,
        }
    }

    fn renders(self) -> bool {
        matches!(self, Stage::Content | Stage::Links | Stage::All)
    }
}

/// Log level from `-v` count. `RUST_LOG` overrides it.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn exit_code(err: &ScanError) -> i32 {
    match err {
        ScanError::MissingDependency(_) => EXIT_MISSING_BROWSER,
        _ => EXIT_FAILURE,
    }
}

/// Build the audit configuration from a stage's arguments. Arguments a stage
/// does not define keep their defaults.
pub fn build_config(stage: Stage, args: &ArgMatches, quiet: bool) -> Result<AuditConfig, ScanError> {
    let mut config = AuditConfig {
        show_progress: !quiet,
        ..Default::default()
    };

    if let Some(out_dir) = args.get_one::<String>("out-dir") {
        config = config.with_out_dir(out_dir);
    }
    if stage == Stage::Aggregate {
        return Ok(config);
    }

    if let Some(secs) = args.get_one::<u64>("timeout") {
        config.http_timeout = Duration::from_secs(*secs);
    }
    if let Some(n) = args.get_one::<usize>("concurrency") {
        config.probe_concurrency = (*n).max(1);
    }

    if stage.renders() {
        if let Some(kind) = args.get_one::<String>("renderer") {
            config.renderer = kind
                .parse::<RendererKind>()
                .map_err(ScanError::Other)?;
        }
        if let Some(secs) = args.get_one::<u64>("nav-timeout") {
            config.nav_timeout = Duration::from_secs(*secs);
        }
        if let Some(n) = args.get_one::<usize>("render-attempts") {
            config.render_retry = RetryPolicy::new(*n, config.render_retry.base_delay);
        }
        if let Some(n) = args.get_one::<usize>("batch-size") {
            config.batch_size = (*n).max(1);
        }
        if let Some(score) = args.get_one::<f64>("similarity-threshold") {
            if !(0.0..=1.0).contains(score) {
                return Err(ScanError::Other(format!(
                    "similarity threshold {} is outside 0..=1",
                    score
                )));
            }
            config.similarity_threshold = *score;
        }
        if let Some(n) = args.get_one::<usize>("min-shingles") {
            config.min_shingles = *n;
        }
    }

    Ok(config)
}

pub fn sitemap_from_args(args: &ArgMatches) -> String {
    resolve_sitemap_reference(args.get_one::<String>("SITEMAP").map(String::as_str))
}

/// Observer that turns pipeline events into log lines.
pub fn log_observer() -> ProgressCallback {
    Arc::new(|event: AuditEvent| match event {
        AuditEvent::RetryScheduled {
            url,
            attempt,
            delay,
            error,
        } => warn!(
            "Render attempt {} for {} failed ({}), retrying in {:?}",
            attempt, url, error, delay
        ),
        AuditEvent::PageFinished { url, ok: false } => warn!("Giving up on {}", url),
        other => debug!("{:?}", other),
    })
}

fn announce(quiet: bool, path: &Path) {
    if !quiet {
        println!("{} {}", "[+] Wrote".green(), path.display());
    }
}

pub async fn run_stage(stage: Stage, args: &ArgMatches, quiet: bool) -> Result<(), ScanError> {
    let config = build_config(stage, args, quiet)?;

    if stage == Stage::Aggregate {
        return handle_aggregate(&config, quiet);
    }

    let sitemap = sitemap_from_args(args);
    if !quiet {
        println!("{} {}", "Sitemap:".bold(), sitemap);
    }
    let urls = load_sitemap(&config, &sitemap).await?;
    if !quiet {
        println!("{} {}\n", "URLs:".bold(), urls.len());
    }

    if matches!(stage, Stage::Redirects | Stage::All) {
        let report = execute_redirects(&config, &sitemap, &urls, Some(log_observer())).await?;
        announce(quiet, &write_json_report(&config, REDIRECT_REPORT_FILE, &report)?);
    }

    if matches!(stage, Stage::Headers | Stage::All) {
        let report = execute_headers(&config, &sitemap, &urls, Some(log_observer())).await?;
        announce(quiet, &write_json_report(&config, HEADER_REPORT_FILE, &report)?);
    }

    if stage.renders() {
        let loader = renderer_loader(&config)?;
        let rendered = render_pages(&config, &loader, &urls, Some(log_observer())).await;
        if let Err(e) = loader.shutdown().await {
            warn!("Renderer shutdown failed: {}", e);
        }
        let outcomes = rendered?;

        if matches!(stage, Stage::Content | Stage::All) {
            let report = content_report(&config, &sitemap, &urls, &outcomes);
            if !quiet {
                print_content_summary(&report.summary);
            }
            announce(quiet, &write_json_report(&config, CONTENT_REPORT_FILE, &report)?);
        }
        if matches!(stage, Stage::Links | Stage::All) {
            let report = link_report(&sitemap, &urls, &outcomes);
            if !quiet {
                println!(
                    "  {} pages, {} without inbound links, {} missing an X card",
                    report.total_pages,
                    report.pages_with_no_inbound.len(),
                    report.pages_missing_x_card.len()
                );
            }
            announce(quiet, &write_json_report(&config, LINK_REPORT_FILE, &report)?);
        }
    }

    if stage == Stage::All {
        handle_aggregate(&config, quiet)?;
    }

    Ok(())
}

fn print_content_summary(summary: &siteaudit_core::report::ContentSummary) {
    println!(
        "  {} URLs ({} assets), {} rendered, {} failed",
        summary.total_urls, summary.asset_urls, summary.rendered_pages, summary.failed_pages
    );
    println!(
        "  {} duplicate titles, {} missing descriptions, {} similar pairs",
        summary.duplicate_title_groups, summary.missing_descriptions, summary.similar_pairs
    );
}

fn handle_aggregate(config: &AuditConfig, quiet: bool) -> Result<(), ScanError> {
    let output = execute_aggregate(config)?;
    if !quiet {
        let with_issues = output.rows.iter().filter(|r| r.has_issues()).count();
        let line = format!("  {} URLs, {} with issues", output.rows.len(), with_issues);
        if with_issues > 0 {
            println!("{}", line.yellow());
        } else {
            println!("{}", line.green());
        }
    }
    announce(quiet, &output.text_path);
    announce(quiet, &output.csv_path);
    Ok(())
}

use crate::CLAP_STYLING;
use clap::{ArgAction, arg, command};
use siteaudit_core::config::DEFAULT_OUT_DIR;

fn out_dir_arg() -> clap::Arg {
    arg!(-o --"out-dir" <DIR>)
        .required(false)
        .help("Directory the reports are written to (overwritten on each run)")
        .default_value(DEFAULT_OUT_DIR)
}

/// Arguments shared by every stage that reads the sitemap.
fn with_sitemap_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!([SITEMAP])
            .required(false)
            .help("Sitemap file path or http(s) URL. Defaults to $SITEAUDIT_SITEMAP, then the built-in site"),
    )
    .arg(out_dir_arg())
    .arg(
        arg!(--"timeout" <SECS>)
            .required(false)
            .help("Timeout for sitemap, redirect and header requests")
            .value_parser(clap::value_parser!(u64).range(1..))
            .default_value("15"),
    )
    .arg(
        arg!(--"concurrency" <N>)
            .required(false)
            .help("Redirect/header probes in flight at once (1 = sequential)")
            .value_parser(clap::value_parser!(usize))
            .default_value("1"),
    )
}

/// Arguments for the stages that render pages.
fn with_render_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"renderer" <KIND>)
            .required(false)
            .help("Page renderer: headless chromium, or static HTML without scripts")
            .value_parser(["chromium", "static"])
            .default_value("chromium"),
    )
    .arg(
        arg!(--"nav-timeout" <SECS>)
            .required(false)
            .help("Navigation timeout per page render")
            .value_parser(clap::value_parser!(u64).range(1..))
            .default_value("60"),
    )
    .arg(
        arg!(--"render-attempts" <N>)
            .required(false)
            .help("Attempts per page before it is recorded as failed")
            .value_parser(clap::value_parser!(usize))
            .default_value("3"),
    )
    .arg(
        arg!(--"batch-size" <N>)
            .required(false)
            .help("Pages rendered concurrently per batch")
            .value_parser(clap::value_parser!(usize))
            .default_value("3"),
    )
    .arg(
        arg!(--"similarity-threshold" <SCORE>)
            .required(false)
            .help("Jaccard score at or above which two pages are reported as near-duplicates")
            .value_parser(clap::value_parser!(f64))
            .default_value("0.75"),
    )
    .arg(
        arg!(--"min-shingles" <N>)
            .required(false)
            .help("Leave pages with fewer 5-word shingles out of similarity pairing")
            .value_parser(clap::value_parser!(usize))
            .default_value("0"),
    )
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("siteaudit")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("siteaudit")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress bars and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(with_sitemap_args(
            command!("redirects")
                .about("Follow redirect chains for every sitemap URL and its scheme/www variants"),
        ))
        .subcommand(with_sitemap_args(
            command!("headers").about("Capture allow-listed response headers per URL and variant"),
        ))
        .subcommand(with_render_args(with_sitemap_args(
            command!("content").about(
                "Render pages and report duplicate titles, missing descriptions and similar content",
            ),
        )))
        .subcommand(with_render_args(with_sitemap_args(
            command!("links")
                .about("Render pages and report inbound links and social preview metadata"),
        )))
        .subcommand(
            command!("aggregate")
                .about("Join the redirect and header reports into a text and CSV audit")
                .arg(out_dir_arg()),
        )
        .subcommand(with_render_args(with_sitemap_args(
            command!("all").about("Run every stage, then aggregate"),
        )))
}

pub mod aggregate;
pub mod config;
pub mod links;
pub mod pipeline;
pub mod report;
pub mod seo;
pub mod similarity;

use colored::Colorize;

pub use config::{AuditConfig, RendererKind};

pub fn print_banner() {
    let title = format!("siteaudit v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("{}", title.bold().cyan());
    eprintln!(
        "{}",
        "sitemap-driven redirect, header, content and link audit".dimmed()
    );
    eprintln!();
}

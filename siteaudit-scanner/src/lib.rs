pub mod crawler;
pub mod error;
pub mod events;
pub mod extract;
pub mod headers;
pub mod http;
pub mod loader;
pub mod redirect;
pub mod render;
pub mod result;
pub mod retry;
pub mod sitemap;
pub mod urls;

pub use crawler::Crawler;
pub use error::{Result, ScanError};
pub use events::{AuditEvent, ProgressCallback};
pub use headers::{HeaderEntry, HeaderInspector, HeaderResult};
pub use loader::{BrowserLoader, LoaderState};
pub use redirect::{ChainStop, RedirectChain, RedirectChainResolver, RedirectResult};
pub use render::{BrowserRenderer, ChromiumEngine, PageRenderer, StaticHtmlRenderer};
pub use result::{PageExtract, PageOutcome};
pub use retry::RetryPolicy;
pub use sitemap::SitemapResolver;

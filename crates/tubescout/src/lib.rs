//! Tubescout: concurrent harvesting of YouTube channel listings from search results.

pub mod config;
pub mod extract;
pub mod harvest;
pub mod output;
pub mod progress;
pub mod scraper;
pub mod session;
pub mod store;
pub mod types;

pub use config::{ConfigLoader, TargetConfig};
pub use extract::{ChannelExtractor, Extractor, ExtractorRegistry};
pub use harvest::{read_terms, HarvestSummary, Harvester, DEFAULT_KEY_COLUMN, DEFAULT_KEY_FILE};
pub use output::{OutputFormat, OutputWriter};
pub use scraper::Scraper;
pub use session::chromium::ChromiumProvider;
pub use session::{BrowserSession, PageElement, SessionGuard, SessionProvider};
pub use store::KeyStore;
pub use types::*;

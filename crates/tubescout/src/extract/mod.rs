//! Extraction strategies and their registry.
//!
//! An `Extractor` turns one rendered search page into records. Extractors are
//! selected by the config's `type` key through an `ExtractorRegistry`, so new
//! result kinds register here without touching the harvester.

pub mod channel;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::TargetConfig;
use crate::session::{BrowserSession, PageElement};
use crate::types::{ExtractedRecord, HarvestError, HarvestResult};

pub use channel::ChannelExtractor;

/// Converts one search term into records using a live session.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Registry name of this extractor.
    fn kind(&self) -> &'static str;

    /// Load the results page for `term` and extract every usable record.
    ///
    /// "No results" is `Ok(vec![])`, not an error.
    async fn extract(
        &self,
        session: &mut dyn BrowserSession,
        term: &str,
    ) -> Result<Vec<ExtractedRecord>>;
}

/// Builds an extractor from a target config.
pub type ExtractorFactory = fn(&TargetConfig) -> Arc<dyn Extractor>;

/// Maps config type names to extractor constructors.
#[derive(Clone)]
pub struct ExtractorRegistry {
    factories: HashMap<String, ExtractorFactory>,
}

impl ExtractorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the built-in extractors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ChannelExtractor::KIND, |config| {
            Arc::new(ChannelExtractor::new(config))
        });
        registry
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: &str, factory: ExtractorFactory) {
        self.factories.insert(kind.to_string(), factory);
    }

    /// Instantiate the extractor named by `config.kind`.
    pub fn create(&self, config: &TargetConfig) -> HarvestResult<Arc<dyn Extractor>> {
        self.factories
            .get(config.kind.as_str())
            .map(|factory| factory(config))
            .ok_or_else(|| HarvestError::UnknownExtractor(config.kind.clone()))
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Scroll to the bottom `steps` times, pausing after each step so lazily
/// rendered results can load. A failed scroll stops further steps.
pub async fn progressive_load(session: &mut dyn BrowserSession, steps: u32, pause: Duration) {
    for i in 0..steps {
        if let Err(e) = session.scroll_to_bottom().await {
            tracing::warn!("Scroll {}/{} failed, keeping what loaded: {e:#}", i + 1, steps);
            return;
        }
        tokio::time::sleep(pause).await;
        tracing::debug!("Scrolled {}/{}", i + 1, steps);
    }
}

/// Text of a child element, or empty when it is missing or unreadable.
pub async fn safe_text(element: &dyn PageElement, selector: &str) -> String {
    element.child_text(selector).await.unwrap_or_default()
}

/// Trimmed attribute of a child element, or empty when it is missing or
/// unreadable.
pub async fn safe_attribute(element: &dyn PageElement, selector: &str, name: &str) -> String {
    element
        .child_attribute(selector, name)
        .await
        .ok()
        .flatten()
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// Resolve a possibly relative link against `origin`.
///
/// Absolute URLs (anything with a scheme) and empty strings pass through
/// unchanged; no other normalization is applied.
pub fn absolutize(link: &str, origin: &str) -> String {
    if link.is_empty() || url::Url::parse(link).is_ok() {
        return link.to_string();
    }

    let origin = origin.trim_end_matches('/');
    if let Some(rest) = link.strip_prefix("//") {
        let scheme = origin.split("://").next().unwrap_or("https");
        return format!("{scheme}://{rest}");
    }
    if link.starts_with('/') {
        format!("{origin}{link}")
    } else {
        format!("{origin}/{link}")
    }
}

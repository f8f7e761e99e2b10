//! Single-query scraping: one term, one session, one extractor pass.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::TargetConfig;
use crate::extract::{Extractor, ExtractorRegistry};
use crate::output::{OutputFormat, OutputWriter};
use crate::session::{SessionGuard, SessionProvider};
use crate::types::{ExtractedRecord, HarvestError, HarvestResult};

/// Runs the configured extractor for one term inside a fresh session.
#[derive(Clone)]
pub struct Scraper {
    config: Arc<TargetConfig>,
    extractor: Arc<dyn Extractor>,
    provider: Arc<dyn SessionProvider>,
}

impl Scraper {
    /// Resolve the extractor for `config.kind`; unknown kinds fail here.
    pub fn new(
        config: TargetConfig,
        provider: Arc<dyn SessionProvider>,
        registry: &ExtractorRegistry,
    ) -> HarvestResult<Self> {
        let extractor = registry.create(&config)?;
        Ok(Self {
            config: Arc::new(config),
            extractor,
            provider,
        })
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Scrape `term` in its own session. The session is closed on every path.
    pub async fn scrape(&self, term: &str) -> HarvestResult<Vec<ExtractedRecord>> {
        tracing::info!("Starting scrape for query: {term}");

        let mut guard = SessionGuard::acquire(self.provider.as_ref())
            .await
            .map_err(HarvestError::Session)?;

        let result = async {
            let session = guard.session_mut()?;
            self.extractor.extract(session, term).await
        }
        .await;

        if let Err(e) = guard.close().await {
            tracing::warn!("[{term}] Failed to close session: {e:#}");
        }

        let records = result.map_err(HarvestError::Session)?;
        tracing::info!("Extracted {} items for query: {term}", records.len());
        Ok(records)
    }

    /// Save records using the config's output defaults unless `format` is given.
    pub fn save(
        &self,
        writer: &OutputWriter,
        records: &[ExtractedRecord],
        term: &str,
        format: Option<OutputFormat>,
    ) -> HarvestResult<Option<PathBuf>> {
        let format = match format {
            Some(f) => f,
            None => self.config.output.format.parse()?,
        };
        writer.save(records, &self.config.output.filename, Some(term), format)
    }
}

//! Channel listings from a channel-filtered search results page.

use anyhow::Result;
use async_trait::async_trait;

use super::{absolutize, progressive_load, safe_attribute, safe_text, Extractor};
use crate::config::{OptionsConfig, SearchConfig, SelectorConfig, TargetConfig};
use crate::session::{BrowserSession, PageElement};
use crate::types::ExtractedRecord;

/// Extracts channel records from search results.
pub struct ChannelExtractor {
    search: SearchConfig,
    selectors: SelectorConfig,
    options: OptionsConfig,
}

impl ChannelExtractor {
    pub const KIND: &'static str = "channel";

    pub fn new(config: &TargetConfig) -> Self {
        Self {
            search: config.search.clone(),
            selectors: config.selectors.clone(),
            options: config.options.clone(),
        }
    }

    /// Build the channel-filtered search URL for `term`.
    pub fn build_search_url(&self, term: &str) -> String {
        let query: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        let mut url = format!("{}?{}={}", self.search.base_url, self.search.query_param, query);
        if !self.search.filter_param.is_empty() {
            url.push_str(&format!(
                "&{}={}",
                self.search.filter_param, self.search.filter_value
            ));
        }
        url
    }

    async fn extract_channel(&self, item: &dyn PageElement) -> ExtractedRecord {
        let sel = &self.selectors;
        let raw_url = safe_attribute(item, &sel.channel_url, "href").await;

        ExtractedRecord {
            channel_name: safe_text(item, &sel.channel_name).await,
            channel_url: absolutize(&raw_url, &self.search.origin),
            subscribers: safe_text(item, &sel.subscribers).await,
            video_count: safe_text(item, &sel.video_count).await,
            description: safe_text(item, &sel.description).await,
        }
    }
}

#[async_trait]
impl Extractor for ChannelExtractor {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn extract(
        &self,
        session: &mut dyn BrowserSession,
        term: &str,
    ) -> Result<Vec<ExtractedRecord>> {
        let url = self.build_search_url(term);
        tracing::info!("Fetching: {url}");
        session.navigate(&url).await?;

        let container = &self.selectors.item_container;
        match session
            .wait_for_element(container, self.options.element_timeout())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("[{term}] No channels found or page didn't load");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!("[{term}] Waiting for results failed: {e:#}");
                return Ok(Vec::new());
            }
        }

        progressive_load(session, self.options.max_scroll, self.options.scroll_pause()).await;

        let items = session.find_elements(container).await?;
        tracing::info!("[{term}] Found {} channel elements", items.len());

        let mut channels = Vec::with_capacity(items.len());
        for item in &items {
            let channel = self.extract_channel(item.as_ref()).await;
            if channel.is_usable() {
                channels.push(channel);
            }
        }

        tracing::info!("[{term}] Extracted {} valid channels", channels.len());
        Ok(channels)
    }
}

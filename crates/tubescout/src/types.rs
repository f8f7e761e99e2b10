//! Core data types for harvested channel records.

use serde::{Deserialize, Serialize};

/// One search query submitted to the harvester.
pub type SearchTerm = String;

/// A channel listing scraped from one search result container.
///
/// Every field is best-effort: a missing sub-element yields an empty string.
/// Field order here is the column order of written output files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub channel_name: String,
    pub channel_url: String,
    pub subscribers: String,
    pub video_count: String,
    pub description: String,
}

impl ExtractedRecord {
    /// A record is usable only when its canonical URL was found.
    pub fn is_usable(&self) -> bool {
        !self.channel_url.is_empty()
    }

    /// The deduplication key for this record.
    pub fn key(&self) -> &str {
        &self.channel_url
    }
}

/// Collect the deduplication keys of all usable records, in order.
pub fn record_keys(records: &[ExtractedRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.is_usable())
        .map(|r| r.key().to_string())
        .collect()
}

/// Errors that can occur in the harvesting library.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown extractor type: {0}")]
    UnknownExtractor(String),

    #[error("Session error: {0:#}")]
    Session(anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Terms file not found: {0}")]
    TermsNotFound(String),
}

impl From<figment::Error> for HarvestError {
    fn from(e: figment::Error) -> Self {
        HarvestError::Config(e.to_string())
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> ExtractedRecord {
        ExtractedRecord {
            channel_name: "name".to_string(),
            channel_url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_usable_requires_url() {
        assert!(record("https://www.youtube.com/@a").is_usable());
        assert!(!record("").is_usable());
    }

    #[test]
    fn test_record_keys_skips_unusable() {
        let records = vec![record("u1"), record(""), record("u2")];
        assert_eq!(record_keys(&records), vec!["u1", "u2"]);
    }

    #[test]
    fn test_error_display() {
        let e = HarvestError::UnknownExtractor("video".to_string());
        assert_eq!(e.to_string(), "Unknown extractor type: video");
        let e = HarvestError::InvalidKey("a\nb".to_string());
        assert!(e.to_string().contains("a\\nb"));
    }
}

//! Structured output files for single-query runs.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Local;

use crate::types::{ExtractedRecord, HarvestError, HarvestResult};

/// Serialization format of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(HarvestError::Output(format!("unknown output format: {other}"))),
        }
    }
}

/// Writes record batches into an output directory.
pub struct OutputWriter {
    output_dir: PathBuf,
}

impl OutputWriter {
    /// Create a writer, creating the output directory if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> HarvestResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `records` to `<base>_<query>_<timestamp>.<ext>`.
    ///
    /// Returns `None` without touching the disk when there is nothing to save.
    pub fn save(
        &self,
        records: &[ExtractedRecord],
        base_name: &str,
        query: Option<&str>,
        format: OutputFormat,
    ) -> HarvestResult<Option<PathBuf>> {
        if records.is_empty() {
            tracing::warn!("No data to save");
            return Ok(None);
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let stem = output_file_stem(base_name, query, &timestamp);
        let path = self
            .output_dir
            .join(format!("{stem}.{}", format.extension()));

        match format {
            OutputFormat::Csv => write_csv(&path, records)?,
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(records)
                    .map_err(|e| HarvestError::Output(format!("JSON encoding failed: {e}")))?;
                std::fs::write(&path, json)?;
            }
        }

        tracing::info!("Saved {} items to: {}", records.len(), path.display());
        Ok(Some(path))
    }
}

fn write_csv(path: &Path, records: &[ExtractedRecord]) -> HarvestResult<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| HarvestError::Output(format!("{}: {e}", path.display())))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| HarvestError::Output(format!("CSV encoding failed: {e}")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Build a file stem from a base name, optional query, and timestamp.
///
/// Non-alphanumeric query characters become `_`.
pub fn output_file_stem(base_name: &str, query: Option<&str>, timestamp: &str) -> String {
    let mut parts = vec![base_name.to_string()];
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        let safe: String = q
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        parts.push(safe);
    }
    parts.push(timestamp.to_string());
    parts.join("_")
}

//! Concurrent multi-term harvesting into a deduplicated key file.
//!
//! Every term becomes one task, all submitted up front. A semaphore with
//! `workers` permits bounds how many run at once; each running task owns one
//! browser session for its whole duration. Results are merged into the
//! `KeyStore` in completion order by the single loop in `Harvester::run`.
//!
//! Reaching the target closes the semaphore: tasks still waiting for a permit
//! resolve as cancelled, while tasks that already hold one run to completion
//! and are merged. The stop is best-effort, so the final total can overshoot
//! the target.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::progress::{self, HarvestEventKind, ProgressSender};
use crate::scraper::Scraper;
use crate::store::KeyStore;
use crate::types::{record_keys, ExtractedRecord, HarvestError, HarvestResult, SearchTerm};

/// Default key file name inside the store directory.
pub const DEFAULT_KEY_FILE: &str = "all_channels.csv";

/// Default key column (header token) of the key file.
pub const DEFAULT_KEY_COLUMN: &str = "channel_url";

/// Read a term list: one term per line, trimmed, blank lines skipped.
pub fn read_terms(path: &Path) -> HarvestResult<Vec<SearchTerm>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HarvestError::TermsNotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn target_met(total: usize, target: usize) -> bool {
    target > 0 && total >= target
}

/// Contribution of one finished term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermDelta {
    pub term: SearchTerm,
    pub records: usize,
    pub new_keys: usize,
}

/// Result of one harvest run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub terms_total: usize,
    /// Terms that ran to completion, successfully or not.
    pub terms_processed: usize,
    pub terms_failed: usize,
    /// Terms that never started because the target was reached first.
    pub terms_cancelled: usize,
    pub baseline_keys: usize,
    pub new_keys: usize,
    pub total_keys: usize,
    pub target: usize,
    pub target_reached: bool,
    pub key_file: PathBuf,
    /// Per-term deltas in completion order.
    pub deltas: Vec<TermDelta>,
}

enum TaskResult {
    Done(Vec<ExtractedRecord>),
    Failed(String),
    Cancelled,
}

struct TaskOutcome {
    term: SearchTerm,
    result: TaskResult,
}

/// Fans terms out over a bounded pool and merges their keys.
pub struct Harvester {
    scraper: Scraper,
    store: Arc<KeyStore>,
    key_file: String,
    key_column: String,
    progress: Option<ProgressSender>,
}

impl Harvester {
    pub fn new(scraper: Scraper, store: Arc<KeyStore>) -> Self {
        Self {
            scraper,
            store,
            key_file: DEFAULT_KEY_FILE.to_string(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            progress: None,
        }
    }

    /// Use a different key file and header token.
    pub fn with_key_file(mut self, name: &str, column: &str) -> Self {
        self.key_file = name.to_string();
        self.key_column = column.to_string();
        self
    }

    /// Emit progress events on `tx`.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn key_file_path(&self) -> PathBuf {
        self.store.path_for(&self.key_file)
    }

    /// Harvest `terms` with at most `workers` concurrent sessions until every
    /// term resolves or the key total reaches `target`.
    ///
    /// A `target` of 0 disables the early stop: every term runs. It does not
    /// mean "stop after the first completion".
    ///
    /// Task failures are logged and counted; only key store I/O errors abort
    /// the run.
    pub async fn run(
        &self,
        terms: Vec<SearchTerm>,
        target: usize,
        workers: usize,
    ) -> HarvestResult<HarvestSummary> {
        let workers = workers.max(1);
        let baseline = self.store.load(&self.key_file, &self.key_column)?.len();
        let mut seq: u64 = 0;

        tracing::info!("Loaded {} terms", terms.len());
        tracing::info!("Target: {target} URLs");
        tracing::info!("Current: {baseline} URLs");
        tracing::info!("Workers: {workers}");

        let mut summary = HarvestSummary {
            terms_total: terms.len(),
            terms_processed: 0,
            terms_failed: 0,
            terms_cancelled: 0,
            baseline_keys: baseline,
            new_keys: 0,
            total_keys: baseline,
            target,
            target_reached: false,
            key_file: self.key_file_path(),
            deltas: Vec::new(),
        };

        progress::emit(
            &self.progress,
            &mut seq,
            HarvestEventKind::RunStarted {
                terms: terms.len(),
                baseline,
                target,
                workers,
            },
        );

        let permits = Arc::new(Semaphore::new(workers));
        if target_met(summary.total_keys, target) {
            tracing::info!("Target already reached; nothing to start");
            summary.target_reached = true;
            permits.close();
        }

        let mut tasks = JoinSet::new();
        for term in terms {
            let permits = Arc::clone(&permits);
            let scraper = self.scraper.clone();
            tasks.spawn(async move {
                // Held until this task finishes.
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return TaskOutcome {
                            term,
                            result: TaskResult::Cancelled,
                        }
                    }
                };

                let result = match AssertUnwindSafe(scraper.scrape(&term)).catch_unwind().await {
                    Ok(Ok(records)) => TaskResult::Done(records),
                    Ok(Err(e)) => TaskResult::Failed(e.to_string()),
                    Err(_) => TaskResult::Failed("extraction task panicked".to_string()),
                };
                TaskOutcome { term, result }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Harvest task aborted: {e}");
                    summary.terms_processed += 1;
                    summary.terms_failed += 1;
                    continue;
                }
            };

            self.merge(outcome, &mut summary, &mut seq)?;

            if !summary.target_reached && target_met(summary.total_keys, target) {
                tracing::info!("Target reached!");
                summary.target_reached = true;
                permits.close();
                progress::emit(
                    &self.progress,
                    &mut seq,
                    HarvestEventKind::TargetReached {
                        total: summary.total_keys,
                        target,
                    },
                );
            }
        }

        tracing::info!(
            "Done! Collected {} URLs ({} new)",
            summary.total_keys,
            summary.new_keys
        );
        tracing::info!("Saved to: {}", summary.key_file.display());

        progress::emit(
            &self.progress,
            &mut seq,
            HarvestEventKind::RunComplete {
                processed: summary.terms_processed,
                new_keys: summary.new_keys,
                total: summary.total_keys,
            },
        );

        Ok(summary)
    }

    /// Fold one finished task into the summary, appending its keys.
    fn merge(
        &self,
        outcome: TaskOutcome,
        summary: &mut HarvestSummary,
        seq: &mut u64,
    ) -> HarvestResult<()> {
        let TaskOutcome { term, result } = outcome;
        match result {
            TaskResult::Cancelled => {
                summary.terms_cancelled += 1;
                tracing::debug!("[{term}] Cancelled before start");
                progress::emit(&self.progress, seq, HarvestEventKind::TermCancelled { term });
            }
            TaskResult::Failed(error) => {
                summary.terms_processed += 1;
                summary.terms_failed += 1;
                tracing::warn!("[{term}] Error: {error}");
                progress::emit(
                    &self.progress,
                    seq,
                    HarvestEventKind::TermFailed { term, error },
                );
            }
            TaskResult::Done(records) => {
                let keys = record_keys(&records);
                let new_keys = self
                    .store
                    .append(&keys, &self.key_file, &self.key_column, true)?;

                summary.terms_processed += 1;
                summary.new_keys += new_keys;
                summary.total_keys += new_keys;
                tracing::info!("[{term}] +{new_keys} (Total: {})", summary.total_keys);

                progress::emit(
                    &self.progress,
                    seq,
                    HarvestEventKind::TermCompleted {
                        term: term.clone(),
                        records: records.len(),
                        new_keys,
                        total: summary.total_keys,
                    },
                );
                summary.deltas.push(TermDelta {
                    term,
                    records: records.len(),
                    new_keys,
                });
            }
        }
        Ok(())
    }
}

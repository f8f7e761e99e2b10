//! Progress event types and broadcast channel for harvest telemetry.
//!
//! The harvester emits `HarvestEvent`s as terms complete, which flow through
//! a `tokio::sync::broadcast` channel to any subscribers (CLI progress, log
//! sinks, tests). When no subscriber exists, events are silently dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted during a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEvent {
    /// Monotonically increasing sequence number within one run.
    pub seq: u64,
    /// The kind of progress event.
    pub event: HarvestEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEventKind {
    /// The run loaded its baseline and submitted all terms.
    RunStarted {
        terms: usize,
        baseline: usize,
        target: usize,
        workers: usize,
    },
    /// A term finished and its keys were merged.
    TermCompleted {
        term: String,
        records: usize,
        new_keys: usize,
        total: usize,
    },
    /// A term failed; it contributes nothing.
    TermFailed { term: String, error: String },
    /// A term was cancelled before it started.
    TermCancelled { term: String },
    /// The running total reached the target.
    TargetReached { total: usize, target: usize },
    /// The run finished.
    RunComplete {
        processed: usize,
        new_keys: usize,
        total: usize,
    },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<HarvestEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<HarvestEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers listening).
pub fn emit(tx: &Option<ProgressSender>, seq: &mut u64, event: HarvestEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(HarvestEvent { seq: *seq, event });
    }
}

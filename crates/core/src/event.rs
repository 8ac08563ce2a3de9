//! Observable sweep events.
//!
//! Components never log directly. They hand [`SweepEvent`]s to an injected
//! [`SweepObserver`], which decides where the events go (tracing, a test
//! buffer, a metrics sink).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::id::RunId;
use crate::record::Record;
use crate::report::RunReport;

/// Lifecycle state of a sweep run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Scanning,
    BatchProcessing,
    Draining,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Snapshot of a batch taken before its writes are attempted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Run-global, zero-based batch index.
    pub batch_index: u64,
    pub size: usize,
    /// Expiry assigned to every record in the batch (epoch seconds).
    pub expiry: i64,
    pub expiry_time: String,
    pub oldest_report_time: DateTime<Utc>,
    pub newest_report_time: DateTime<Utc>,
    /// Age in whole days of the oldest and newest record.
    pub oldest_age_days: i64,
    pub newest_age_days: i64,
}

/// Operator hint emitted at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Some items could not be updated; check store error logs, permissions and retry settings.
    FailedItems { count: u64 },
    /// Throughput fell below the configured floor; consider more capacity or a smaller batch.
    LowThroughput { items_per_second: f64, threshold: f64 },
}

/// Everything a sweep run reports while it executes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SweepEvent {
    RunStarted {
        run_id: RunId,
        table_name: String,
        retention_days: u32,
        cutoff_ms: i64,
        cutoff_date: String,
        base_expiry: i64,
        base_expiry_time: String,
    },
    StateChanged {
        from: RunState,
        to: RunState,
    },
    PageScanned {
        page: u64,
        items: usize,
        batches: usize,
        has_more: bool,
    },
    ScanCompleted {
        pages: u64,
    },
    BatchStarted(BatchSummary),
    ItemWriteFailed {
        batch_index: u64,
        item: Record,
        error: String,
    },
    BatchCompleted {
        batch_index: u64,
        size: usize,
        updated: usize,
    },
    Progress {
        processed: u64,
        updated: u64,
        items_per_second: f64,
    },
    /// A rate-limited call will be retried after `backoff_ms`.
    Throttled {
        operation: String,
        attempt: u32,
        max_attempts: u32,
        backoff_ms: u64,
    },
    /// A call succeeded after at least one throttled attempt.
    Recovered {
        operation: String,
        attempts: u32,
    },
    RetryExhausted {
        operation: String,
        attempts: u32,
        error: String,
    },
    /// A call failed with a non-retryable error.
    OperationFailed {
        operation: String,
        error: String,
    },
    RunCompleted(RunReport),
    RunFailed {
        error: String,
    },
    Advisory(Advisory),
}

/// Sink for sweep events.
pub trait SweepObserver: Send + Sync {
    fn observe(&self, event: &SweepEvent);
}

impl<O> SweepObserver for Arc<O>
where
    O: SweepObserver + ?Sized,
{
    fn observe(&self, event: &SweepEvent) {
        (**self).observe(event)
    }
}

/// Observer that drops every event.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopObserver;

impl SweepObserver for NoopObserver {
    fn observe(&self, _event: &SweepEvent) {}
}

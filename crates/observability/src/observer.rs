use std::sync::Mutex;

use ::tracing::{debug, error, info, warn};

use stagger_core::{Advisory, SweepEvent, SweepObserver};

/// Forwards sweep events to `tracing` as structured events.
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingObserver;

impl SweepObserver for TracingObserver {
    fn observe(&self, event: &SweepEvent) {
        match event {
            SweepEvent::RunStarted {
                run_id,
                table_name,
                retention_days,
                cutoff_date,
                base_expiry,
                base_expiry_time,
                ..
            } => info!(
                run_id = %run_id,
                table = %table_name,
                retention_days,
                cutoff = %cutoff_date,
                base_expiry,
                base_expiry_time = %base_expiry_time,
                "starting ttl sweep"
            ),
            SweepEvent::StateChanged { from, to } => {
                debug!(from = ?from, to = ?to, "run state changed")
            }
            SweepEvent::PageScanned {
                page,
                items,
                batches,
                has_more,
            } => info!(page, items, batches, has_more, "scanned page"),
            SweepEvent::ScanCompleted { pages } => info!(pages, "completed scanning all items"),
            SweepEvent::BatchStarted(summary) => info!(
                batch = summary.batch_index + 1,
                size = summary.size,
                expiry = summary.expiry,
                expiry_time = %summary.expiry_time,
                oldest = %summary.oldest_report_time,
                newest = %summary.newest_report_time,
                age_days = %format!("{} to {}", summary.oldest_age_days, summary.newest_age_days),
                "processing batch"
            ),
            SweepEvent::ItemWriteFailed {
                batch_index,
                item,
                error,
            } => error!(
                batch = batch_index + 1,
                item = %item,
                error = %error,
                "failed to update item"
            ),
            SweepEvent::BatchCompleted {
                batch_index,
                size,
                updated,
            } => {
                if updated < size {
                    warn!(batch = batch_index + 1, size, updated, "batch partially updated");
                } else {
                    info!(batch = batch_index + 1, size, "batch fully updated");
                }
            }
            SweepEvent::Progress {
                processed,
                updated,
                items_per_second,
            } => info!(
                processed,
                updated,
                items_per_second = %format!("{items_per_second:.2}"),
                "progress"
            ),
            SweepEvent::Throttled {
                operation,
                attempt,
                max_attempts,
                backoff_ms,
            } => warn!(
                operation = %operation,
                attempt,
                max_attempts,
                backoff_ms,
                "request throttled, backing off"
            ),
            SweepEvent::Recovered {
                operation,
                attempts,
            } => info!(operation = %operation, attempts, "recovered after throttling"),
            SweepEvent::RetryExhausted {
                operation,
                attempts,
                error,
            } => error!(
                operation = %operation,
                attempts,
                error = %error,
                "max retries exceeded; consider raising provisioned throughput"
            ),
            SweepEvent::OperationFailed { operation, error } => {
                error!(operation = %operation, error = %error, "unexpected store error")
            }
            SweepEvent::RunCompleted(report) => info!(
                run_id = %report.run_id,
                report = %report.to_json(),
                "final statistics"
            ),
            SweepEvent::RunFailed { error } => error!(error = %error, "ttl sweep failed"),
            SweepEvent::Advisory(Advisory::FailedItems { count }) => warn!(
                failed_items = count,
                "some items were not updated; check store error logs, permissions and retry settings"
            ),
            SweepEvent::Advisory(Advisory::LowThroughput {
                items_per_second,
                threshold,
            }) => warn!(
                items_per_second = %format!("{items_per_second:.2}"),
                threshold,
                "processing speed is low; consider more provisioned throughput or a smaller batch"
            ),
        }
    }
}

/// Keeps every observed event in memory.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SweepEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SweepEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Events for which `pred` holds, in emission order.
    pub fn matching(&self, pred: impl Fn(&SweepEvent) -> bool) -> Vec<SweepEvent> {
        self.events().into_iter().filter(|e| pred(e)).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl SweepObserver for RecordingObserver {
    fn observe(&self, event: &SweepEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagger_core::RunState;

    #[test]
    fn recording_observer_keeps_emission_order() {
        let observer = RecordingObserver::new();
        observer.observe(&SweepEvent::StateChanged {
            from: RunState::Init,
            to: RunState::Scanning,
        });
        observer.observe(&SweepEvent::ScanCompleted { pages: 2 });

        assert_eq!(observer.len(), 2);
        assert_eq!(
            observer.matching(|e| matches!(e, SweepEvent::ScanCompleted { .. })),
            vec![SweepEvent::ScanCompleted { pages: 2 }]
        );

        observer.clear();
        assert!(observer.is_empty());
    }

    #[test]
    fn tracing_observer_accepts_every_event_kind() {
        let observer = TracingObserver;
        observer.observe(&SweepEvent::Throttled {
            operation: "put_item".into(),
            attempt: 1,
            max_attempts: 3,
            backoff_ms: 100,
        });
        observer.observe(&SweepEvent::Advisory(Advisory::FailedItems { count: 3 }));
        observer.observe(&SweepEvent::RunFailed {
            error: "scan failed".into(),
        });
    }
}

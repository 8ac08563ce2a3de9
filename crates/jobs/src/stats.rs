//! Run statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stagger_core::{RunId, RunReport};

use crate::assigner::batch_expiry;

/// Fixed facts about a run, known once `Init` is done.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub run_id: RunId,
    pub table_name: String,
    pub retention_days: u32,
    pub cutoff_ms: i64,
    pub cutoff_date: String,
    pub base_ttl: i64,
    pub base_ttl_time: String,
    /// Seconds between consecutive batch expiries.
    pub increment_secs: i64,
}

/// Accumulator updated after every batch.
///
/// Counters only ever grow. Derived fields are filled in by
/// [`RunStatistics::finalize`], which only computes them the first time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub metadata: RunMetadata,
    pub total_processed: u64,
    pub total_updated: u64,
    pub failed_items: u64,
    pub throttling_events: u64,
    pub batch_count: u64,
    pub pages_processed: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: f64,
    pub items_per_second: f64,
    pub success_rate: Option<f64>,
}

impl RunStatistics {
    pub fn new(metadata: RunMetadata, started_at: DateTime<Utc>) -> Self {
        Self {
            metadata,
            total_processed: 0,
            total_updated: 0,
            failed_items: 0,
            throttling_events: 0,
            batch_count: 0,
            pages_processed: 0,
            started_at,
            ended_at: None,
            elapsed_seconds: 0.0,
            items_per_second: 0.0,
            success_rate: None,
        }
    }

    /// Account for one processed batch.
    pub fn record(&mut self, batch_size: usize, success_count: usize) {
        let success_count = success_count.min(batch_size);
        self.total_processed += batch_size as u64;
        self.total_updated += success_count as u64;
        self.failed_items += (batch_size - success_count) as u64;
        self.batch_count += 1;
    }

    pub fn record_page(&mut self) {
        self.pages_processed += 1;
    }

    pub fn record_throttling(&mut self, events: u64) {
        self.throttling_events = self.throttling_events.max(events);
    }

    pub fn first_ttl(&self) -> i64 {
        self.metadata.base_ttl
    }

    /// Expiry of the most recent batch; the base expiry before any batch ran.
    pub fn last_ttl(&self) -> i64 {
        batch_expiry(
            self.metadata.base_ttl,
            self.batch_count.saturating_sub(1),
            self.metadata.increment_secs,
        )
    }

    pub fn ttl_span_minutes(&self) -> u64 {
        self.batch_count * (self.metadata.increment_secs.max(0) as u64) / 60
    }

    /// Items processed per second of wall time up to `now`.
    pub fn items_per_second_at(&self, now: DateTime<Utc>) -> f64 {
        rate(self.total_processed, elapsed_seconds(self.started_at, now))
    }

    /// Compute the derived fields and produce the report.
    ///
    /// Only the first call fixes the end time; later calls return the same report.
    pub fn finalize(&mut self, ended_at: DateTime<Utc>) -> RunReport {
        if self.ended_at.is_none() {
            self.ended_at = Some(ended_at);
            self.elapsed_seconds = elapsed_seconds(self.started_at, ended_at);
            self.items_per_second = rate(self.total_processed, self.elapsed_seconds);
            self.success_rate = (self.total_processed > 0)
                .then(|| self.total_updated as f64 / self.total_processed as f64 * 100.0);
        }
        self.report()
    }

    fn report(&self) -> RunReport {
        let meta = &self.metadata;
        RunReport {
            run_id: meta.run_id,
            table_name: meta.table_name.clone(),
            retention_days: meta.retention_days,
            cutoff_ms: meta.cutoff_ms,
            cutoff_date: meta.cutoff_date.clone(),
            base_ttl: meta.base_ttl,
            base_ttl_time: meta.base_ttl_time.clone(),
            total_processed: self.total_processed,
            total_updated: self.total_updated,
            failed_items: self.failed_items,
            throttling_events: self.throttling_events,
            batch_count: self.batch_count,
            pages_processed: self.pages_processed,
            first_ttl: self.first_ttl(),
            last_ttl: self.last_ttl(),
            start_time: self.started_at,
            end_time: self.ended_at.unwrap_or(self.started_at),
            elapsed_seconds: self.elapsed_seconds,
            items_per_second: self.items_per_second,
            success_rate: self.success_rate,
            ttl_span_minutes: self.ttl_span_minutes(),
        }
    }
}

fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}

fn rate(items: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        items as f64 / seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BASE: i64 = 1_710_000_000;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn stats() -> RunStatistics {
        RunStatistics::new(
            RunMetadata {
                run_id: RunId::new(),
                table_name: "impressions".into(),
                retention_days: 60,
                cutoff_ms: 0,
                cutoff_date: String::new(),
                base_ttl: BASE,
                base_ttl_time: String::new(),
                increment_secs: 900,
            },
            start(),
        )
    }

    #[test]
    fn record_tracks_partial_failures() {
        let mut s = stats();
        s.record(25, 25);
        s.record(15, 12);

        assert_eq!(s.total_processed, 40);
        assert_eq!(s.total_updated, 37);
        assert_eq!(s.failed_items, 3);
        assert_eq!(s.batch_count, 2);
        assert_eq!(s.last_ttl(), BASE + 900);
        assert_eq!(s.ttl_span_minutes(), 30);
    }

    #[test]
    fn finalize_computes_derived_fields_once() {
        let mut s = stats();
        s.record(20, 15);
        s.record_page();

        let report = s.finalize(start() + chrono::Duration::seconds(4));
        assert_eq!(report.elapsed_seconds, 4.0);
        assert_eq!(report.items_per_second, 5.0);
        assert_eq!(report.success_rate, Some(75.0));
        assert_eq!(report.pages_processed, 1);
        assert_eq!(report.first_ttl, BASE);

        let again = s.finalize(start() + chrono::Duration::seconds(60));
        assert_eq!(again, report);
    }

    #[test]
    fn empty_run_has_no_success_rate_and_zero_throughput() {
        let mut s = stats();
        let report = s.finalize(start());

        assert_eq!(report.success_rate, None);
        assert_eq!(report.items_per_second, 0.0);
        assert_eq!(report.last_ttl, BASE);
        assert_eq!(report.ttl_span_minutes, 0);
    }

    #[test]
    fn items_per_second_at_handles_zero_elapsed() {
        let mut s = stats();
        s.record(10, 10);
        assert_eq!(s.items_per_second_at(start()), 0.0);
        assert_eq!(s.items_per_second_at(start() + chrono::Duration::seconds(2)), 5.0);
    }
}

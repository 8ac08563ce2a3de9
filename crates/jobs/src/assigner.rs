//! Batching and per-batch expiry assignment.

use chrono::{DateTime, Utc};

use stagger_core::{BatchSummary, Record, SweepEvent};
use stagger_store::KvStore;

use crate::env::SweepEnv;
use crate::expiry::ExpiryClock;
use crate::retry::Retrier;

/// Largest group of items the store accepts in one write call.
pub const MAX_BATCH_SIZE: usize = 25;

/// Seconds between the expiries of consecutive batches.
pub const DEFAULT_TTL_INCREMENT_SECS: i64 = 15 * 60;

/// Ordered, non-empty group of at most [`MAX_BATCH_SIZE`] records.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// `None` when `records` is empty or larger than [`MAX_BATCH_SIZE`].
    pub fn new(records: Vec<Record>) -> Option<Self> {
        if records.is_empty() || records.len() > MAX_BATCH_SIZE {
            return None;
        }
        Some(Self { records })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Slice items into batches of `batch_size` (clamped to `1..=25`), keeping encounter order.
pub fn split_into_batches(items: Vec<Record>, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        let records: Vec<Record> = items.by_ref().take(size).collect();
        batches.extend(Batch::new(records));
    }
    batches
}

/// Expiry of the batch with run-global index `batch_index`.
pub fn batch_expiry(base_expiry: i64, batch_index: u64, increment_secs: i64) -> i64 {
    base_expiry + batch_index as i64 * increment_secs
}

/// Stamps every record of a batch with the batch's expiry and writes it back.
///
/// Holds no state of its own between batches. Writes are best effort: a failed
/// item is reported and skipped, the rest of the batch is still written.
pub struct BatchExpiryAssigner<'a, S: ?Sized> {
    store: &'a S,
    retrier: &'a Retrier,
    env: &'a SweepEnv,
    expiry_clock: ExpiryClock,
    ttl_attribute: &'a str,
    increment_secs: i64,
}

impl<'a, S> BatchExpiryAssigner<'a, S>
where
    S: KvStore + ?Sized,
{
    pub fn new(
        store: &'a S,
        retrier: &'a Retrier,
        env: &'a SweepEnv,
        expiry_clock: ExpiryClock,
        ttl_attribute: &'a str,
        increment_secs: i64,
    ) -> Self {
        Self {
            store,
            retrier,
            env,
            expiry_clock,
            ttl_attribute,
            increment_secs,
        }
    }

    /// Write the batch with its expiry; returns how many items were written.
    pub fn apply(&self, batch: &Batch, base_expiry: i64, batch_index: u64) -> usize {
        let expiry = batch_expiry(base_expiry, batch_index, self.increment_secs);
        self.env
            .observe(&SweepEvent::BatchStarted(self.summarize(batch, batch_index, expiry)));

        let mut updated = 0;
        for record in batch.records() {
            let tagged = record.with_attribute(self.ttl_attribute, expiry);
            match self
                .retrier
                .execute("put_item", || self.store.put_item(&tagged))
            {
                Ok(()) => updated += 1,
                Err(err) => self.env.observe(&SweepEvent::ItemWriteFailed {
                    batch_index,
                    item: record.clone(),
                    error: err.to_string(),
                }),
            }
        }

        self.env.observe(&SweepEvent::BatchCompleted {
            batch_index,
            size: batch.len(),
            updated,
        });
        updated
    }

    fn summarize(&self, batch: &Batch, batch_index: u64, expiry: i64) -> BatchSummary {
        let report_times = batch
            .records()
            .iter()
            .map(|r| r.report_time_ms().unwrap_or(0));
        let oldest = report_times.clone().min().unwrap_or(0);
        let newest = report_times.max().unwrap_or(0);

        let now = self.env.now();
        let oldest_report_time = from_millis(oldest);
        let newest_report_time = from_millis(newest);

        BatchSummary {
            batch_index,
            size: batch.len(),
            expiry,
            expiry_time: self.expiry_clock.format(expiry),
            oldest_report_time,
            newest_report_time,
            oldest_age_days: (now - oldest_report_time).num_days(),
            newest_age_days: (now - newest_report_time).num_days(),
        }
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

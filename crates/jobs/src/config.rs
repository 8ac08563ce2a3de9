//! Run parameters.

use serde::{Deserialize, Serialize};

use stagger_core::{REPORT_TIME_ATTR, TTL_ATTR};

use crate::assigner::MAX_BATCH_SIZE;
use crate::error::{SweepError, SweepResult};
use crate::expiry::{DEFAULT_EXPIRY_HOUR, DEFAULT_UTC_OFFSET_HOURS, ExpiryClock};
use crate::retry::RetryPolicy;

pub const DEFAULT_TABLE_NAME: &str = "ExportImpressionRecordTable";
pub const DEFAULT_RETENTION_DAYS: u32 = 60;
/// Upper bound on `retention_days` (roughly a century).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

pub const TABLE_NAME_ENV: &str = "STAGGER_TABLE_NAME";
pub const RETENTION_DAYS_ENV: &str = "STAGGER_RETENTION_DAYS";
pub const SCAN_PAGE_LIMIT_ENV: &str = "STAGGER_SCAN_PAGE_LIMIT";

/// Sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub table_name: String,
    /// Records with `reportTime` older than `now - retention_days` are eligible.
    pub retention_days: u32,
    /// Records per batch, at most 25.
    pub batch_size: usize,
    /// Minutes between consecutive batch expiries.
    pub ttl_increment_minutes: u32,
    /// Civil hour the base expiry lands on.
    pub expiry_hour: u32,
    /// Fixed UTC offset (hours) the expiry hour is interpreted in.
    pub utc_offset_hours: i32,
    /// Items evaluated per scan call; store default when unset.
    ///
    /// A page whose evaluated items are all ineligible comes back empty and
    /// ends the sweep even if the store returned a cursor. Lowering this
    /// limit makes that more likely and can leave older eligible records
    /// for the next run.
    pub scan_page_limit: Option<usize>,
    pub retry: RetryPolicy,
    /// Items/second below which a low-throughput advisory is emitted.
    pub low_throughput_threshold: f64,
    pub ttl_attribute: String,
    pub report_time_attribute: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            batch_size: MAX_BATCH_SIZE,
            ttl_increment_minutes: 15,
            expiry_hour: DEFAULT_EXPIRY_HOUR,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            scan_page_limit: None,
            retry: RetryPolicy::default(),
            low_throughput_threshold: 10.0,
            ttl_attribute: TTL_ATTR.to_string(),
            report_time_attribute: REPORT_TIME_ATTR.to_string(),
        }
    }
}

impl SweepConfig {
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_scan_page_limit(mut self, limit: usize) -> Self {
        self.scan_page_limit = Some(limit);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Defaults overridden by `STAGGER_*` environment variables.
    pub fn from_env() -> SweepResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `STAGGER_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SweepResult<Self> {
        let mut config = Self::default();

        if let Some(table) = lookup(TABLE_NAME_ENV) {
            config.table_name = table;
        }
        if let Some(days) = lookup(RETENTION_DAYS_ENV) {
            config.retention_days = days
                .trim()
                .parse()
                .map_err(|e| SweepError::config(format!("{RETENTION_DAYS_ENV}={days}: {e}")))?;
        }
        if let Some(limit) = lookup(SCAN_PAGE_LIMIT_ENV) {
            config.scan_page_limit = Some(
                limit
                    .trim()
                    .parse()
                    .map_err(|e| SweepError::config(format!("{SCAN_PAGE_LIMIT_ENV}={limit}: {e}")))?,
            );
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SweepResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(SweepError::config("table_name must not be empty"));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(SweepError::config(format!(
                "retention_days must be at most {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(SweepError::config(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.ttl_increment_minutes == 0 {
            return Err(SweepError::config("ttl_increment_minutes must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(SweepError::config("retry.max_attempts must be at least 1"));
        }
        if self.scan_page_limit == Some(0) {
            return Err(SweepError::config("scan_page_limit must be positive"));
        }
        if self.ttl_attribute.is_empty() || self.report_time_attribute.is_empty() {
            return Err(SweepError::config("attribute names must not be empty"));
        }
        self.expiry_clock()
            .map_err(|e| SweepError::config(e.to_string()))?;
        Ok(())
    }

    pub fn expiry_clock(&self) -> SweepResult<ExpiryClock> {
        ExpiryClock::new(self.utc_offset_hours, self.expiry_hour)
    }

    pub fn increment_secs(&self) -> i64 {
        i64::from(self.ttl_increment_minutes) * 60
    }
}

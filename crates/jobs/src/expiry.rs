//! Base expiry computation.

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::{SweepError, SweepResult};

/// Hour of day (civil, at the fixed offset) every base expiry lands on.
pub const DEFAULT_EXPIRY_HOUR: u32 = 13;

/// Fixed civil offset used for the anchor: UTC−05:00, no daylight saving.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -5;

/// Days between the run and the first batch's expiry.
pub const LEAD_TIME_DAYS: i64 = 7;

/// Computes the instant the first batch of a run expires.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpiryClock {
    offset: FixedOffset,
    hour: u32,
}

impl ExpiryClock {
    pub fn new(utc_offset_hours: i32, hour: u32) -> SweepResult<Self> {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| SweepError::clock(format!("invalid utc offset: {utc_offset_hours}h")))?;
        if hour > 23 {
            return Err(SweepError::clock(format!("invalid expiry hour: {hour}")));
        }
        Ok(Self { offset, hour })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// One calendar week after `now`, at `hour`:00:00 in the fixed offset, as epoch seconds.
    pub fn compute_base_expiry(&self, now: DateTime<Utc>) -> SweepResult<i64> {
        let next_week = now.with_timezone(&self.offset) + chrono::Duration::days(LEAD_TIME_DAYS);
        let anchored = next_week
            .date_naive()
            .and_hms_opt(self.hour, 0, 0)
            .and_then(|t| t.and_local_timezone(self.offset).single())
            .ok_or_else(|| SweepError::clock(format!("cannot anchor {next_week} at {}:00", self.hour)))?;
        Ok(anchored.timestamp())
    }

    /// Epoch seconds rendered as RFC 3339 in the fixed offset.
    pub fn format(&self, epoch_secs: i64) -> String {
        match DateTime::from_timestamp(epoch_secs, 0) {
            Some(t) => t.with_timezone(&self.offset).to_rfc3339(),
            None => format!("@{epoch_secs}"),
        }
    }
}

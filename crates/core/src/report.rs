//! Final run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::id::RunId;

/// Outcome of one sweep run.
///
/// This is the job's only externally consumed result; it is emitted once at
/// the end of a successful run and is meant for log/metrics ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub table_name: String,
    pub retention_days: u32,

    /// Records with `reportTime` strictly below this (epoch ms) were eligible.
    pub cutoff_ms: i64,
    pub cutoff_date: String,

    /// Expiry assigned to the first batch (epoch seconds).
    pub base_ttl: i64,
    pub base_ttl_time: String,

    pub total_processed: u64,
    pub total_updated: u64,
    pub failed_items: u64,
    pub throttling_events: u64,
    pub batch_count: u64,
    pub pages_processed: u64,

    pub first_ttl: i64,
    pub last_ttl: i64,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub items_per_second: f64,

    /// Percentage of processed items that were updated; absent when nothing was processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,

    /// Width of the expiry window covered by this run.
    pub ttl_span_minutes: u64,
}

impl RunReport {
    /// Report as a flat `name → value` JSON object.
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(success_rate: Option<f64>) -> RunReport {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        RunReport {
            run_id: RunId::new(),
            table_name: "impressions".into(),
            retention_days: 60,
            cutoff_ms: 1_700_000_000_000,
            cutoff_date: "2023-11-14T22:13:20+00:00".into(),
            base_ttl: 1_715_104_800,
            base_ttl_time: "2024-05-08T13:00:00-05:00".into(),
            total_processed: 0,
            total_updated: 0,
            failed_items: 0,
            throttling_events: 0,
            batch_count: 0,
            pages_processed: 0,
            first_ttl: 1_715_104_800,
            last_ttl: 1_715_104_800,
            start_time: start,
            end_time: start,
            elapsed_seconds: 0.0,
            items_per_second: 0.0,
            success_rate,
            ttl_span_minutes: 0,
        }
    }

    #[test]
    fn success_rate_is_omitted_when_absent() {
        let json = report(None).to_json();
        assert!(json.get("success_rate").is_none());
        assert_eq!(json["table_name"], "impressions");

        let json = report(Some(100.0)).to_json();
        assert_eq!(json["success_rate"], 100.0);
    }
}

//! `stagger-core`: shared building blocks for the staggered TTL sweep.
//!
//! This crate contains the store-agnostic vocabulary: records, classified store
//! errors, time capabilities, observable events and the final run report.

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod record;
pub mod report;

pub use clock::{Clock, ManualClock, RecordingSleeper, Sleeper, SystemClock, ThreadSleeper};
pub use error::{StoreError, StoreResult, THROUGHPUT_EXCEEDED};
pub use event::{Advisory, BatchSummary, NoopObserver, RunState, SweepEvent, SweepObserver};
pub use id::RunId;
pub use record::{Record, REPORT_TIME_ATTR, TTL_ATTR};
pub use report::RunReport;

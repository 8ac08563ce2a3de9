//! Staggered TTL sweep job.
//!
//! ## Design
//!
//! - Eligible records (old enough, no `ttl` yet) are discovered with a filtered, paginated scan
//! - Records are rewritten in batches of at most 25, each batch 15 minutes later than the last
//! - Throttled store calls are retried with exponential backoff
//! - Per-item failures are counted, never fatal; scan failures abort the run
//! - Every step is reported to an injected observer
//!
//! ## Components
//!
//! - `ExpiryClock`: base expiry (one week out, 13:00 at a fixed offset)
//! - `Retrier`: runs a store call under a `RetryPolicy`
//! - `BatchExpiryAssigner`: stamps one batch with its expiry
//! - `ScanPager`: lazy iteration over scan pages
//! - `RunStatistics`: per-run accumulator producing the `RunReport`
//! - `SweepJob`: the run state machine and sole entry point

pub mod assigner;
pub mod config;
pub mod env;
pub mod error;
pub mod expiry;
pub mod pager;
pub mod retry;
pub mod stats;
pub mod sweep;

pub use assigner::{batch_expiry, split_into_batches, Batch, BatchExpiryAssigner, MAX_BATCH_SIZE};
pub use config::SweepConfig;
pub use env::SweepEnv;
pub use error::{RetryError, SweepError, SweepResult};
pub use expiry::ExpiryClock;
pub use pager::{eligibility_filter, Page, ScanPager};
pub use retry::{Retrier, RetryPolicy};
pub use stats::{RunMetadata, RunStatistics};
pub use sweep::{cutoff_ms, SweepJob};

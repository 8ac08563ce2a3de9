//! The sweep run: scan → batch → stamp → report.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use stagger_core::{Advisory, RunId, RunReport, RunState, SweepEvent};
use stagger_store::KvStore;

use crate::assigner::{split_into_batches, BatchExpiryAssigner};
use crate::config::SweepConfig;
use crate::env::SweepEnv;
use crate::error::{SweepError, SweepResult};
use crate::expiry::ExpiryClock;
use crate::pager::{eligibility_filter, ScanPager};
use crate::retry::Retrier;
use crate::stats::{RunMetadata, RunStatistics};

/// `reportTime` cutoff (epoch ms): records strictly older than this are eligible.
pub fn cutoff_ms(now: DateTime<Utc>, retention_days: u32) -> SweepResult<i64> {
    chrono::Duration::try_days(i64::from(retention_days))
        .and_then(|retention| now.checked_sub_signed(retention))
        .map(|cutoff| cutoff.timestamp_millis())
        .ok_or_else(|| {
            SweepError::clock(format!("retention of {retention_days} days reaches before the representable range"))
        })
}

/// Everything that lives for exactly one run.
struct RunContext {
    state: RunState,
    stats: RunStatistics,
    base_expiry: i64,
    next_batch_index: u64,
}

impl RunContext {
    fn transition(&mut self, to: RunState, env: &SweepEnv) {
        if self.state == to {
            return;
        }
        debug!(from = ?self.state, to = ?to, "sweep state transition");
        env.observe(&SweepEvent::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
    }
}

/// One table's staggered TTL sweep.
///
/// Single-threaded and single-pass: pages are scanned and batches written
/// strictly in order, so batch indices (and therefore expiries) grow
/// monotonically across the whole run.
pub struct SweepJob<S> {
    store: S,
    config: SweepConfig,
    expiry_clock: ExpiryClock,
    env: SweepEnv,
}

impl<S> SweepJob<S>
where
    S: KvStore,
{
    pub fn new(store: S, config: SweepConfig) -> SweepResult<Self> {
        config.validate()?;
        let expiry_clock = config.expiry_clock()?;
        Ok(Self {
            store,
            config,
            expiry_clock,
            env: SweepEnv::system(),
        })
    }

    pub fn with_env(mut self, env: SweepEnv) -> Self {
        self.env = env;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one full pass over the table.
    ///
    /// Returns the finalized report, or the first unrecoverable error. A failed
    /// run produces no report.
    pub fn run(&self) -> SweepResult<RunReport> {
        let retrier = Retrier::new(self.config.retry.clone(), self.env.clone());
        let mut ctx = self.init()?;

        match self.drive(&mut ctx, &retrier) {
            Ok(report) => Ok(report),
            Err(err) => {
                ctx.transition(RunState::Failed, &self.env);
                self.env.observe(&SweepEvent::RunFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn init(&self) -> SweepResult<RunContext> {
        let now = self.env.now();
        let (cutoff, base_expiry) = match self.anchors(now) {
            Ok(anchors) => anchors,
            Err(err) => {
                self.env.observe(&SweepEvent::StateChanged {
                    from: RunState::Init,
                    to: RunState::Failed,
                });
                self.env.observe(&SweepEvent::RunFailed {
                    error: err.to_string(),
                });
                return Err(err);
            }
        };
        let cutoff_date = DateTime::from_timestamp_millis(cutoff)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let metadata = RunMetadata {
            run_id: RunId::new(),
            table_name: self.config.table_name.clone(),
            retention_days: self.config.retention_days,
            cutoff_ms: cutoff,
            cutoff_date,
            base_ttl: base_expiry,
            base_ttl_time: self.expiry_clock.format(base_expiry),
            increment_secs: self.config.increment_secs(),
        };

        self.env.observe(&SweepEvent::RunStarted {
            run_id: metadata.run_id,
            table_name: metadata.table_name.clone(),
            retention_days: metadata.retention_days,
            cutoff_ms: metadata.cutoff_ms,
            cutoff_date: metadata.cutoff_date.clone(),
            base_expiry,
            base_expiry_time: metadata.base_ttl_time.clone(),
        });

        Ok(RunContext {
            state: RunState::Init,
            stats: RunStatistics::new(metadata, now),
            base_expiry,
            next_batch_index: 0,
        })
    }

    /// Eligibility cutoff (epoch ms) and base expiry (epoch seconds) for a run starting at `now`.
    fn anchors(&self, now: DateTime<Utc>) -> SweepResult<(i64, i64)> {
        let cutoff = cutoff_ms(now, self.config.retention_days)?;
        let base_expiry = self.expiry_clock.compute_base_expiry(now)?;
        Ok((cutoff, base_expiry))
    }

    fn drive(&self, ctx: &mut RunContext, retrier: &Retrier) -> SweepResult<RunReport> {
        let filter = eligibility_filter(
            &self.config.report_time_attribute,
            &self.config.ttl_attribute,
            ctx.stats.metadata.cutoff_ms,
        );
        let pager = ScanPager::new(&self.store, retrier, filter, self.config.scan_page_limit);
        let assigner = BatchExpiryAssigner::new(
            &self.store,
            retrier,
            &self.env,
            self.expiry_clock,
            &self.config.ttl_attribute,
            self.config.increment_secs(),
        );

        ctx.transition(RunState::Scanning, &self.env);
        for page in pager {
            let page = page?;
            ctx.stats.record_page();

            let batches = split_into_batches(page.items, self.config.batch_size);
            self.env.observe(&SweepEvent::PageScanned {
                page: page.number,
                items: batches.iter().map(|b| b.len()).sum(),
                batches: batches.len(),
                has_more: page.has_more,
            });

            ctx.transition(RunState::BatchProcessing, &self.env);
            for batch in &batches {
                let updated = assigner.apply(batch, ctx.base_expiry, ctx.next_batch_index);
                ctx.next_batch_index += 1;
                ctx.stats.record(batch.len(), updated);

                self.env.observe(&SweepEvent::Progress {
                    processed: ctx.stats.total_processed,
                    updated: ctx.stats.total_updated,
                    items_per_second: ctx.stats.items_per_second_at(self.env.now()),
                });
            }

            ctx.transition(RunState::Scanning, &self.env);
        }

        self.env.observe(&SweepEvent::ScanCompleted {
            pages: ctx.stats.pages_processed,
        });
        ctx.transition(RunState::Draining, &self.env);

        ctx.stats.record_throttling(retrier.throttling_events());
        let report = ctx.stats.finalize(self.env.now());
        self.env.observe(&SweepEvent::RunCompleted(report.clone()));
        self.advise(&report);

        ctx.transition(RunState::Done, &self.env);
        Ok(report)
    }

    fn advise(&self, report: &RunReport) {
        if report.failed_items > 0 {
            self.env.observe(&SweepEvent::Advisory(Advisory::FailedItems {
                count: report.failed_items,
            }));
        }
        // An empty run has nothing to be slow at.
        if report.total_processed > 0
            && report.items_per_second < self.config.low_throughput_threshold
        {
            self.env.observe(&SweepEvent::Advisory(Advisory::LowThroughput {
                items_per_second: report.items_per_second,
                threshold: self.config.low_throughput_threshold,
            }));
        }
    }
}

//! Injected capabilities shared by the sweep components.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use stagger_core::{Clock, Sleeper, SweepEvent, SweepObserver, SystemClock, ThreadSleeper};
use stagger_observability::TracingObserver;

/// Clock, sleeper and observer handed to every component of a run.
#[derive(Clone)]
pub struct SweepEnv {
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
    pub observer: Arc<dyn SweepObserver>,
}

impl SweepEnv {
    pub fn new(
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        observer: Arc<dyn SweepObserver>,
    ) -> Self {
        Self {
            clock,
            sleeper,
            observer,
        }
    }

    /// Wall clock, real sleeps, events forwarded to `tracing`.
    pub fn system() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(ThreadSleeper),
            Arc::new(TracingObserver),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SweepObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn observe(&self, event: &SweepEvent) {
        self.observer.observe(event);
    }
}

impl Default for SweepEnv {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for SweepEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepEnv").finish_non_exhaustive()
    }
}

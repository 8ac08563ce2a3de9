//! Throttling-aware retry policy.

use std::cell::Cell;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stagger_core::{StoreResult, SweepEvent};

use crate::env::SweepEnv;
use crate::error::RetryError;

/// Retry policy for throttled store calls.
///
/// The delay after the n-th (0-indexed) throttled attempt is
/// `base_delay * 2^n`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Delay after the first throttled attempt.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (0-indexed) attempt was throttled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after the given (0-indexed) attempt failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }
}

/// Runs store calls under a [`RetryPolicy`].
///
/// Only rate-limited failures are retried; any other failure is returned
/// immediately. Every throttled response is counted, whether or not the call
/// eventually succeeds. Owned by a single run on a single thread.
pub struct Retrier {
    policy: RetryPolicy,
    env: SweepEnv,
    throttling_events: Cell<u64>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, env: SweepEnv) -> Self {
        Self {
            policy,
            env,
            throttling_events: Cell::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Rate-limited responses seen so far.
    pub fn throttling_events(&self) -> u64 {
        self.throttling_events.get()
    }

    pub fn execute<T, F>(&self, operation: &str, mut call: F) -> Result<T, RetryError>
    where
        F: FnMut() -> StoreResult<T>,
    {
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => {
                    if attempt > 0 {
                        self.env.observe(&SweepEvent::Recovered {
                            operation: operation.to_string(),
                            attempts: attempt + 1,
                        });
                    }
                    return Ok(value);
                }
                Err(err) if err.is_rate_limited() => {
                    self.throttling_events.set(self.throttling_events.get() + 1);

                    if !self.policy.should_retry(attempt) {
                        self.env.observe(&SweepEvent::RetryExhausted {
                            operation: operation.to_string(),
                            attempts: attempt + 1,
                            error: err.to_string(),
                        });
                        return Err(RetryError::Exhausted {
                            operation: operation.to_string(),
                            attempts: attempt + 1,
                            source: err,
                        });
                    }

                    let delay = self.policy.delay_for_attempt(attempt);
                    self.env.observe(&SweepEvent::Throttled {
                        operation: operation.to_string(),
                        attempt: attempt + 1,
                        max_attempts: self.policy.max_attempts,
                        backoff_ms: delay.as_millis() as u64,
                    });
                    self.env.sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    self.env.observe(&SweepEvent::OperationFailed {
                        operation: operation.to_string(),
                        error: err.to_string(),
                    });
                    return Err(RetryError::Fatal {
                        operation: operation.to_string(),
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;

    use stagger_core::{RecordingSleeper, StoreError};
    use stagger_observability::RecordingObserver;

    struct Harness {
        sleeper: Arc<RecordingSleeper>,
        observer: Arc<RecordingObserver>,
        retrier: Retrier,
    }

    fn harness(policy: RetryPolicy) -> Harness {
        let sleeper = Arc::new(RecordingSleeper::new());
        let observer = Arc::new(RecordingObserver::new());
        let env = SweepEnv::system()
            .with_sleeper(sleeper.clone())
            .with_observer(observer.clone());
        Harness {
            sleeper,
            observer,
            retrier: Retrier::new(policy, env),
        }
    }

    /// Fails with the scripted errors, then succeeds.
    fn scripted(errors: Vec<StoreError>) -> impl FnMut() -> StoreResult<&'static str> {
        let mut errors = errors.into_iter();
        move || match errors.next() {
            Some(err) => Err(err),
            None => Ok("done"),
        }
    }

    #[test]
    fn default_policy_delays_are_100_200_400_ms() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 40,
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(1));
    }

    #[test]
    fn policy_rejects_unknown_backoff_settings() {
        let parsed: Result<RetryPolicy, _> =
            serde_json::from_value(serde_json::json!({"max_attempts": 5, "strategy": "linear"}));
        assert!(parsed.is_err());

        let policy: RetryPolicy =
            serde_json::from_value(serde_json::json!({"max_attempts": 5})).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));

        let single = RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        };
        assert!(!single.should_retry(0));
    }

    #[test]
    fn recovers_after_two_throttled_attempts() {
        let h = harness(RetryPolicy::default());
        let result = h.retrier.execute(
            "put_item",
            scripted(vec![
                StoreError::rate_limited("1"),
                StoreError::rate_limited("2"),
            ]),
        );

        assert_eq!(result, Ok("done"));
        assert_eq!(
            h.sleeper.slept(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert_eq!(h.sleeper.total(), Duration::from_millis(300));
        assert_eq!(h.retrier.throttling_events(), 2);
        assert!(h.observer.events().contains(&SweepEvent::Recovered {
            operation: "put_item".into(),
            attempts: 3,
        }));
    }

    #[test]
    fn exhausts_after_three_throttled_attempts() {
        let h = harness(RetryPolicy::default());
        let err = h
            .retrier
            .execute("put_item", scripted(vec![StoreError::rate_limited("x"); 3]))
            .unwrap_err();

        assert!(err.is_exhausted());
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(h.sleeper.slept().len(), 2);
        assert_eq!(h.retrier.throttling_events(), 3);
        assert_eq!(
            h.observer
                .matching(|e| matches!(e, SweepEvent::Throttled { .. }))
                .len(),
            2
        );
        assert_eq!(
            h.observer
                .matching(|e| matches!(e, SweepEvent::RetryExhausted { attempts: 3, .. }))
                .len(),
            1
        );
    }

    #[test]
    fn other_errors_are_not_retried() {
        let h = harness(RetryPolicy::default());
        let calls = Cell::new(0);
        let err = h
            .retrier
            .execute("scan", || {
                calls.set(calls.get() + 1);
                Err::<(), _>(StoreError::rejected("AccessDeniedException", "no"))
            })
            .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert!(matches!(err, RetryError::Fatal { .. }));
        assert_eq!(err.store_error().code(), "AccessDeniedException");
        assert!(h.sleeper.slept().is_empty());
        assert_eq!(h.retrier.throttling_events(), 0);
    }

    #[test]
    fn first_try_success_emits_nothing() {
        let h = harness(RetryPolicy::default());
        assert_eq!(h.retrier.execute("scan", scripted(vec![])), Ok("done"));
        assert!(h.observer.is_empty());
    }
}

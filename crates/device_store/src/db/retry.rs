//! Bounded retry with linear backoff.
//!
//! # Responsibility
//! - Run a fallible operation until it succeeds or the attempt budget is spent.
//! - Keep waiting behind a [`Sleeper`] so the schedule is testable without a
//!   real clock.
//!
//! # Invariants
//! - At least one attempt is always made.
//! - The delay after attempt `n` is `n * backoff_unit`; no delay follows the
//!   final attempt.

use serde::Deserialize;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 20;
const DEFAULT_BACKOFF_UNIT_MS: u64 = 1_000;

/// Blocks the current thread between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Attempt ceiling and backoff unit for bootstrap-style operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit_ms: DEFAULT_BACKOFF_UNIT_MS,
        }
    }
}

/// Returned when every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts,
            backoff_unit_ms: u64::try_from(backoff_unit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Effective attempt ceiling; a zero budget still runs once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay slept after the given 1-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_unit_ms.saturating_mul(u64::from(attempt)))
    }

    /// Runs `operation` until it succeeds or the budget is exhausted.
    ///
    /// `operation` receives the 1-based attempt number. `on_failure` is called
    /// once per failed attempt, before any sleep.
    pub fn run<T, E, F, N>(
        &self,
        sleeper: &dyn Sleeper,
        mut operation: F,
        mut on_failure: N,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        N: FnMut(u32, &E),
    {
        let max_attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_failure(attempt, &err);
                    if attempt >= max_attempts {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                    sleeper.sleep(self.delay_for(attempt));
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RetryPolicy, Sleeper};
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    #[test]
    fn default_policy_matches_bootstrap_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 20);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    }

    #[test]
    fn returns_first_success_without_sleeping() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(5, Duration::from_millis(10));

        let result: Result<u32, _> = policy.run(&sleeper, |attempt| Ok::<_, ()>(attempt), |_, _| {});

        assert_eq!(result.unwrap(), 1);
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[test]
    fn retries_with_linear_backoff_until_success() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let mut failures = Vec::new();

        let result = policy.run(
            &sleeper,
            |attempt| if attempt < 3 { Err("down") } else { Ok(attempt) },
            |attempt, _| failures.push(attempt),
        );

        assert_eq!(result.unwrap(), 3);
        assert_eq!(failures, vec![1, 2]);
        assert_eq!(
            *sleeper.slept.borrow(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn exhaustion_reports_attempts_and_last_error() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(4, Duration::from_millis(1));

        let exhausted = policy
            .run(&sleeper, |attempt| Err::<(), _>(attempt), |_, _| {})
            .unwrap_err();

        assert_eq!(exhausted.attempts, 4);
        assert_eq!(exhausted.last_error, 4);
        assert_eq!(sleeper.slept.borrow().len(), 3);
    }

    #[test]
    fn zero_budget_still_attempts_once() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let mut calls = 0;

        let exhausted = policy
            .run(
                &sleeper,
                |_| {
                    calls += 1;
                    Err::<(), _>("down")
                },
                |_, _| {},
            )
            .unwrap_err();

        assert_eq!(calls, 1);
        assert_eq!(exhausted.attempts, 1);
    }
}

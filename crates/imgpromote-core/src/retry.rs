//! Bounded retry with a fixed delay and a per-attempt timeout.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ExecError, PromotionStep};

/// Retry settings shared by every step of every promotion in a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per step, including the first. Never below 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts (milliseconds).
    pub delay_ms: u64,
    /// Wall-clock limit for one attempt (milliseconds). `None` waits forever.
    pub step_timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 5_000,
            step_timeout_ms: Some(300_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_ms: saturating_millis(delay),
            step_timeout_ms: None,
        }
    }

    /// Set the per-attempt timeout. A zero duration disables it.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = match saturating_millis(timeout) {
            0 => None,
            ms => Some(ms),
        };
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause between two attempts of a step.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}

/// Milliseconds in `duration`, capped at `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A step that succeeded, with the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// A step that ran out of attempts or hit a non-transient error.
#[derive(Debug)]
pub struct StepFailure {
    pub step: PromotionStep,
    pub attempts: u32,
    pub error: ExecError,
}

/// Run `op` until it succeeds, the error is not transient, or the policy's
/// attempts are spent.
///
/// `op` receives the 1-based attempt number. `on_failure` sees every failed
/// attempt before the delay, which is where callers log retries. There is no
/// pause after the final attempt.
pub async fn retry_step<T, F, Fut, N>(
    policy: &RetryPolicy,
    step: PromotionStep,
    mut op: F,
    mut on_failure: N,
) -> Result<Attempted<T>, StepFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExecError>>,
    N: FnMut(u32, &ExecError, bool),
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        let outcome = match policy.step_timeout() {
            Some(limit) => match tokio::time::timeout(limit, op(attempt)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ExecError::TimedOut {
                    op: step.as_str(),
                    timeout_ms: saturating_millis(limit),
                }),
            },
            None => op(attempt).await,
        };

        match outcome {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt,
                })
            }
            Err(error) => {
                let will_retry = attempt < max_attempts && error.is_transient();
                on_failure(attempt, &error, will_retry);
                if !will_retry {
                    return Err(StepFailure {
                        step,
                        attempts: attempt,
                        error,
                    });
                }
                tokio::time::sleep(policy.delay()).await;
                attempt += 1;
            }
        }
    }
}

//! Budget-aware bounded retry for single remote calls.
//!
//! [`Retrier::invoke`] wraps one remote call with a fixed-budget retry
//! policy: before each attempt it waits, without blocking the runtime, until
//! the [`BudgetGate`] reports remaining allowance for the operation kind;
//! then it executes the call, retrying on failure up to a fixed attempt
//! count. There is deliberately no exponential backoff — the dominant
//! failure mode is budget exhaustion, which the pre-attempt wait already
//! absorbs, not server-side overload.
//!
//! The attempt counter is local to one `invoke` call; no backoff state is
//! shared across calls.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::budget::{BudgetGate, OpKind, UnlimitedBudget};
use crate::error::RemoteError;
use crate::store::RemoteResult;

/// Default number of attempts per invocation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default interval between budget re-checks while throttled.
pub const DEFAULT_BUDGET_POLL: Duration = Duration::from_millis(50);

/// A remote operation failed on every attempt within the retry budget.
///
/// Fatal to the calling operation; the cache state is left as it was before
/// the failed operation.
#[derive(Debug, Error)]
#[error("operation `{label}` exhausted retries after {attempts} attempts")]
pub struct RetryExhausted {
    /// Label identifying the failed operation.
    pub label: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    #[source]
    pub last: RemoteError,
}

/// Wraps single remote calls with bounded retry and budget-aware pacing.
#[derive(Clone)]
pub struct Retrier {
    budget: Arc<dyn BudgetGate>,
    max_attempts: u32,
    pause: Option<Duration>,
    poll: Duration,
}

impl Default for Retrier {
    fn default() -> Self {
        Retrier::new(Arc::new(UnlimitedBudget))
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("max_attempts", &self.max_attempts)
            .field("pause", &self.pause)
            .field("poll", &self.poll)
            .finish()
    }
}

impl Retrier {
    /// Creates a retrier with the default attempt count and no inter-attempt
    /// pause, gated by `budget`.
    pub fn new(budget: Arc<dyn BudgetGate>) -> Self {
        Retrier {
            budget,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pause: None,
            poll: DEFAULT_BUDGET_POLL,
        }
    }

    /// Sets the maximum attempt count (minimum 1).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Inserts a fixed delay between attempts.
    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = Some(pause);
        self
    }

    /// Sets the budget re-check interval used while throttled.
    pub fn budget_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Suspends until the budget reports remaining allowance for `kind`.
    ///
    /// Cooperative: yields to the runtime between checks, never blocks a
    /// worker thread.
    async fn wait_for_budget(&self, kind: OpKind, label: &str) {
        let mut throttled = false;
        while self.budget.remaining(kind) == 0 {
            if !throttled {
                tracing::debug!(label, ?kind, "budget exhausted, waiting");
                throttled = true;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    /// Invokes `op`, retrying on failure.
    ///
    /// Returns the first successful result, or [`RetryExhausted`] after the
    /// final failed attempt. Transient failures in between are logged as
    /// warnings tagged with `label` and otherwise invisible to the caller.
    pub async fn invoke<T, F, Fut>(
        &self,
        kind: OpKind,
        label: &str,
        op: F,
    ) -> Result<T, RetryExhausted>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.wait_for_budget(kind, label).await;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!(label, attempt, max = self.max_attempts, %error, "remote call failed");
                    if attempt >= self.max_attempts {
                        return Err(RetryExhausted {
                            label: label.to_owned(),
                            attempts: attempt,
                            last: error,
                        });
                    }
                    if let Some(pause) = self.pause {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        }
    }
}

//! Retry policies with exponential backoff.
//!
//! Command execution races other writers for the tail of a stream, and a
//! lost race is transient: reloading and re-running the handler usually
//! succeeds. [`retry_with_predicate`] re-runs an async operation while a
//! predicate classifies its error as retryable, sleeping between attempts
//! with exponential backoff and jitter so concurrent losers do not retry
//! in lockstep.
//!
//! # Example
//!
//! ```rust
//! use moneyrail_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(10))
//!     .build();
//!
//! let value = retry_with_predicate(
//!     &policy,
//!     || async { Ok::<_, String>(42) },
//!     |error| error.contains("timeout"),
//! )
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Exponential backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Starts building a policy from the defaults.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Deterministic backoff delay for a zero-based attempt number.
    ///
    /// Attempt 0 sleeps `initial_delay`; each further attempt multiplies
    /// by `multiplier`, capped at `max_delay`. Jitter is applied by the
    /// retry loop, not here.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }
        let factor = self.multiplier.powi(attempt.min(1_000) as i32);
        let delay_ms = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyBuilder {
    max_retries: usize,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl RetryPolicyBuilder {
    /// Sets the maximum number of retries after the initial attempt.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Sets the upper bound on any single delay.
    #[must_use]
    pub const fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub const fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
        }
    }
}

/// Retries `operation` while `predicate` classifies its error as retryable.
///
/// The operation runs at most `max_retries + 1` times. Errors rejected by
/// the predicate are returned immediately without sleeping. Each backoff
/// delay is scaled by a random factor in `0.5..=1.0`.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    predicate: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !predicate(&error) {
                    debug!(?error, "Error is not retryable, failing immediately");
                    return Err(error);
                }
                if attempt >= policy.max_retries {
                    warn!(
                        ?error,
                        attempts = attempt + 1,
                        "Operation failed after max retries"
                    );
                    return Err(error);
                }
                let delay = policy
                    .delay_for_attempt(attempt)
                    .mul_f64(rand::thread_rng().gen_range(0.5..=1.0));
                debug!(
                    ?error,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Operation failed, retrying..."
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

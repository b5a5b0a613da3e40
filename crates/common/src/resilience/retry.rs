//! Bounded retry with backoff
//!
//! [`RetryExecutor`] runs one logical operation up to `max_attempts` times,
//! sleeping between attempts according to a [`BackoffStrategy`] and an
//! optional [`Jitter`]. A [`RetryPolicy`] decides, per error, whether another
//! attempt is worthwhile. Attempts are strictly sequential.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};

/// Errors that can occur during retry operations
///
/// Both variants carry the last error observed so callers keep the original
/// classification.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error after {attempts} tries: {source}")]
    NonRetryable { attempts: u32, source: E },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::NonRetryable { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Unwrap the last error observed
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::NonRetryable { source, .. } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Classified outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    TerminalFailure,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => write!(f, "success"),
            AttemptOutcome::RetryableFailure => write!(f, "retryable-failure"),
            AttemptOutcome::TerminalFailure => write!(f, "terminal-failure"),
        }
    }
}

/// One try of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt index
    pub index: u32,
    /// Delay slept before this attempt (zero for the first)
    pub delay: Duration,
    pub outcome: AttemptOutcome,
}

/// Outcome of a retry execution including the per-attempt history.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    pub history: Vec<AttemptRecord>,
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }

    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        u32::try_from(self.history.len()).unwrap_or(u32::MAX)
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide whether `error`, raised by attempt `attempt` (1-based), is
    /// worth another try.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Linear backoff: `initial_delay + increment * (k - 1)`
    Linear { initial_delay: Duration, increment: Duration },
    /// Exponential backoff: `initial_delay * base^(k - 1)`, capped
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Delay before retry `retry` (1-based: the first retry is `1`)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let step = retry.saturating_sub(1);
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Linear { initial_delay, increment } => {
                initial_delay.saturating_add(increment.saturating_mul(step))
            }
            BackoffStrategy::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(step).unwrap_or(i32::MAX);
                let secs = initial_delay.as_secs_f64() * base.powi(exponent);
                if !secs.is_finite() || secs >= max_delay.as_secs_f64() {
                    *max_delay
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }

    /// Upper bound on any delay this strategy produces, if it has one
    pub fn max_delay(&self) -> Option<Duration> {
        match self {
            BackoffStrategy::Exponential { max_delay, .. } => Some(*max_delay),
            _ => None,
        }
    }
}

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter
    #[default]
    None,
    /// Full jitter: 0 to calculated_delay
    Full,
    /// Equal jitter: calculated_delay/2 to calculated_delay
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(self, delay: Duration) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rand::thread_rng().gen_range(0..=millis)),
            Jitter::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rand::thread_rng().gen_range(0..=millis - half))
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, the initial try included
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter type for randomizing delays
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_secs(1),
                base: 2.0,
                max_delay: Duration::from_secs(30),
            },
            jitter: Jitter::None,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        match &self.backoff {
            BackoffStrategy::Exponential { base, .. } if *base <= 0.0 => {
                return Err(ConfigError::Invalid {
                    message: "exponential base must be greater than 0".to_string(),
                });
            }
            _ => {}
        }

        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// One initial try plus `retries` retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_attempts = retries.saturating_add(1);
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn linear_backoff(mut self, initial_delay: Duration, increment: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Linear { initial_delay, increment };
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return the attempt history.
    ///
    /// The operation receives the 1-based attempt index.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut history = Vec::with_capacity(self.config.max_attempts as usize);
        let mut total_delay = Duration::ZERO;
        let mut delay = Duration::ZERO;
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts = self.config.max_attempts, "Executing operation");

            let error = match operation(attempt).await {
                Ok(value) => {
                    history.push(AttemptRecord { index: attempt, delay, outcome: AttemptOutcome::Success });
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retries");
                    }
                    return RetryOutcome { result: Ok(value), history, total_delay };
                }
                Err(error) => error,
            };

            let decision = self.policy.should_retry(&error, attempt);
            if decision == RetryDecision::Stop {
                history.push(AttemptRecord {
                    index: attempt,
                    delay,
                    outcome: AttemptOutcome::TerminalFailure,
                });
                debug!(attempt, error = %error, "Retry policy determined not to retry");
                return RetryOutcome {
                    result: Err(RetryError::NonRetryable { attempts: attempt, source: error }),
                    history,
                    total_delay,
                };
            }

            history.push(AttemptRecord {
                index: attempt,
                delay,
                outcome: AttemptOutcome::RetryableFailure,
            });

            if attempt >= self.config.max_attempts {
                warn!(attempts = attempt, error = %error, "All retry attempts exhausted");
                return RetryOutcome {
                    result: Err(RetryError::Exhausted { attempts: attempt, last_error: error }),
                    history,
                    total_delay,
                };
            }

            delay = match decision {
                RetryDecision::RetryAfter(custom) => custom,
                _ => self.config.jitter.apply(self.config.backoff.calculate_delay(attempt)),
            };

            warn!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
            total_delay += delay;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry strategies and policies
    //!
    //! Tests cover backoff calculation, jitter bounds, attempt limits, and
    //! the history recorded for each attempt.

    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retries only the `"transient"` error
    struct TransientOnly;

    impl RetryPolicy<&str> for TransientOnly {
        fn should_retry(&self, error: &&str, _attempt: u32) -> RetryDecision {
            if *error == "transient" {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .fixed_backoff(Duration::from_millis(1))
            .build()
            .expect("valid config")
    }

    /// Validates exponential backoff doubles from the base for each retry.
    ///
    /// Assertions:
    /// - Confirms delays of 1s, 2s and 4s for retries 1, 2 and 3.
    /// - Confirms the cap applies to large retry indices.
    #[test]
    fn test_backoff_exponential_doubles() {
        let strategy = BackoffStrategy::Exponential {
            initial_delay: Duration::from_secs(1),
            base: 2.0,
            max_delay: Duration::from_secs(30),
        };

        assert_eq!(strategy.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(strategy.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(strategy.calculate_delay(3), Duration::from_secs(4));
        assert_eq!(strategy.calculate_delay(40), Duration::from_secs(30));
        assert_eq!(strategy.max_delay(), Some(Duration::from_secs(30)));
    }

    /// Validates fixed and linear strategies.
    #[test]
    fn test_backoff_fixed_and_linear() {
        let fixed = BackoffStrategy::Fixed(Duration::from_millis(100));
        assert_eq!(fixed.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(fixed.calculate_delay(7), Duration::from_millis(100));

        let linear = BackoffStrategy::Linear {
            initial_delay: Duration::from_millis(100),
            increment: Duration::from_millis(50),
        };
        assert_eq!(linear.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(linear.calculate_delay(3), Duration::from_millis(200));
    }

    /// Validates jitter stays within its documented bounds.
    #[test]
    fn test_jitter_bounds() {
        let delay = Duration::from_millis(1000);
        assert_eq!(Jitter::None.apply(delay), delay);

        for _ in 0..100 {
            assert!(Jitter::Full.apply(delay) <= delay);
            let equal = Jitter::Equal.apply(delay);
            assert!(equal >= Duration::from_millis(500) && equal <= delay);
        }
    }

    /// Validates configuration validation.
    #[test]
    fn test_config_validation() {
        assert!(RetryConfig::builder().max_attempts(0).build().is_err());
        assert!(RetryConfig::builder()
            .exponential_backoff(Duration::from_secs(1), 0.0, Duration::from_secs(1))
            .build()
            .is_err());

        let config = RetryConfig::builder().max_retries(3).build().expect("valid");
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config, RetryConfig::default());
    }

    /// Validates the executor stops after `max_attempts` and returns the last
    /// error.
    ///
    /// Assertions:
    /// - Confirms the operation ran exactly four times.
    /// - Confirms the error is `Exhausted` with the fourth error.
    #[tokio::test]
    async fn test_executor_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_config(4), AlwaysRetry);

        let outcome = executor
            .execute_with_outcome(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(format!("failure {attempt}")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.attempts(), 4);
        assert!(outcome
            .history
            .iter()
            .all(|record| record.outcome == AttemptOutcome::RetryableFailure));
        match outcome.result {
            Err(RetryError::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, "failure 4");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    /// Validates a stop decision ends the loop after one attempt.
    #[tokio::test]
    async fn test_executor_stops_on_non_retryable() {
        let executor = RetryExecutor::new(fast_config(4), NeverRetry);

        let outcome =
            executor.execute_with_outcome(|_| async { Err::<(), _>("bad request") }).await;

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.history[0].outcome, AttemptOutcome::TerminalFailure);
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.into_inner(), "bad request");
    }

    /// Validates recovery after transient failures and the recorded delays.
    #[tokio::test]
    async fn test_executor_recovers_and_records_delays() {
        let executor = RetryExecutor::new(fast_config(4), TransientOnly);

        let outcome = executor
            .execute_with_outcome(|attempt| async move {
                if attempt < 3 {
                    Err("transient")
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(outcome.history.len(), 3);
        assert_eq!(outcome.history[0].delay, Duration::ZERO);
        assert_eq!(outcome.history[1].delay, Duration::from_millis(1));
        assert_eq!(outcome.history[2].outcome, AttemptOutcome::Success);
        assert_eq!(outcome.total_delay, Duration::from_millis(2));
        assert_eq!(outcome.into_result().expect("success"), 3);
    }

    /// Validates that `RetryAfter` overrides the computed backoff.
    #[tokio::test(start_paused = true)]
    async fn test_executor_honours_retry_after() {
        struct After;
        impl RetryPolicy<&'static str> for After {
            fn should_retry(&self, _error: &&'static str, _attempt: u32) -> RetryDecision {
                RetryDecision::RetryAfter(Duration::from_secs(7))
            }
        }

        let executor = RetryExecutor::new(RetryConfig::default(), After);
        let outcome = executor
            .execute_with_outcome(|attempt| async move {
                if attempt == 1 {
                    Err("throttled")
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(outcome.history[1].delay, Duration::from_secs(7));
        assert!(outcome.result.is_ok());
    }
}

//! Integration tests for the resilience module
//!
//! Drives the breaker and retry executor together the way an outbound client
//! does: gate once, retry inside, report every attempt.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use zeda_common::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, MockClock, RetryConfig, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy,
};

/// Every failure is worth another attempt
struct RetryAll;

impl<E> RetryPolicy<E> for RetryAll {
    fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
        RetryDecision::Retry
    }
}

fn breaker(clock: &MockClock) -> CircuitBreaker<MockClock> {
    CircuitBreakerConfig::builder()
        .failure_threshold(5)
        .reset_timeout(Duration::from_secs(30))
        .build_with_clock(clock.clone())
        .expect("valid breaker config")
}

fn retry(max_retries: u32) -> RetryExecutor<RetryAll> {
    let config = RetryConfig::builder()
        .max_retries(max_retries)
        .fixed_backoff(Duration::from_millis(1))
        .build()
        .expect("valid retry config");
    RetryExecutor::new(config, RetryAll)
}

/// Validates that every retry attempt feeds the breaker.
///
/// # Test Steps
/// 1. Gate one logical call and run four failing attempts under the permit
/// 2. Gate a second call, which fails once more and trips the breaker
/// 3. Verify the third call is rejected without running the operation
#[tokio::test]
async fn test_retries_accelerate_breaker_opening() {
    let clock = MockClock::new();
    let breaker = breaker(&clock);
    let executor = retry(3);
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
        let permit = breaker.try_acquire().expect("closed breaker admits");
        let result = executor
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                permit.record_failure();
                async { Err::<(), _>("503") }
            })
            .await;
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 4, .. })));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 8);
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = breaker.try_acquire();
    assert!(rejected.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

/// Validates the full recovery cycle: trip, wait, probe, close.
#[tokio::test]
async fn test_probe_success_closes_breaker() {
    let clock = MockClock::new();
    let breaker = breaker(&clock);

    for _ in 0..5 {
        breaker.try_acquire().expect("closed").record_failure();
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(Duration::from_secs(30));
    {
        let probe = breaker.try_acquire().expect("probe admitted");
        assert!(probe.is_probe());
        assert!(breaker.try_acquire().is_err(), "second caller must wait for the probe");

        let result = retry(3).execute(|_| async { Ok::<_, &str>("200") }).await;
        assert!(result.is_ok());
        probe.record_success();
    }

    assert_eq!(breaker.state(), CircuitState::Closed);
    for _ in 0..3 {
        assert!(!breaker.try_acquire().expect("closed").is_probe());
    }
    assert_eq!(breaker.metrics().consecutive_failures, 0);
}

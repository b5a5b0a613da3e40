//! Resilience patterns for outbound calls
//!
//! - **Circuit Breaker**: count-and-timer breaker that fails fast while an
//!   upstream is known to be down and admits a single probe to test recovery
//! - **Retry Logic**: bounded retry with exponential backoff and optional
//!   jitter, driven by a per-error [`RetryPolicy`]
//!
//! Both are generic over the caller's error type and read time through
//! [`Clock`] so state transitions can be tested with [`MockClock`].

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitOpen, CircuitPermit, CircuitState, Clock, ConfigError, ConfigResult, MockClock,
    SystemClock,
};
pub use retry::{
    AttemptOutcome, AttemptRecord, BackoffStrategy, Jitter, RetryConfig,
    RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor, RetryOutcome, RetryPolicy,
    RetryResult,
};

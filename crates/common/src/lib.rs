//! Generic building blocks shared across the Zeda client crates.
//!
//! # Feature Tiers
//!
//! - `foundation`: error types and serde helpers
//! - `runtime`: async resilience primitives (circuit breaker, retry)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitOpen,
    CircuitPermit, CircuitState, Clock, Jitter, MockClock, RetryConfig, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, SystemClock,
};
#[cfg(feature = "foundation")]
pub use utils::serde::duration_millis;

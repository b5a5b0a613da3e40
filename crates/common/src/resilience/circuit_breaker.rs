//! Count-and-timer circuit breaker
//!
//! The breaker tracks consecutive failures for one upstream client. Once the
//! failure count reaches the threshold the circuit opens for a fixed reset
//! window; after the window elapses exactly one probe call is admitted
//! (half-open). A successful probe closes the circuit, a failed probe re-arms
//! the window.
//!
//! Admission and reporting are split: [`CircuitBreaker::try_acquire`] gates a
//! logical call once and hands back a [`CircuitPermit`], through which every
//! individual attempt of that call reports its outcome.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Circuit breakers and token caches read time through this trait so tests
/// can move time forward without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed counter, so a clone handed to a breaker can
/// be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Returned by [`CircuitBreaker::try_acquire`] when a call is not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit breaker is open (retry in {retry_in:?})")]
pub struct CircuitOpen {
    /// Time left until the next probe is admitted; zero while a probe is
    /// already in flight.
    pub retry_in: Duration,
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Reset window elapsed (or probe in flight); one request tests recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

//==============================================================================
// Configuration
//==============================================================================

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(30) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.reset_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "reset_timeout must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    /// Build a breaker with a custom clock (useful for testing)
    pub fn build_with_clock<C: Clock>(self, clock: C) -> ConfigResult<CircuitBreaker<C>> {
        CircuitBreaker::with_clock(self.config, clock)
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Calls admitted through the gate
    pub total_calls: u64,
    /// Calls rejected without running
    pub rejected_calls: u64,
    pub open_until: Option<Instant>,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    probe_in_flight: bool,
}

/// Count-and-timer circuit breaker shared by every call of one client
///
/// Cloning is cheap and clones share state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
    total_calls: Arc<AtomicU64>,
    rejected_calls: Arc<AtomicU64>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("consecutive_failures", &self.state.lock().consecutive_failures)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            total_calls: Arc::clone(&self.total_calls),
            rejected_calls: Arc::clone(&self.rejected_calls),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker using the builder pattern
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self {
            config: CircuitBreakerConfig::default(),
            state: Arc::new(Mutex::new(BreakerState::default())),
            total_calls: Arc::new(AtomicU64::new(0)),
            rejected_calls: Arc::new(AtomicU64::new(0)),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: Arc::new(Mutex::new(BreakerState::default())),
            total_calls: Arc::new(AtomicU64::new(0)),
            rejected_calls: Arc::new(AtomicU64::new(0)),
            clock: Arc::new(clock),
        })
    }

    /// The configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Gate one logical call.
    ///
    /// Closed circuits admit every caller. An open circuit whose reset window
    /// has elapsed admits exactly one probe, lowering the failure count to
    /// `threshold - 1` so a single failed attempt re-opens it. While the
    /// window is running, or while the probe is still in flight, callers are
    /// rejected.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_, C>, CircuitOpen> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if state.probe_in_flight {
            drop(state);
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
            debug!("Circuit breaker rejecting call - half-open probe in flight");
            return Err(CircuitOpen { retry_in: Duration::ZERO });
        }

        let mut probe = false;
        if state.consecutive_failures >= self.config.failure_threshold {
            match state.open_until {
                Some(open_until) if now < open_until => {
                    drop(state);
                    self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                    debug!("Circuit breaker rejecting call - state: OPEN");
                    return Err(CircuitOpen { retry_in: open_until - now });
                }
                _ => {
                    state.consecutive_failures = self.config.failure_threshold - 1;
                    state.probe_in_flight = true;
                    probe = true;
                    info!("Circuit breaker half-open, admitting probe call");
                }
            }
        }
        drop(state);

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        Ok(CircuitPermit { breaker: self, probe })
    }

    fn on_success(&self) {
        let mut state = self.state.lock();
        let was_tripped = state.open_until.is_some();
        state.consecutive_failures = 0;
        state.open_until = None;
        drop(state);

        if was_tripped {
            info!("Circuit breaker closed after successful call");
        }
    }

    fn on_failure(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let failures = state.consecutive_failures;

        if failures >= self.config.failure_threshold {
            let reopened = state.open_until.is_some();
            state.open_until = Some(now + self.config.reset_timeout);
            drop(state);

            if reopened {
                warn!(failures, "Circuit breaker re-armed open window");
            } else {
                warn!(failures, "Circuit breaker opened after consecutive failures");
            }
        }
    }

    fn release_probe(&self) {
        self.state.lock().probe_in_flight = false;
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now();
        let state = self.state.lock();

        if state.probe_in_flight {
            return CircuitState::HalfOpen;
        }
        if state.consecutive_failures < self.config.failure_threshold {
            return CircuitState::Closed;
        }
        match state.open_until {
            Some(open_until) if now < open_until => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Get a snapshot of the circuit breaker metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state_now = self.state();
        let state = self.state.lock();
        CircuitBreakerMetrics {
            state: state_now,
            consecutive_failures: state.consecutive_failures,
            total_calls: self.total_calls.load(Ordering::Acquire),
            rejected_calls: self.rejected_calls.load(Ordering::Acquire),
            open_until: state.open_until,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        *self.state.lock() = BreakerState::default();
        info!("Circuit breaker manually reset to closed state");
    }
}

/// Admission ticket for one logical call.
///
/// Each attempt made under the permit reports its outcome once. Dropping the
/// permit ends the call; for a half-open probe this frees the probe slot even
/// when the call was cancelled before reporting.
#[must_use = "outcomes must be reported through the permit"]
pub struct CircuitPermit<'a, C: Clock = SystemClock> {
    breaker: &'a CircuitBreaker<C>,
    probe: bool,
}

impl<C: Clock> CircuitPermit<'_, C> {
    /// Whether this call is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Report a successful attempt
    pub fn record_success(&self) {
        self.breaker.on_success();
    }

    /// Report a failed attempt
    pub fn record_failure(&self) {
        self.breaker.on_failure();
    }
}

impl<C: Clock> Drop for CircuitPermit<'_, C> {
    fn drop(&mut self) {
        if self.probe {
            self.breaker.release_probe();
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitPermit<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitPermit").field("probe", &self.probe).finish()
    }
}

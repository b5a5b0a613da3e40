//! Shared helpers for the infra integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use tokio::sync::Notify;
use zeda_common::{CircuitBreaker, MockClock, RetryConfig};
use zeda_domain::ApiError;
use zeda_infra::http::{HttpRequest, HttpResponse, HttpTransport, Transport};
use zeda_infra::RequestExecutor;

/// Counting transport that replays scripted outcomes.
///
/// When built with [`SpyTransport::gated`], every send waits for
/// [`SpyTransport::release`] after being counted.
#[derive(Default)]
pub struct SpyTransport {
    calls: AtomicUsize,
    script: Mutex<Vec<Result<u16, ApiError>>>,
    gate: Option<Notify>,
}

impl SpyTransport {
    pub fn new(script: Vec<Result<u16, ApiError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script), ..Self::default() })
    }

    pub fn gated(script: Vec<Result<u16, ApiError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script), gate: Some(Notify::new()), ..Self::default() })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl Transport for SpyTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = {
            let mut script = self.script.lock();
            if script.is_empty() {
                Ok(200)
            } else {
                script.remove(0)
            }
        };
        next.map(|status| HttpResponse { status, headers: HeaderMap::new(), body: b"{}".to_vec() })
    }
}

pub fn network_error() -> ApiError {
    ApiError::Network { path: "/x".into(), message: "connection reset by peer".into() }
}

/// Retry settings with millisecond backoff so exhaustion tests stay fast
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::builder()
        .max_retries(max_retries)
        .exponential_backoff(Duration::from_millis(5), 2.0, Duration::from_millis(20))
        .build()
        .expect("valid retry config")
}

/// Threshold 5, reset window 30s, driven by `clock`
pub fn breaker(clock: &MockClock) -> CircuitBreaker<MockClock> {
    CircuitBreaker::builder()
        .failure_threshold(5)
        .reset_timeout(Duration::from_secs(30))
        .build_with_clock(clock.clone())
        .expect("valid breaker config")
}

pub fn executor(
    transport: Arc<dyn Transport>,
    clock: &MockClock,
    max_retries: u32,
) -> RequestExecutor<MockClock> {
    executor_at("https://upstream.example", transport, clock, max_retries)
}

pub fn executor_at(
    base_url: &str,
    transport: Arc<dyn Transport>,
    clock: &MockClock,
    max_retries: u32,
) -> RequestExecutor<MockClock> {
    RequestExecutor::new("test", base_url, transport, breaker(clock), fast_retry(max_retries))
        .expect("valid executor")
}

/// Real HTTP transport with a short timeout, for wiremock tests
pub fn http_transport() -> Arc<dyn Transport> {
    Arc::new(
        HttpTransport::builder()
            .timeout(Duration::from_secs(2))
            .system_proxy(false)
            .build()
            .expect("transport builds"),
    )
}

pub fn token_body(access: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

pub fn refreshable_token_body(
    access: &str,
    expires_in: u64,
    refresh: &str,
    refresh_expires_in: u64,
) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "refresh_token": refresh,
        "refresh_expires_in": refresh_expires_in
    })
}

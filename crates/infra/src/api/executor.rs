//! Resilient request execution
//!
//! One logical call goes through, in order:
//! 1. the circuit breaker gate, checked once; an open breaker fails the call
//!    with [`ApiError::CircuitOpen`] before any I/O
//! 2. a bounded retry loop (1 + `max_retries` attempts, exponential backoff)
//! 3. per attempt: credential resolution, send, classification, and exactly
//!    one outcome report to the breaker
//!
//! Classification happens once, in the transport or from the response
//! status; the loop only decides whether to go again.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use tracing::{debug, info, warn};
use url::Url;
use zeda_common::resilience::{AttemptRecord, CircuitPermit, RetryError};
use zeda_common::{
    CircuitBreaker, CircuitBreakerConfig, Clock, Jitter, RetryConfig, RetryDecision,
    RetryExecutor, RetryPolicy, SystemClock,
};
use zeda_domain::{ApiError, ResilienceConfig};

use super::auth::AuthScheme;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// One try of a logical call: index, delay slept before it, outcome
pub type RequestAttempt = AttemptRecord;

/// Attempt history of one logical call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub attempts: Vec<RequestAttempt>,
    pub total_delay: Duration,
    /// Rejected by the breaker without any attempt
    pub short_circuited: bool,
}

impl ExecutionReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Upstream-relative request description, reusable across attempts
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Caller-supplied key that lets the upstream deduplicate this request.
    /// The key travels inside the request (usually the path); here it only
    /// marks the request as safe to repeat.
    pub idempotency_key: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// JSON request body.
    #[must_use]
    pub fn json_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Whether repeating the request after an ambiguous failure is safe.
    ///
    /// GET, HEAD, PUT and DELETE are idempotent by definition; POST and PATCH
    /// only with an idempotency key.
    pub fn is_idempotent(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS)
            || self.idempotency_key.is_some()
    }
}

/// Retry decision from the classified error.
///
/// Never repeats a non-idempotent request after a timeout or network
/// failure: the first attempt may have been processed. A half-open probe
/// gets a single attempt; its failure has already re-opened the breaker.
#[derive(Debug, Clone, Copy)]
struct ClassifiedRetry {
    idempotent: bool,
    probe: bool,
    max_delay: Option<Duration>,
}

impl RetryPolicy<ApiError> for ClassifiedRetry {
    fn should_retry(&self, error: &ApiError, attempt: u32) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Stop;
        }
        if self.probe {
            debug!(attempt, error = %error, "half-open probe failed, not retrying");
            return RetryDecision::Stop;
        }
        if error.is_transport_level() && !self.idempotent {
            warn!(attempt, error = %error, "not retrying non-idempotent request after transport failure");
            return RetryDecision::Stop;
        }
        match (error.retry_after(), self.max_delay) {
            (Some(hint), Some(max)) => RetryDecision::RetryAfter(hint.min(max)),
            (Some(hint), None) => RetryDecision::RetryAfter(hint),
            (None, _) => RetryDecision::Retry,
        }
    }
}

/// Breaker + retry + auth chain for one upstream
pub struct RequestExecutor<C: Clock = SystemClock> {
    upstream: String,
    base_url: String,
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker<C>,
    retry: RetryConfig,
}

impl RequestExecutor<SystemClock> {
    /// Build with breaker and retry settings from configuration.
    pub fn from_config(
        upstream: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: &ResilienceConfig,
    ) -> Result<Self, ApiError> {
        let breaker = CircuitBreaker::new(breaker_config(config)?)
            .map_err(|err| ApiError::config(format!("Failed to create circuit breaker: {err}")))?;
        Self::new(upstream, base_url, transport, breaker, retry_config(config)?)
    }
}

impl<C: Clock> RequestExecutor<C> {
    /// # Errors
    /// [`ApiError::Configuration`] when `base_url` is not an absolute URL.
    pub fn new(
        upstream: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        breaker: CircuitBreaker<C>,
        retry: RetryConfig,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|err| ApiError::config(format!("Invalid base URL {base_url:?}: {err}")))?;
        Ok(Self { upstream: upstream.into(), base_url, transport, breaker, retry })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Run one logical call and return the successful (2xx) response.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        auth: &AuthScheme,
    ) -> Result<HttpResponse, ApiError> {
        self.execute_with_report(spec, auth).await.0
    }

    /// Like [`execute`](Self::execute), also returning the attempt history.
    pub async fn execute_with_report(
        &self,
        spec: &RequestSpec,
        auth: &AuthScheme,
    ) -> (Result<HttpResponse, ApiError>, ExecutionReport) {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(open) => {
                let report = ExecutionReport { short_circuited: true, ..ExecutionReport::default() };
                let error =
                    ApiError::CircuitOpen { upstream: self.upstream.clone(), retry_in: open.retry_in };
                return (Err(error), report);
            }
        };
        if permit.is_probe() {
            info!(upstream = %self.upstream, path = %spec.path, "sending half-open probe");
        }

        let policy = ClassifiedRetry {
            idempotent: spec.is_idempotent(),
            probe: permit.is_probe(),
            max_delay: self.retry.backoff.max_delay(),
        };
        let retry = RetryExecutor::new(self.retry.clone(), policy);
        let permit = &permit;
        let outcome = retry
            .execute_with_outcome(|attempt| async move {
                self.attempt(permit, spec, auth, attempt).await
            })
            .await;

        let report = ExecutionReport {
            attempts: outcome.history,
            total_delay: outcome.total_delay,
            short_circuited: false,
        };
        (outcome.result.map_err(RetryError::into_inner), report)
    }

    async fn attempt(
        &self,
        permit: &CircuitPermit<'_, C>,
        spec: &RequestSpec,
        auth: &AuthScheme,
        attempt: u32,
    ) -> Result<HttpResponse, ApiError> {
        let result = self.send_authenticated(spec, auth).await;

        match &result {
            Ok(response) => {
                debug!(upstream = %self.upstream, path = %spec.path, attempt, status = response.status, "attempt succeeded");
                permit.record_success();
            }
            // Never reached the network
            Err(ApiError::Configuration(_)) => {}
            Err(err) if err.counts_as_upstream_failure() => {
                debug!(upstream = %self.upstream, path = %spec.path, attempt, status = ?err.equivalent_status(), "attempt failed");
                permit.record_failure();
            }
            // Credentials rejected before the upstream saw the request. A
            // probe must not close the breaker on that.
            Err(err @ ApiError::Auth { .. }) => {
                debug!(upstream = %self.upstream, path = %spec.path, attempt, probe = permit.is_probe(), error = %err, "attempt not authenticated");
                if permit.is_probe() {
                    permit.record_failure();
                }
            }
            Err(err) => {
                debug!(upstream = %self.upstream, path = %spec.path, attempt, status = ?err.status(), "attempt rejected by upstream");
                permit.record_success();
            }
        }
        result
    }

    /// One attempt. A 401 on an OAuth request drops the token and re-sends
    /// once with a freshly acquired one.
    async fn send_authenticated(
        &self,
        spec: &RequestSpec,
        auth: &AuthScheme,
    ) -> Result<HttpResponse, ApiError> {
        let AuthScheme::OAuth(provider) = auth else {
            let response = self.transport.send(self.build_request(spec, auth, None)?).await?;
            return classify(response, &spec.path);
        };

        let token = provider.access_token().await?;
        let response = self.transport.send(self.build_request(spec, auth, Some(&token))?).await?;
        if response.status != 401 {
            return classify(response, &spec.path);
        }

        warn!(upstream = %self.upstream, path = %spec.path, "401 with cached token, re-authenticating once");
        provider.reject(&token);
        let fresh = provider.access_token().await?;
        let response = self.transport.send(self.build_request(spec, auth, Some(&fresh))?).await?;
        classify(response, &spec.path)
    }

    fn build_request(
        &self,
        spec: &RequestSpec,
        auth: &AuthScheme,
        token: Option<&crate::auth::AccessToken>,
    ) -> Result<HttpRequest, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, spec.path))
            .map_err(|err| ApiError::config(format!("Invalid request path {:?}: {err}", spec.path)))?;
        if !spec.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&spec.query);
        }

        let mut request = HttpRequest::new(spec.method.clone(), url.as_str(), spec.path.clone())
            .header(ACCEPT.as_str(), "application/json")?;
        if let Some(body) = &spec.body {
            request = request.header(CONTENT_TYPE.as_str(), "application/json")?.body(body.clone());
        }
        for (name, value) in &spec.headers {
            request = request.header(name, value)?;
        }
        auth.apply(request, token)
    }
}

fn classify(response: HttpResponse, path: &str) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(response.into_error(path))
    }
}

impl<C: Clock> std::fmt::Debug for RequestExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("upstream", &self.upstream)
            .field("base_url", &self.base_url)
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Breaker settings from configuration
pub fn breaker_config(config: &ResilienceConfig) -> Result<CircuitBreakerConfig, ApiError> {
    CircuitBreakerConfig::builder()
        .failure_threshold(config.breaker_threshold)
        .reset_timeout(config.breaker_reset)
        .build()
        .map_err(|err| ApiError::config(format!("Invalid circuit breaker settings: {err}")))
}

/// Retry settings from configuration: `base * 2^(k-1)` capped at
/// `backoff_max`
pub fn retry_config(config: &ResilienceConfig) -> Result<RetryConfig, ApiError> {
    RetryConfig::builder()
        .max_retries(config.max_retries)
        .exponential_backoff(config.backoff_base, 2.0, config.backoff_max)
        .jitter(if config.jitter { Jitter::Full } else { Jitter::None })
        .build()
        .map_err(|err| ApiError::config(format!("Invalid retry settings: {err}")))
}

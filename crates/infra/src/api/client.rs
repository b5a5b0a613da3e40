//! Typed API client over the resilient executor
//!
//! Serializes request bodies, runs the call through [`RequestExecutor`] and
//! decodes the response. 204/205 responses decode from `null`, so unit and
//! `Option` response types work without a body.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;
use zeda_common::{CircuitBreaker, Clock, SystemClock};
use zeda_domain::ApiError;

use super::auth::AuthScheme;
use super::executor::{ExecutionReport, RequestExecutor, RequestSpec};
use crate::http::HttpResponse;

/// JSON API client for one upstream
pub struct ApiClient<C: Clock = SystemClock> {
    executor: RequestExecutor<C>,
}

impl<C: Clock> std::fmt::Debug for ApiClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("executor", &self.executor).finish()
    }
}

impl<C: Clock> ApiClient<C> {
    pub fn new(executor: RequestExecutor<C>) -> Self {
        Self { executor }
    }

    pub fn upstream(&self) -> &str {
        self.executor.upstream()
    }

    pub fn breaker(&self) -> &CircuitBreaker<C> {
        self.executor.breaker()
    }

    pub fn executor(&self) -> &RequestExecutor<C> {
        &self.executor
    }

    /// Execute and return the raw successful response.
    #[instrument(
        skip(self, spec, auth),
        fields(upstream = %self.executor.upstream(), method = %spec.method, path = %spec.path)
    )]
    pub async fn send(&self, spec: &RequestSpec, auth: &AuthScheme) -> Result<HttpResponse, ApiError> {
        let (result, report) = self.executor.execute_with_report(spec, auth).await;
        log_report(&report);
        result
    }

    /// Execute and decode a JSON response.
    pub async fn json<R: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
        auth: &AuthScheme,
    ) -> Result<R, ApiError> {
        self.send(spec, auth).await?.json(&spec.path)
    }

    /// Like [`json`](Self::json), also returning the attempt history.
    pub async fn json_with_report<R: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
        auth: &AuthScheme,
    ) -> (Result<R, ApiError>, ExecutionReport) {
        let (result, report) = self.executor.execute_with_report(spec, auth).await;
        log_report(&report);
        (result.and_then(|response| response.json(&spec.path)), report)
    }

    /// Execute and return the body as text.
    pub async fn text(&self, spec: &RequestSpec, auth: &AuthScheme) -> Result<String, ApiError> {
        Ok(self.send(spec, auth).await?.text())
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str, auth: &AuthScheme) -> Result<R, ApiError> {
        self.json(&RequestSpec::new(Method::GET, path), auth).await
    }

    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: &AuthScheme,
    ) -> Result<R, ApiError> {
        let spec = RequestSpec::new(Method::POST, path).json_body(encode_body(path, body)?);
        self.json(&spec, auth).await
    }

    pub async fn put<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: &AuthScheme,
    ) -> Result<R, ApiError> {
        let spec = RequestSpec::new(Method::PUT, path).json_body(encode_body(path, body)?);
        self.json(&spec, auth).await
    }

    pub async fn patch<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: &AuthScheme,
    ) -> Result<R, ApiError> {
        let spec = RequestSpec::new(Method::PATCH, path).json_body(encode_body(path, body)?);
        self.json(&spec, auth).await
    }

    pub async fn delete<R: DeserializeOwned>(
        &self,
        path: &str,
        auth: &AuthScheme,
    ) -> Result<R, ApiError> {
        self.json(&RequestSpec::new(Method::DELETE, path), auth).await
    }
}

/// Serialize a JSON request body.
pub fn encode_body<B: Serialize + ?Sized>(path: &str, body: &B) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(body)
        .map_err(|err| ApiError::config(format!("Failed to serialize request body for {path}: {err}")))
}

/// Absolute path from `segments`, each percent-encoded so caller-supplied
/// identifiers stay inside their own segment.
///
/// # Errors
/// [`ApiError::Configuration`] for an empty, `.` or `..` segment.
pub fn encode_path<'a, I>(segments: I) -> Result<String, ApiError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = Url::parse("http://localhost/")
        .map_err(|err| ApiError::config(format!("Invalid path base: {err}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| ApiError::config("Path base cannot hold segments"))?;
        for segment in segments {
            if matches!(segment, "" | "." | "..") {
                return Err(ApiError::config(format!("Invalid path segment {segment:?}")));
            }
            path.push(segment);
        }
    }
    Ok(url.path().to_string())
}

fn log_report(report: &ExecutionReport) {
    if report.short_circuited {
        debug!("call rejected by open circuit");
        return;
    }
    for attempt in &report.attempts {
        debug!(
            attempt = attempt.index,
            delay_ms = u64::try_from(attempt.delay.as_millis()).unwrap_or(u64::MAX),
            outcome = ?attempt.outcome,
            "request attempt"
        );
    }
}

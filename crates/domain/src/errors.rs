//! Error types used throughout the client layer
//!
//! Every failure is classified once, where it is first observed, into one
//! [`ApiError`] variant. Higher layers aggregate (retry count, breaker state)
//! but never reclassify.

use std::time::Duration;

use thiserror::Error;

/// Maximum number of response body bytes kept on an error
pub const ERROR_BODY_LIMIT: usize = 512;

/// Categories of API errors for retry logic and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Missing or malformed configuration - fatal, never retried
    Configuration,
    /// Token acquisition failed
    Authentication,
    /// 4xx other than 429 - never retried
    Client,
    /// 429
    RateLimit,
    /// 5xx
    Server,
    /// Attempt exceeded its timeout budget
    Timeout,
    /// DNS, connect, TLS or I/O failure
    Network,
    /// Rejected by the circuit breaker without network I/O
    CircuitOpen,
    /// Success response with a body that did not match the expected shape
    Decode,
}

/// Classified outbound API failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication against {upstream} failed: {message}")]
    Auth {
        upstream: String,
        message: String,
        status: Option<u16>,
        /// Token endpoint was unreachable or overloaded, as opposed to
        /// rejecting the credentials
        transient: bool,
    },

    #[error("{path} failed with HTTP {status}")]
    Terminal { path: String, status: u16, body: String },

    #[error("{path} failed with retryable HTTP {status}")]
    Retryable { path: String, status: u16, body: String, retry_after: Option<Duration> },

    #[error("{path} timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },

    #[error("Network error calling {path}: {message}")]
    Network { path: String, message: String },

    #[error("Circuit breaker open for {upstream}, retry in {retry_in:?}")]
    CircuitOpen { upstream: String, retry_in: Duration },

    #[error("Failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl ApiError {
    /// Classify a non-success HTTP status observed on `path`.
    ///
    /// 429 and 5xx are retryable, everything else is terminal.
    pub fn from_status(
        path: impl Into<String>,
        status: u16,
        body: &str,
        retry_after: Option<Duration>,
    ) -> Self {
        let path = path.into();
        let body = truncate_body(body);
        if status == 429 || (500..600).contains(&status) {
            Self::Retryable { path, status, body, retry_after }
        } else {
            Self::Terminal { path, status, body }
        }
    }

    /// Build a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Configuration(_) => ApiErrorCategory::Configuration,
            Self::Auth { .. } => ApiErrorCategory::Authentication,
            Self::Terminal { .. } => ApiErrorCategory::Client,
            Self::Retryable { status: 429, .. } => ApiErrorCategory::RateLimit,
            Self::Retryable { .. } => ApiErrorCategory::Server,
            Self::Timeout { .. } => ApiErrorCategory::Timeout,
            Self::Network { .. } => ApiErrorCategory::Network,
            Self::CircuitOpen { .. } => ApiErrorCategory::CircuitOpen,
            Self::Decode { .. } => ApiErrorCategory::Decode,
        }
    }

    /// Whether another attempt of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Retryable { .. } | Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Auth { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Whether the failure says the upstream itself is unhealthy.
    ///
    /// Terminal 4xx responses prove the upstream answered and are not
    /// counted against the circuit breaker.
    pub fn counts_as_upstream_failure(&self) -> bool {
        self.is_retryable()
    }

    /// Failure happened below HTTP, so the request may or may not have been
    /// processed upstream
    pub fn is_transport_level(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network { .. })
    }

    /// HTTP status observed, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Terminal { status, .. } | Self::Retryable { status, .. } => Some(*status),
            Self::Auth { status, .. } => *status,
            _ => None,
        }
    }

    /// Observed status, or the gateway status this failure is equivalent to
    pub fn equivalent_status(&self) -> Option<u16> {
        match self {
            Self::Timeout { .. } => Some(504),
            Self::Network { .. } | Self::CircuitOpen { .. } => Some(503),
            _ => self.status(),
        }
    }

    /// Request path the failure was observed on
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Terminal { path, .. }
            | Self::Retryable { path, .. }
            | Self::Timeout { path, .. }
            | Self::Network { path, .. }
            | Self::Decode { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Response body captured with the error, truncated
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Terminal { body, .. } | Self::Retryable { body, .. } => Some(body),
            _ => None,
        }
    }

    /// `Retry-After` hint sent with a 429/503
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Retryable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Banking facade errors
///
/// Domain translations are only produced from responses the facade has
/// inspected; transport failures pass through as [`ApiError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankingError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Charge {txid} already exists")]
    ChargeAlreadyExists { txid: String },

    #[error("Cannot {action} {id}: status is {status}, expected {expected}")]
    InvalidState { action: &'static str, id: String, status: String, expected: String },

    #[error("Invalid txid {0:?}: expected 26 to 35 alphanumeric characters")]
    InvalidTxid(String),
}

impl BankingError {
    /// The underlying classified API error, if this is not a domain error
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for partner/instance operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Result type alias for banking operations
pub type BankingResult<T> = std::result::Result<T, BankingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ApiError::from_status("/x", 404, "", None),
            ApiError::Terminal { status: 404, .. }
        ));
        assert!(matches!(
            ApiError::from_status("/x", 400, "", None),
            ApiError::Terminal { status: 400, .. }
        ));
        assert!(matches!(
            ApiError::from_status("/x", 429, "", None),
            ApiError::Retryable { status: 429, .. }
        ));
        assert!(matches!(
            ApiError::from_status("/x", 503, "", None),
            ApiError::Retryable { status: 503, .. }
        ));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ApiError::from_status("/x", 429, "", None).category(),
            ApiErrorCategory::RateLimit
        );
        assert_eq!(ApiError::from_status("/x", 500, "", None).category(), ApiErrorCategory::Server);
        assert_eq!(ApiError::from_status("/x", 409, "", None).category(), ApiErrorCategory::Client);
        assert_eq!(ApiError::config("missing").category(), ApiErrorCategory::Configuration);
    }

    #[test]
    fn test_should_retry() {
        let timeout = ApiError::Timeout { path: "/x".into(), timeout: Duration::from_secs(30) };
        let network = ApiError::Network { path: "/x".into(), message: "refused".into() };
        let auth = |transient| ApiError::Auth {
            upstream: "sicredi-pix".into(),
            message: "denied".into(),
            status: None,
            transient,
        };

        assert!(timeout.is_retryable());
        assert!(network.is_retryable());
        assert!(auth(true).is_retryable());
        assert!(!auth(false).is_retryable());
        assert!(!ApiError::from_status("/x", 404, "", None).is_retryable());
        assert!(!ApiError::config("x").is_retryable());
        assert!(!ApiError::from_status("/x", 404, "", None).counts_as_upstream_failure());
        assert!(timeout.is_transport_level());
        assert!(!ApiError::from_status("/x", 503, "", None).is_transport_level());
    }

    #[test]
    fn test_equivalent_status() {
        let timeout = ApiError::Timeout { path: "/x".into(), timeout: Duration::from_secs(1) };
        let network = ApiError::Network { path: "/x".into(), message: "dns".into() };

        assert_eq!(timeout.status(), None);
        assert_eq!(timeout.equivalent_status(), Some(504));
        assert_eq!(network.equivalent_status(), Some(503));
        assert_eq!(ApiError::from_status("/x", 418, "", None).equivalent_status(), Some(418));
        assert_eq!(timeout.path(), Some("/x"));
    }

    #[test]
    fn test_body_is_truncated_on_char_boundary() {
        let body = "é".repeat(ERROR_BODY_LIMIT);
        let err = ApiError::from_status("/x", 500, &body, Some(Duration::from_secs(2)));

        let kept = err.body().expect("body kept");
        assert!(kept.ends_with("..."));
        assert!(kept.len() <= ERROR_BODY_LIMIT + 3);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_banking_error_wraps_api_error() {
        let err: BankingError = ApiError::from_status("/cob", 400, "bad", None).into();
        assert!(err.as_api().is_some());
        assert_eq!(err.to_string(), "/cob failed with HTTP 400");

        let conflict = BankingError::ChargeAlreadyExists { txid: "abc".into() };
        assert!(conflict.as_api().is_none());
    }
}

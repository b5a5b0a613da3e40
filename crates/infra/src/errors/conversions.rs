//! Conversions from external infrastructure errors into classified
//! [`ApiError`]s.
//!
//! This is the single place where a raw `reqwest` or I/O failure is looked at.
//! Everything above the transport receives an already classified error.

use std::path::Path;
use std::time::Duration;

use reqwest::Error as HttpError;
use zeda_domain::ApiError;

/// Where a raw failure was observed, needed to build a classified error.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FailureContext<'a> {
    pub path: &'a str,
    pub timeout: Duration,
}

/// Extension trait to make the conversion explicit at call sites.
pub(crate) trait IntoApiError {
    fn into_api_error(self, context: FailureContext<'_>) -> ApiError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ApiError */
/* -------------------------------------------------------------------------- */

impl IntoApiError for HttpError {
    fn into_api_error(self, context: FailureContext<'_>) -> ApiError {
        if self.is_timeout() {
            return ApiError::Timeout { path: context.path.to_string(), timeout: context.timeout };
        }

        let kind = if self.is_connect() {
            "connection failure"
        } else if self.is_body() || self.is_decode() {
            "failed reading response body"
        } else if self.is_request() {
            "request failure"
        } else {
            "transport failure"
        };

        ApiError::Network { path: context.path.to_string(), message: format!("{kind}: {self}") }
    }
}

impl IntoApiError for tokio::time::error::Elapsed {
    fn into_api_error(self, context: FailureContext<'_>) -> ApiError {
        ApiError::Timeout { path: context.path.to_string(), timeout: context.timeout }
    }
}

/* -------------------------------------------------------------------------- */
/* Certificate material → ApiError::Configuration */
/* -------------------------------------------------------------------------- */

pub(crate) fn read_pem(kind: &str, path: &Path) -> Result<Vec<u8>, ApiError> {
    std::fs::read(path).map_err(|err| {
        ApiError::config(format!("Failed to read {kind} from {}: {err}", path.display()))
    })
}

pub(crate) fn invalid_pem(kind: &str, path: &Path, err: &HttpError) -> ApiError {
    ApiError::config(format!("Invalid {kind} in {}: {err}", path.display()))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

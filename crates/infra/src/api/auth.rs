//! Request authentication
//!
//! Static credentials are attached as-is. OAuth credentials come from an
//! [`AccessTokenProvider`], fetched inside each attempt so a renewed token is
//! picked up by retries.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use zeda_common::Clock;
use zeda_domain::constants::HEADER_CLIENT_TOKEN;
use zeda_domain::ApiError;

use crate::auth::{AccessToken, TokenCache};
use crate::http::HttpRequest;

/// Source of OAuth access tokens
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token, acquiring one if needed.
    async fn access_token(&self) -> Result<AccessToken, ApiError>;

    /// The upstream answered 401 to `token`; forget it.
    fn reject(&self, token: &AccessToken);
}

#[async_trait]
impl<C: Clock> AccessTokenProvider for TokenCache<C> {
    async fn access_token(&self) -> Result<AccessToken, ApiError> {
        self.get_token().await
    }

    fn reject(&self, token: &AccessToken) {
        self.invalidate_rejected(token);
    }
}

/// How one request authenticates
#[derive(Clone)]
pub enum AuthScheme {
    /// No credentials (token endpoints, tests)
    Anonymous,
    /// `Authorization: Bearer <static token>`
    Bearer(String),
    /// `Client-Token: <static token>`
    ClientToken(String),
    /// `Authorization: Bearer <cached OAuth token>`
    OAuth(Arc<dyn AccessTokenProvider>),
}

impl AuthScheme {
    pub fn is_oauth(&self) -> bool {
        matches!(self, Self::OAuth(_))
    }

    /// Attach the credential. `token` must be set for [`AuthScheme::OAuth`].
    pub(crate) fn apply(
        &self,
        request: HttpRequest,
        token: Option<&AccessToken>,
    ) -> Result<HttpRequest, ApiError> {
        match (self, token) {
            (Self::Anonymous, _) => Ok(request),
            (Self::Bearer(secret), _) => {
                request.header(AUTHORIZATION.as_str(), &format!("Bearer {secret}"))
            }
            (Self::ClientToken(secret), _) => request.header(HEADER_CLIENT_TOKEN, secret),
            (Self::OAuth(_), Some(token)) => {
                request.header(AUTHORIZATION.as_str(), &format!("Bearer {}", token.secret()))
            }
            (Self::OAuth(_), None) => {
                Err(ApiError::config("OAuth request built without an access token"))
            }
        }
    }
}

impl fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anonymous => "Anonymous",
            Self::Bearer(_) => "Bearer",
            Self::ClientToken(_) => "ClientToken",
            Self::OAuth(_) => "OAuth",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use reqwest::Method;

    use super::*;

    fn request() -> HttpRequest {
        HttpRequest::new(Method::GET, "https://api.example/x", "/x")
    }

    #[test]
    fn test_static_schemes_set_expected_headers() {
        let bearer = AuthScheme::Bearer("partner".into()).apply(request(), None).unwrap();
        assert_eq!(bearer.headers["authorization"], "Bearer partner");

        let client = AuthScheme::ClientToken("instance".into()).apply(request(), None).unwrap();
        assert_eq!(client.headers["client-token"], "instance");
        assert!(client.headers.get("authorization").is_none());
    }

    #[test]
    fn test_oauth_scheme_uses_supplied_token() {
        struct Unused;

        #[async_trait]
        impl AccessTokenProvider for Unused {
            async fn access_token(&self) -> Result<AccessToken, ApiError> {
                unreachable!("token is supplied by the caller")
            }

            fn reject(&self, _token: &AccessToken) {}
        }

        let scheme = AuthScheme::OAuth(Arc::new(Unused));
        let token = AccessToken::new("oauth", Instant::now() + Duration::from_secs(60));

        let signed = scheme.apply(request(), Some(&token)).unwrap();
        assert_eq!(signed.headers["authorization"], "Bearer oauth");
        assert!(scheme.apply(request(), None).is_err());
        assert_eq!(format!("{scheme:?}"), "OAuth");
    }
}

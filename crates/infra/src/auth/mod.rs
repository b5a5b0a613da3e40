//! OAuth token acquisition and caching
//!
//! One [`TokenCache`] per upstream credential set wraps one
//! [`TokenAcquirer`]:
//! - [`ClientCredentialsAcquirer`]: client-credentials grant with a Basic
//!   credential, sent over the upstream's mTLS transport
//! - [`PasswordGrantAcquirer`]: password grant plus refresh-token renewal
//!
//! The cache does not watch responses; the request executor invalidates it
//! on a 401.

use async_trait::async_trait;
use zeda_domain::ApiError;

pub mod cache;
pub mod client_credentials;
mod endpoint;
pub mod password_grant;
pub mod types;

pub use cache::TokenCache;
pub use client_credentials::{encode_basic, ClientCredentialsAcquirer};
pub use password_grant::PasswordGrantAcquirer;
pub use types::{AccessToken, RefreshToken, TokenGrant, TokenResponse};

/// Performs the network exchange that yields a new token
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    /// Upstream name for logs and errors
    fn upstream(&self) -> &str;

    /// Full authentication with the configured credentials
    async fn authenticate(&self) -> Result<TokenGrant, ApiError>;

    /// Renew with a refresh token. Grants without refresh support
    /// re-authenticate.
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ApiError> {
        self.authenticate().await
    }
}

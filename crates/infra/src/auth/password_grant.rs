//! Password grant with refresh-token renewal used by the boleto API

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use zeda_domain::constants::{HEADER_API_KEY, HEADER_CONTEXT, UPSTREAM_BOLETO};
use zeda_domain::{ApiError, BoletoConfig};

use super::endpoint::request_token;
use super::types::TokenGrant;
use super::TokenAcquirer;
use crate::http::Transport;

/// Acquires refreshable tokens with `grant_type=password` and renews them
/// with `grant_type=refresh_token`.
pub struct PasswordGrantAcquirer {
    transport: Arc<dyn Transport>,
    auth_url: String,
    api_key: String,
    context: String,
    username: String,
    password: String,
    scope: String,
}

impl PasswordGrantAcquirer {
    pub fn new(transport: Arc<dyn Transport>, config: &BoletoConfig) -> Self {
        Self {
            transport,
            auth_url: config.auth_url.clone(),
            api_key: config.api_key.clone(),
            context: config.context.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            scope: config.scope.clone(),
        }
    }

    async fn grant(&self, form: &[(&str, &str)]) -> Result<TokenGrant, ApiError> {
        request_token(
            &self.transport,
            UPSTREAM_BOLETO,
            &self.auth_url,
            &[(HEADER_API_KEY, self.api_key.as_str()), (HEADER_CONTEXT, self.context.as_str())],
            form,
        )
        .await
    }
}

impl fmt::Debug for PasswordGrantAcquirer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordGrantAcquirer")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenAcquirer for PasswordGrantAcquirer {
    fn upstream(&self) -> &str {
        UPSTREAM_BOLETO
    }

    async fn authenticate(&self) -> Result<TokenGrant, ApiError> {
        self.grant(&[
            ("grant_type", "password"),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("scope", self.scope.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ApiError> {
        self.grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", self.scope.as_str()),
        ])
        .await
    }
}

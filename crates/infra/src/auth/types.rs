//! OAuth token types
//!
//! Acquirers return a [`TokenGrant`] (lifetimes relative to the response);
//! the cache stamps it with its clock into an [`AccessToken`] with absolute
//! expiry instants.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Deserialize;

/// Cached bearer token, replaced (never mutated) on renewal
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Instant,
    /// Set for tokens stamped from a grant; bounds the skew
    issued_at: Option<Instant>,
    refresh: Option<RefreshToken>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        Self { value: value.into(), expires_at, issued_at: None, refresh: None }
    }

    /// Attach the refresh token issued alongside this access token.
    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshToken) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Stamp a grant received at `now`.
    pub fn from_grant(grant: TokenGrant, now: Instant) -> Self {
        let refresh = grant.refresh_token.map(|value| RefreshToken {
            value,
            // Providers that omit the refresh lifetime get the access lifetime.
            expires_at: now + grant.refresh_expires_in.unwrap_or(grant.expires_in),
            issued_at: Some(now),
        });
        Self {
            value: grant.access_token,
            expires_at: now + grant.expires_in,
            issued_at: Some(now),
            refresh,
        }
    }

    /// Raw token for the `Authorization` header
    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh.as_ref()
    }

    /// Usable at `now`: `now < expires_at - skew`.
    ///
    /// For a token issued for less than twice the skew, the skew shrinks to
    /// half its lifetime so a fresh grant is usable at all.
    pub fn is_fresh(&self, now: Instant, skew: Duration) -> bool {
        is_before_skewed(now, self.issued_at, self.expires_at, skew)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("refresh", &self.refresh)
            .finish()
    }
}

/// Refresh token with its own expiry
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    value: String,
    expires_at: Instant,
    issued_at: Option<Instant>,
}

impl RefreshToken {
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        Self { value: value.into(), expires_at, issued_at: None }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// A refresh grant is only attempted with a token that is fresh under the
    /// same skew as access tokens.
    pub fn is_fresh(&self, now: Instant, skew: Duration) -> bool {
        is_before_skewed(now, self.issued_at, self.expires_at, skew)
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn is_before_skewed(
    now: Instant,
    issued_at: Option<Instant>,
    expires_at: Instant,
    skew: Duration,
) -> bool {
    let skew = match issued_at {
        Some(issued_at) => skew.min(expires_at.saturating_duration_since(issued_at) / 2),
        None => skew,
    };
    match expires_at.checked_sub(skew) {
        Some(deadline) => now < deadline,
        None => false,
    }
}

/// Token endpoint result, lifetimes relative to receipt
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
    pub refresh_token: Option<String>,
    pub refresh_expires_in: Option<Duration>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refresh_expires_in", &self.refresh_expires_in)
            .finish_non_exhaustive()
    }
}

/// OAuth token response (RFC 6749 §5.1 plus `refresh_expires_in`)
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
}

impl From<TokenResponse> for TokenGrant {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            expires_in: Duration::from_secs(response.expires_in),
            refresh_token: response.refresh_token.filter(|token| !token.is_empty()),
            refresh_expires_in: response.refresh_expires_in.map(Duration::from_secs),
        }
    }
}

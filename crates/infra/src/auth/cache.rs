//! Single-flight token cache

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zeda_common::{Clock, SystemClock};
use zeda_domain::ApiError;

use super::types::{AccessToken, TokenGrant};
use super::TokenAcquirer;

type Acquisition = Shared<BoxFuture<'static, Result<AccessToken, ApiError>>>;

#[derive(Default)]
struct CacheState {
    token: Option<AccessToken>,
    /// Acquisition every concurrent caller awaits, tagged so a settled
    /// flight only clears itself
    in_flight: Option<(u64, Acquisition)>,
    flights: u64,
}

/// Caches one upstream's access token.
///
/// A token is served while `now < expires_at - skew`. On a miss exactly one
/// acquisition runs at a time; concurrent callers await the same shared
/// future, which is cleared once it settles either way. When the stale
/// token carries a refresh token that is still fresh, a refresh grant is
/// tried first and any failure falls back to full authentication.
pub struct TokenCache<C: Clock = SystemClock> {
    acquirer: Arc<dyn TokenAcquirer>,
    clock: Arc<C>,
    skew: Duration,
    state: Arc<Mutex<CacheState>>,
    acquisitions: Arc<AtomicU64>,
}

impl TokenCache<SystemClock> {
    pub fn new(acquirer: Arc<dyn TokenAcquirer>, skew: Duration) -> Self {
        Self::with_clock(acquirer, skew, SystemClock)
    }
}

impl<C: Clock> TokenCache<C> {
    pub fn with_clock(acquirer: Arc<dyn TokenAcquirer>, skew: Duration, clock: C) -> Self {
        Self {
            acquirer,
            clock: Arc::new(clock),
            skew,
            state: Arc::new(Mutex::new(CacheState::default())),
            acquisitions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn upstream(&self) -> &str {
        self.acquirer.upstream()
    }

    /// Return a fresh token, acquiring one if needed.
    ///
    /// # Errors
    /// [`ApiError::Auth`] when acquisition (after refresh fallback) failed.
    pub async fn get_token(&self) -> Result<AccessToken, ApiError> {
        let acquisition = {
            let mut state = self.state.lock();
            let now = self.clock.now();

            if let Some(token) = state.token.as_ref().filter(|token| token.is_fresh(now, self.skew))
            {
                return Ok(token.clone());
            }

            if let Some((_, flight)) = &state.in_flight {
                debug!(upstream = self.upstream(), "joining in-flight token acquisition");
                flight.clone()
            } else {
                let refresh = state
                    .token
                    .as_ref()
                    .and_then(AccessToken::refresh_token)
                    .filter(|refresh| refresh.is_fresh(now, self.skew))
                    .map(|refresh| refresh.secret().to_string());
                state.flights += 1;
                let id = state.flights;
                let flight = self.start_acquisition(id, refresh);
                state.in_flight = Some((id, flight.clone()));
                flight
            }
        };

        acquisition.await
    }

    /// Drop the cached token, refresh token included.
    pub fn invalidate(&self) {
        if self.state.lock().token.take().is_some() {
            info!(upstream = self.upstream(), "cached token invalidated");
        }
    }

    /// Drop the cached token only if it is still the one that was rejected,
    /// so concurrent 401s do not discard a token another caller just renewed.
    pub fn invalidate_rejected(&self, rejected: &AccessToken) {
        let mut state = self.state.lock();
        if state.token.as_ref().is_some_and(|token| token.secret() == rejected.secret()) {
            state.token = None;
            drop(state);
            info!(upstream = self.upstream(), "rejected token invalidated");
        }
    }

    /// Number of acquisitions started (each may include a refresh attempt
    /// and its fallback)
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Acquire)
    }

    fn start_acquisition(&self, id: u64, refresh: Option<String>) -> Acquisition {
        let acquirer = Arc::clone(&self.acquirer);
        let clock = Arc::clone(&self.clock);
        let state = Arc::clone(&self.state);
        self.acquisitions.fetch_add(1, Ordering::AcqRel);

        async move {
            let upstream = acquirer.upstream().to_string();
            info!(upstream = %upstream, refresh = refresh.is_some(), "acquiring access token");

            let result = acquire(acquirer.as_ref(), refresh).await;

            let mut state = state.lock();
            if state.in_flight.as_ref().is_some_and(|(flight, _)| *flight == id) {
                state.in_flight = None;
            }
            match result {
                Ok(grant) => {
                    let expires_in = grant.expires_in.as_secs();
                    let token = AccessToken::from_grant(grant, clock.now());
                    state.token = Some(token.clone());
                    drop(state);
                    info!(upstream = %upstream, expires_in, "access token acquired");
                    Ok(token)
                }
                Err(err) => {
                    drop(state);
                    warn!(upstream = %upstream, error = %err, "token acquisition failed");
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn acquire(
    acquirer: &dyn TokenAcquirer,
    refresh: Option<String>,
) -> Result<TokenGrant, ApiError> {
    if let Some(refresh_token) = refresh {
        match acquirer.refresh(&refresh_token).await {
            Ok(grant) => return Ok(grant),
            Err(err) => warn!(
                upstream = acquirer.upstream(),
                error = %err,
                "refresh grant failed, falling back to full authentication"
            ),
        }
    }
    acquirer.authenticate().await
}

impl<C: Clock> fmt::Debug for TokenCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenCache")
            .field("upstream", &self.upstream())
            .field("skew", &self.skew)
            .field("cached", &state.token.is_some())
            .field("in_flight", &state.in_flight.is_some())
            .finish()
    }
}

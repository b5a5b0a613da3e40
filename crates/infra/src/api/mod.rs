//! Resilient outbound API calls
//!
//! - [`auth`]: how a request authenticates (static Bearer, `Client-Token`,
//!   cached OAuth)
//! - [`executor`]: breaker gate, bounded retry, per-attempt auth and
//!   breaker reporting
//! - [`client`]: typed JSON client on top of the executor
//!
//! Every upstream facade in [`crate::integrations`] goes through this chain.

pub mod auth;
pub mod client;
pub mod executor;

pub use auth::{AccessTokenProvider, AuthScheme};
pub use client::{encode_body, encode_path, ApiClient};
pub use executor::{
    breaker_config, retry_config, ExecutionReport, RequestAttempt, RequestExecutor, RequestSpec,
};

//! # Zeda Infrastructure
//!
//! Outbound API client layer.
//!
//! This crate contains:
//! - HTTP transport with optional mutual TLS ([`http`])
//! - OAuth token acquisition with single-flight caching ([`auth`])
//! - The breaker + retry request executor and typed client ([`api`])
//! - Partner/instance and Sicredi banking facades ([`integrations`])
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Resilience primitives come from `zeda-common`, error taxonomy and
//!   payloads from `zeda-domain`
//! - Contains all I/O; [`ApiClients`] wires it together from a [`Config`]
//!
//! [`Config`]: zeda_domain::Config

pub mod api;
pub mod auth;
pub mod clients;
pub mod config;
mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiClient, AuthScheme, ExecutionReport, RequestExecutor, RequestSpec};
pub use auth::{AccessToken, TokenAcquirer, TokenCache};
pub use clients::ApiClients;
pub use http::{HttpRequest, HttpResponse, HttpTransport, TlsMode, Transport};
pub use integrations::*;
pub use observability::init_tracing;

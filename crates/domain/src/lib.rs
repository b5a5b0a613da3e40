//! # Zeda Domain
//!
//! Domain types for the outbound API client layer.
//!
//! This crate contains:
//! - The classified error taxonomy ([`ApiError`], [`BankingError`])
//! - Configuration structures
//! - Partner/instance, Pix and hybrid boleto payloads
//! - Upstream constants
//!
//! ## Architecture
//! - No I/O; only serde, thiserror and chrono
//! - Depends on `zeda-common` for serde helpers only

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

//! Structured logging
//!
//! Every crate logs through `tracing` macros; this module only installs the
//! subscriber. Credentials never reach log fields: config structs and
//! tokens redact themselves in `Debug`.

pub mod logging;

pub use logging::init_tracing;

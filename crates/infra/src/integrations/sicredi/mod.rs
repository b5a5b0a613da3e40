//! Sicredi banking APIs
//!
//! Two independent OAuth identities against the same provider family:
//! - [`SicrediPixClient`]: client-credentials token over mutual TLS
//! - [`SicrediBoletoClient`]: password grant with refresh over standard TLS

pub mod boleto;
pub mod pix;

pub use boleto::SicrediBoletoClient;
pub use pix::SicrediPixClient;

//! Upstream facades

pub mod sicredi;
pub mod zeda;

pub use sicredi::{SicrediBoletoClient, SicrediPixClient};
pub use zeda::{InstanceRef, ZedaClient};

//! Partner/instance provisioning API

pub mod client;

pub use client::{InstanceRef, ZedaClient};

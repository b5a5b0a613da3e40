//! HTTP transport

pub mod client;

pub use client::{
    HttpRequest, HttpResponse, HttpTransport, HttpTransportBuilder, TlsMode, Transport,
};

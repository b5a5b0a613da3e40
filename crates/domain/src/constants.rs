//! Upstream constants
//!
//! Names used in logs and errors, and the default tunables of the client
//! layer.

// Upstream names
pub const UPSTREAM_PARTNER: &str = "zeda";
pub const UPSTREAM_PIX: &str = "sicredi-pix";
pub const UPSTREAM_BOLETO: &str = "sicredi-boleto";

// Resilience defaults
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
pub const DEFAULT_BREAKER_RESET_MS: u64 = 30_000;
pub const DEFAULT_TOKEN_SKEW_MS: u64 = 30_000;

// Headers
pub const HEADER_CLIENT_TOKEN: &str = "Client-Token";
pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_CONTEXT: &str = "context";
pub const HEADER_COOPERATIVA: &str = "cooperativa";
pub const HEADER_POSTO: &str = "posto";
pub const HEADER_CODIGO_BENEFICIARIO: &str = "codigoBeneficiario";

/// `context` header value for the collection (cobrança) API
pub const BOLETO_CONTEXT: &str = "COBRANCA";
/// Default OAuth scope of the Pix API
pub const PIX_DEFAULT_SCOPE: &str = "cob.read cob.write webhook.read webhook.write";
/// Default OAuth scope of the collection (cobrança) API
pub const BOLETO_DEFAULT_SCOPE: &str = "cobranca";

//! Client layer configuration
//!
//! Loaded once at startup and read-only afterwards. Secrets are never
//! serialized and are redacted from `Debug` output.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeda_common::duration_millis;

use crate::constants::{
    BOLETO_CONTEXT, BOLETO_DEFAULT_SCOPE, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS,
    DEFAULT_BREAKER_RESET_MS, DEFAULT_BREAKER_THRESHOLD, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS,
    DEFAULT_TOKEN_SKEW_MS, PIX_DEFAULT_SCOPE,
};
use crate::errors::ApiError;

const REDACTED: &str = "<redacted>";

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| REDACTED)
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub partner: PartnerApiConfig,
    #[serde(default)]
    pub pix: Option<PixConfig>,
    #[serde(default)]
    pub boleto: Option<BoletoConfig>,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Check credentials, URLs and tunables before any client is built
    pub fn validate(&self) -> Result<(), ApiError> {
        self.partner.validate()?;
        if let Some(pix) = &self.pix {
            pix.validate()?;
        }
        if let Some(boleto) = &self.boleto {
            boleto.validate()?;
        }
        self.resilience.validate()
    }
}

/// Partner/instance upstream (static credentials)
#[derive(Clone, Serialize, Deserialize)]
pub struct PartnerApiConfig {
    pub base_url: String,
    /// Bearer token for partner operations
    #[serde(skip_serializing)]
    pub partner_token: String,
    /// `Client-Token` header for instance-scoped operations
    #[serde(skip_serializing)]
    pub client_token: String,
}

impl PartnerApiConfig {
    fn validate(&self) -> Result<(), ApiError> {
        require_url("partner.base_url", &self.base_url)?;
        require("partner.partner_token", &self.partner_token)?;
        require("partner.client_token", &self.client_token)
    }
}

impl fmt::Debug for PartnerApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerApiConfig")
            .field("base_url", &self.base_url)
            .field("partner_token", &REDACTED)
            .field("client_token", &REDACTED)
            .finish()
    }
}

/// Client certificate material for mutual TLS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtlsConfig {
    /// PEM client certificate (chain)
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
    /// PEM CA bundle used to validate the server, in addition to system roots
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
}

/// Pix API: client-credentials grant over mTLS
#[derive(Clone, Serialize, Deserialize)]
pub struct PixConfig {
    pub base_url: String,
    pub token_url: String,
    /// Pre-encoded `Basic` credential; takes precedence over id/secret
    #[serde(default, skip_serializing)]
    pub basic_secret: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(default = "default_pix_scope")]
    pub scope: String,
    /// Receiver Pix key charges are created against
    pub pix_key: String,
    pub tls: MtlsConfig,
}

fn default_pix_scope() -> String {
    PIX_DEFAULT_SCOPE.to_string()
}

impl PixConfig {
    fn validate(&self) -> Result<(), ApiError> {
        require_url("pix.base_url", &self.base_url)?;
        require_url("pix.token_url", &self.token_url)?;
        require("pix.pix_key", &self.pix_key)?;
        let has_pair = self.client_id.as_deref().is_some_and(|id| !id.is_empty())
            && self.client_secret.as_deref().is_some_and(|secret| !secret.is_empty());
        let has_basic = self.basic_secret.as_deref().is_some_and(|secret| !secret.is_empty());
        if !has_basic && !has_pair {
            return Err(ApiError::config(
                "pix requires basic_secret or client_id and client_secret",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for PixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixConfig")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("basic_secret", &redact(&self.basic_secret))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("scope", &self.scope)
            .field("pix_key", &self.pix_key)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Boleto (cobrança) API: password grant with refresh
#[derive(Clone, Serialize, Deserialize)]
pub struct BoletoConfig {
    pub base_url: String,
    pub auth_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub cooperativa: String,
    pub posto: String,
    pub codigo_beneficiario: String,
    #[serde(default = "default_boleto_context")]
    pub context: String,
    #[serde(default = "default_boleto_scope")]
    pub scope: String,
}

fn default_boleto_context() -> String {
    BOLETO_CONTEXT.to_string()
}

fn default_boleto_scope() -> String {
    BOLETO_DEFAULT_SCOPE.to_string()
}

impl BoletoConfig {
    fn validate(&self) -> Result<(), ApiError> {
        require_url("boleto.base_url", &self.base_url)?;
        require_url("boleto.auth_url", &self.auth_url)?;
        require("boleto.api_key", &self.api_key)?;
        require("boleto.username", &self.username)?;
        require("boleto.password", &self.password)?;
        require("boleto.cooperativa", &self.cooperativa)?;
        require("boleto.posto", &self.posto)?;
        require("boleto.codigo_beneficiario", &self.codigo_beneficiario)
    }
}

impl fmt::Debug for BoletoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoletoConfig")
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .field("api_key", &REDACTED)
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("cooperativa", &self.cooperativa)
            .field("posto", &self.posto)
            .field("codigo_beneficiario", &self.codigo_beneficiario)
            .field("context", &self.context)
            .finish()
    }
}

/// Numeric tunables shared by every upstream client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Hard per-attempt timeout (connect + send + receive)
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub backoff_base: Duration,
    #[serde(with = "duration_millis")]
    pub backoff_max: Duration,
    pub jitter: bool,
    pub breaker_threshold: u32,
    #[serde(with = "duration_millis")]
    pub breaker_reset: Duration,
    /// Tokens are renewed this long before they expire
    #[serde(with = "duration_millis")]
    pub token_skew: Duration,
    /// Route calls through the `HTTPS_PROXY`/`HTTP_PROXY`/`NO_PROXY`
    /// settings of the environment
    pub system_proxy: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            jitter: false,
            breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            breaker_reset: Duration::from_millis(DEFAULT_BREAKER_RESET_MS),
            token_skew: Duration::from_millis(DEFAULT_TOKEN_SKEW_MS),
            system_proxy: true,
        }
    }
}

impl ResilienceConfig {
    fn validate(&self) -> Result<(), ApiError> {
        if self.timeout.is_zero() {
            return Err(ApiError::config("resilience.timeout must be greater than 0"));
        }
        if self.breaker_threshold == 0 {
            return Err(ApiError::config("resilience.breaker_threshold must be greater than 0"));
        }
        if self.breaker_reset.is_zero() {
            return Err(ApiError::config("resilience.breaker_reset must be greater than 0"));
        }
        if self.backoff_max < self.backoff_base {
            return Err(ApiError::config("resilience.backoff_max must be >= backoff_base"));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::config(format!("{field} is required")));
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<(), ApiError> {
    require(field, value)?;
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(ApiError::config(format!("{field} must be an http(s) URL, got {value:?}")));
    }
    Ok(())
}

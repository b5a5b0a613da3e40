//! Configuration loader
//!
//! Loads the client layer configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file into the environment if one exists
//! 2. Attempts to load from environment variables
//! 3. If incomplete, falls back to loading from file
//! 4. Probes multiple paths for config files (JSON and TOML)
//! 5. Validates the result before returning it
//!
//! ## Environment Variables
//! - `ZEDA_API_URL`, `ZEDA_PARTNER_TOKEN`, `ZEDA_CLIENT_TOKEN`: partner API
//! - `SICREDI_PIX_*`: Pix API, only read when `SICREDI_PIX_BASE_URL` is set
//! - `SICREDI_BOLETO_*`: boleto API, only read when `SICREDI_BOLETO_BASE_URL`
//!   is set
//! - `ZEDA_HTTP_TIMEOUT_MS`, `ZEDA_HTTP_MAX_RETRIES`,
//!   `ZEDA_HTTP_BACKOFF_BASE_MS`, `ZEDA_HTTP_BACKOFF_MAX_MS`,
//!   `ZEDA_HTTP_JITTER`, `ZEDA_BREAKER_THRESHOLD`, `ZEDA_BREAKER_RESET_MS`,
//!   `ZEDA_TOKEN_SKEW_MS`, `ZEDA_HTTP_SYSTEM_PROXY`: resilience tunables
//! - `ZEDA_LOG_LEVEL`, `ZEDA_LOG_JSON`: logging
//!
//! ## File Locations
//! The loader probes `zeda.{json,toml}` and `config.{json,toml}` in the
//! current directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use url::Url;
use zeda_domain::constants::{BOLETO_CONTEXT, BOLETO_DEFAULT_SCOPE, PIX_DEFAULT_SCOPE};
use zeda_domain::{
    ApiError, BoletoConfig, Config, LoggingConfig, MtlsConfig, PartnerApiConfig, PixConfig,
    ResilienceConfig, Result,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["zeda.json", "zeda.toml", "config.json", "config.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ApiError::Configuration` if configuration cannot be loaded from
/// either source or fails validation.
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "Failed to read .env file"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `ApiError::Configuration` if required variables are missing or
/// have invalid values.
pub fn load_from_env() -> Result<Config> {
    let partner = PartnerApiConfig {
        base_url: env_var("ZEDA_API_URL")?,
        partner_token: env_var("ZEDA_PARTNER_TOKEN")?,
        client_token: env_var("ZEDA_CLIENT_TOKEN")?,
    };

    let pix = match env_opt("SICREDI_PIX_BASE_URL") {
        Some(base_url) => Some(PixConfig {
            base_url,
            token_url: env_var("SICREDI_PIX_TOKEN_URL")?,
            basic_secret: env_opt("SICREDI_PIX_BASIC_SECRET"),
            client_id: env_opt("SICREDI_PIX_CLIENT_ID"),
            client_secret: env_opt("SICREDI_PIX_CLIENT_SECRET"),
            scope: env_opt("SICREDI_PIX_SCOPE").unwrap_or_else(|| PIX_DEFAULT_SCOPE.to_string()),
            pix_key: env_var("SICREDI_PIX_KEY")?,
            tls: MtlsConfig {
                cert_path: env_var("SICREDI_PIX_CERT_PATH")?.into(),
                key_path: env_var("SICREDI_PIX_KEY_PATH")?.into(),
                ca_path: env_opt("SICREDI_PIX_CA_PATH").map(PathBuf::from),
            },
        }),
        None => None,
    };

    let boleto = match env_opt("SICREDI_BOLETO_BASE_URL") {
        Some(base_url) => Some(BoletoConfig {
            base_url,
            auth_url: env_var("SICREDI_BOLETO_AUTH_URL")?,
            api_key: env_var("SICREDI_BOLETO_API_KEY")?,
            username: env_var("SICREDI_BOLETO_USERNAME")?,
            password: env_var("SICREDI_BOLETO_PASSWORD")?,
            cooperativa: env_var("SICREDI_BOLETO_COOPERATIVA")?,
            posto: env_var("SICREDI_BOLETO_POSTO")?,
            codigo_beneficiario: env_var("SICREDI_BOLETO_CODIGO_BENEFICIARIO")?,
            context: env_opt("SICREDI_BOLETO_CONTEXT")
                .unwrap_or_else(|| BOLETO_CONTEXT.to_string()),
            scope: env_opt("SICREDI_BOLETO_SCOPE")
                .unwrap_or_else(|| BOLETO_DEFAULT_SCOPE.to_string()),
        }),
        None => None,
    };

    let defaults = ResilienceConfig::default();
    let resilience = ResilienceConfig {
        timeout: env_millis("ZEDA_HTTP_TIMEOUT_MS", defaults.timeout)?,
        max_retries: env_parse("ZEDA_HTTP_MAX_RETRIES", defaults.max_retries)?,
        backoff_base: env_millis("ZEDA_HTTP_BACKOFF_BASE_MS", defaults.backoff_base)?,
        backoff_max: env_millis("ZEDA_HTTP_BACKOFF_MAX_MS", defaults.backoff_max)?,
        jitter: env_bool("ZEDA_HTTP_JITTER", defaults.jitter),
        breaker_threshold: env_parse("ZEDA_BREAKER_THRESHOLD", defaults.breaker_threshold)?,
        breaker_reset: env_millis("ZEDA_BREAKER_RESET_MS", defaults.breaker_reset)?,
        token_skew: env_millis("ZEDA_TOKEN_SKEW_MS", defaults.token_skew)?,
        system_proxy: env_bool("ZEDA_HTTP_SYSTEM_PROXY", defaults.system_proxy),
    };

    let logging_defaults = LoggingConfig::default();
    let logging = LoggingConfig {
        level: env_opt("ZEDA_LOG_LEVEL").unwrap_or(logging_defaults.level),
        json: env_bool("ZEDA_LOG_JSON", logging_defaults.json),
    };

    let config = Config { partner, pix, boleto, resilience, logging };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`]. The format is detected by file extension.
///
/// # Errors
/// Returns `ApiError::Configuration` if the file is missing, cannot be
/// parsed, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ApiError::config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ApiError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ApiError::config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ApiError::config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ApiError::config(format!("Invalid JSON format: {e}"))),
        _ => Err(ApiError::config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Full validation: field rules, parseable URLs, readable certificates
///
/// # Errors
/// Returns the first `ApiError::Configuration` found.
pub fn validate(config: &Config) -> Result<()> {
    config.validate()?;

    check_url("partner.base_url", &config.partner.base_url)?;
    if let Some(pix) = &config.pix {
        check_url("pix.base_url", &pix.base_url)?;
        check_url("pix.token_url", &pix.token_url)?;
        check_file("pix.tls.cert_path", &pix.tls.cert_path)?;
        check_file("pix.tls.key_path", &pix.tls.key_path)?;
        if let Some(ca) = &pix.tls.ca_path {
            check_file("pix.tls.ca_path", ca)?;
        }
    }
    if let Some(boleto) = &config.boleto {
        check_url("boleto.base_url", &boleto.base_url)?;
        check_url("boleto.auth_url", &boleto.auth_url)?;
    }
    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| ApiError::config(format!("{field} is not a valid URL ({value:?}): {e}")))?;
    if url.host_str().is_none() {
        return Err(ApiError::config(format!("{field} has no host: {value:?}")));
    }
    Ok(())
}

fn check_file(field: &str, path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(ApiError::config(format!("{field} does not exist: {}", path.display())));
    }
    Ok(())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key)
        .ok_or_else(|| ApiError::config(format!("Missing required environment variable: {key}")))
}

/// Optional environment variable; empty values count as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ApiError::config(format!("Invalid value for {key} ({raw:?}): {e}"))),
        None => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    match env_opt(key) {
        Some(_) => env_parse::<u64>(key, 0).map(Duration::from_millis),
        None => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

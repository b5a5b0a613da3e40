//! Tracing subscriber setup

use tracing_subscriber::{fmt, EnvFilter};
use zeda_domain::{ApiError, LoggingConfig};

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails if a global subscriber
/// is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ApiError> {
    let filter = env_filter(config);
    let installed = if config.json {
        fmt().with_env_filter(filter).json().with_target(false).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).compact().try_init()
    };
    installed.map_err(|err| ApiError::config(format!("Failed to install tracing subscriber: {err}")))
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back_to_info() {
        let config = LoggingConfig { level: "not a [level".into(), json: false };
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(env_filter(&config).to_string(), "info");
        }
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(ApiError::Configuration(_))));
    }
}

//! Composition root
//!
//! Builds one transport, circuit breaker and (for OAuth upstreams) token
//! cache per upstream credential set. Nothing is global: whoever owns
//! [`ApiClients`] owns every piece of shared state.

use std::sync::Arc;

use tracing::info;
use zeda_domain::constants::{UPSTREAM_BOLETO, UPSTREAM_PARTNER, UPSTREAM_PIX};
use zeda_domain::{ApiError, BoletoConfig, Config, PixConfig, ResilienceConfig};

use crate::api::{AccessTokenProvider, ApiClient, RequestExecutor};
use crate::auth::{ClientCredentialsAcquirer, PasswordGrantAcquirer, TokenCache};
use crate::http::{HttpTransport, TlsMode, Transport};
use crate::integrations::{SicrediBoletoClient, SicrediPixClient, ZedaClient};

/// Every configured upstream facade
#[derive(Debug)]
pub struct ApiClients {
    zeda: ZedaClient,
    pix: Option<SicrediPixClient>,
    boleto: Option<SicrediBoletoClient>,
}

impl ApiClients {
    /// Build the facades for every section present in `config`.
    ///
    /// # Errors
    /// [`ApiError::Configuration`] for invalid settings or unreadable
    /// certificate material.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        config.validate()?;
        let resilience = &config.resilience;

        let transport = system_transport(resilience)?;
        let executor = RequestExecutor::from_config(
            UPSTREAM_PARTNER,
            config.partner.base_url.as_str(),
            transport,
            resilience,
        )?;
        let zeda = ZedaClient::new(ApiClient::new(executor), &config.partner);

        let pix = config.pix.as_ref().map(|pix| build_pix(pix, resilience)).transpose()?;
        let boleto =
            config.boleto.as_ref().map(|boleto| build_boleto(boleto, resilience)).transpose()?;

        info!(pix = pix.is_some(), boleto = boleto.is_some(), "API clients ready");
        Ok(Self { zeda, pix, boleto })
    }

    pub fn zeda(&self) -> &ZedaClient {
        &self.zeda
    }

    /// # Errors
    /// [`ApiError::Configuration`] when the Pix section is not configured.
    pub fn pix(&self) -> Result<&SicrediPixClient, ApiError> {
        self.pix.as_ref().ok_or_else(|| ApiError::config("Sicredi Pix is not configured"))
    }

    /// # Errors
    /// [`ApiError::Configuration`] when the boleto section is not configured.
    pub fn boleto(&self) -> Result<&SicrediBoletoClient, ApiError> {
        self.boleto.as_ref().ok_or_else(|| ApiError::config("Sicredi boleto is not configured"))
    }
}

fn system_transport(resilience: &ResilienceConfig) -> Result<Arc<dyn Transport>, ApiError> {
    Ok(Arc::new(
        HttpTransport::builder()
            .timeout(resilience.timeout)
            .system_proxy(resilience.system_proxy)
            .build()?,
    ))
}

/// Token requests and API calls share the mTLS transport
fn build_pix(config: &PixConfig, resilience: &ResilienceConfig) -> Result<SicrediPixClient, ApiError> {
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::builder()
            .timeout(resilience.timeout)
            .system_proxy(resilience.system_proxy)
            .tls(TlsMode::Mutual(config.tls.clone()))
            .build()?,
    );
    let acquirer = ClientCredentialsAcquirer::from_config(Arc::clone(&transport), config)?;
    let tokens: Arc<dyn AccessTokenProvider> =
        Arc::new(TokenCache::new(Arc::new(acquirer), resilience.token_skew));
    let executor =
        RequestExecutor::from_config(UPSTREAM_PIX, config.base_url.as_str(), transport, resilience)?;
    Ok(SicrediPixClient::new(ApiClient::new(executor), tokens, config.pix_key.as_str()))
}

fn build_boleto(
    config: &BoletoConfig,
    resilience: &ResilienceConfig,
) -> Result<SicrediBoletoClient, ApiError> {
    let transport = system_transport(resilience)?;
    let acquirer = PasswordGrantAcquirer::new(Arc::clone(&transport), config);
    let tokens: Arc<dyn AccessTokenProvider> =
        Arc::new(TokenCache::new(Arc::new(acquirer), resilience.token_skew));
    let executor = RequestExecutor::from_config(
        UPSTREAM_BOLETO,
        config.base_url.as_str(),
        transport,
        resilience,
    )?;
    Ok(SicrediBoletoClient::new(ApiClient::new(executor), tokens, config))
}

#[cfg(test)]
mod tests {
    use zeda_domain::{LoggingConfig, MtlsConfig, PartnerApiConfig};

    use super::*;

    fn config() -> Config {
        Config {
            partner: PartnerApiConfig {
                base_url: "https://api.zeda.example".into(),
                partner_token: "partner".into(),
                client_token: "client".into(),
            },
            pix: None,
            boleto: Some(BoletoConfig {
                base_url: "https://api-parceiro.sicredi.example".into(),
                auth_url: "https://api-parceiro.sicredi.example/auth/openapi/token".into(),
                api_key: "k".into(),
                username: "u".into(),
                password: "p".into(),
                cooperativa: "0100".into(),
                posto: "03".into(),
                codigo_beneficiario: "12345".into(),
                context: "COBRANCA".into(),
                scope: "cobranca".into(),
            }),
            resilience: ResilienceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_builds_configured_facades_only() {
        let clients = ApiClients::from_config(&config()).unwrap();
        assert_eq!(clients.zeda().api().upstream(), "zeda");
        assert_eq!(clients.boleto().unwrap().api().upstream(), "sicredi-boleto");
        assert!(matches!(clients.pix(), Err(ApiError::Configuration(_))));
    }

    #[test]
    fn test_missing_client_certificate_fails_fast() {
        let mut config = config();
        config.pix = Some(PixConfig {
            base_url: "https://api-pix.sicredi.example".into(),
            token_url: "https://api-pix.sicredi.example/oauth/token".into(),
            basic_secret: Some("basic".into()),
            client_id: None,
            client_secret: None,
            scope: "cob.read".into(),
            pix_key: "pix@example.com".into(),
            tls: MtlsConfig {
                cert_path: "/nonexistent/cert.pem".into(),
                key_path: "/nonexistent/key.pem".into(),
                ca_path: None,
            },
        });

        assert!(matches!(ApiClients::from_config(&config), Err(ApiError::Configuration(_))));
    }
}

//! Sicredi cobrança API: hybrid boletos (boleto with Pix QR code)
//!
//! Authenticates with a refreshable password-grant token. Every call also
//! carries the `x-api-key`, `context`, `cooperativa` and `posto` headers.

use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use tracing::{info, instrument};
use zeda_common::{Clock, SystemClock};
use zeda_domain::constants::{
    HEADER_API_KEY, HEADER_CODIGO_BENEFICIARIO, HEADER_CONTEXT, HEADER_COOPERATIVA, HEADER_POSTO,
};
use zeda_domain::{
    BaixaAck, BankingError, BankingResult, BoletoConfig, BoletoDetails, BoletoStatus,
    CreateBoleto, CreatedBoleto, Pagador,
};

use crate::api::{
    encode_body, encode_path, AccessTokenProvider, ApiClient, AuthScheme, RequestSpec,
};

const BOLETOS_PATH: &str = "/cobranca/boleto/v1/boletos";

/// Facade over the Sicredi cobrança API
pub struct SicrediBoletoClient<C: Clock = SystemClock> {
    api: ApiClient<C>,
    auth: AuthScheme,
    api_key: String,
    context: String,
    cooperativa: String,
    posto: String,
    codigo_beneficiario: String,
}

impl<C: Clock> std::fmt::Debug for SicrediBoletoClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SicrediBoletoClient")
            .field("api", &self.api)
            .field("cooperativa", &self.cooperativa)
            .field("posto", &self.posto)
            .field("codigo_beneficiario", &self.codigo_beneficiario)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> SicrediBoletoClient<C> {
    pub fn new(api: ApiClient<C>, tokens: Arc<dyn AccessTokenProvider>, config: &BoletoConfig) -> Self {
        Self {
            api,
            auth: AuthScheme::OAuth(tokens),
            api_key: config.api_key.clone(),
            context: config.context.clone(),
            cooperativa: config.cooperativa.clone(),
            posto: config.posto.clone(),
            codigo_beneficiario: config.codigo_beneficiario.clone(),
        }
    }

    pub fn api(&self) -> &ApiClient<C> {
        &self.api
    }

    /// Hybrid boleto for `cents` issued by the configured beneficiary
    pub fn hybrid_boleto(
        &self,
        pagador: Pagador,
        seu_numero: impl Into<String>,
        vencimento: NaiveDate,
        cents: u64,
    ) -> CreateBoleto {
        CreateBoleto::hibrido(self.codigo_beneficiario.clone(), pagador, seu_numero, vencimento, cents)
    }

    /// Issue a boleto. Not retried after a transport failure.
    #[instrument(skip(self, boleto), fields(seu_numero = %boleto.seu_numero))]
    pub async fn create_boleto(&self, boleto: &CreateBoleto) -> BankingResult<CreatedBoleto> {
        let spec = self
            .with_headers(RequestSpec::new(Method::POST, BOLETOS_PATH))
            .json_body(encode_body(BOLETOS_PATH, boleto)?);
        let created: CreatedBoleto = self.api.json(&spec, &self.auth).await?;
        info!(nosso_numero = %created.nosso_numero, "boleto created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn query_boleto(&self, nosso_numero: &str) -> BankingResult<BoletoDetails> {
        let spec = self
            .with_headers(RequestSpec::new(Method::GET, BOLETOS_PATH))
            .query("codigoBeneficiario", &self.codigo_beneficiario)
            .query("nossoNumero", nosso_numero);
        Ok(self.api.json(&spec, &self.auth).await?)
    }

    /// Payment flags of a boleto.
    #[instrument(skip(self))]
    pub async fn boleto_status(&self, nosso_numero: &str) -> BankingResult<BoletoStatus> {
        Ok(self.query_boleto(nosso_numero).await?.status())
    }

    /// Write off (`baixa`) an open boleto.
    ///
    /// The boleto is read first; paid or already written-off boletos are
    /// refused without sending the command.
    #[instrument(skip(self))]
    pub async fn cancel_boleto(&self, nosso_numero: &str) -> BankingResult<BaixaAck> {
        let status = self.boleto_status(nosso_numero).await?;
        if status.is_paid || status.is_cancelled {
            return Err(BankingError::InvalidState {
                action: "cancel",
                id: nosso_numero.to_string(),
                status: status.raw,
                expected: "EM CARTEIRA".to_string(),
            });
        }

        let path = format!("{BOLETOS_PATH}{}", encode_path([nosso_numero, "baixa"])?);
        // A write-off is final, repeating it is safe
        let spec = self
            .with_headers(RequestSpec::new(Method::PATCH, &path))
            .header(HEADER_CODIGO_BENEFICIARIO, &self.codigo_beneficiario)
            .json_body(b"{}".to_vec())
            .idempotency_key(nosso_numero);
        let ack: Option<BaixaAck> = self.api.json(&spec, &self.auth).await?;
        info!(nosso_numero = %nosso_numero, "boleto written off");
        Ok(ack.unwrap_or_default())
    }

    fn with_headers(&self, spec: RequestSpec) -> RequestSpec {
        spec.header(HEADER_API_KEY, &self.api_key)
            .header(HEADER_CONTEXT, &self.context)
            .header(HEADER_COOPERATIVA, &self.cooperativa)
            .header(HEADER_POSTO, &self.posto)
    }
}

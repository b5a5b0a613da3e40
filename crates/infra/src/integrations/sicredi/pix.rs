//! Sicredi Pix API: immediate charges (`cob`) and notification webhooks
//!
//! Authenticates with a client-credentials token acquired over the same mTLS
//! transport as the API calls.
//!
//! Charge creation with a txid is a `PUT` to a txid-addressed URL, so the
//! upstream deduplicates retries; a repeat surfaces as
//! [`BankingError::ChargeAlreadyExists`], unless an earlier attempt of the
//! same call created a matching charge. Without a txid the charge is a plain
//! `POST` and is never repeated after a timeout or network failure.

use std::sync::Arc;

use reqwest::Method;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use zeda_common::{Clock, SystemClock};
use zeda_domain::{
    ApiError, BankingError, BankingResult, CreatePixCharge, PixCharge, PixChargeStatus,
    PixChargeStatusPatch, PixWebhook, Txid,
};

use crate::api::{
    encode_body, encode_path, AccessTokenProvider, ApiClient, AuthScheme, RequestSpec,
};

const COB_PATH: &str = "/api/v2/cob";
const WEBHOOK_PATH: &str = "/api/v2/webhook";

/// Facade over the Sicredi Pix API
pub struct SicrediPixClient<C: Clock = SystemClock> {
    api: ApiClient<C>,
    auth: AuthScheme,
    pix_key: String,
}

impl<C: Clock> std::fmt::Debug for SicrediPixClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SicrediPixClient")
            .field("api", &self.api)
            .field("pix_key", &self.pix_key)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> SicrediPixClient<C> {
    pub fn new(
        api: ApiClient<C>,
        tokens: Arc<dyn AccessTokenProvider>,
        pix_key: impl Into<String>,
    ) -> Self {
        Self { api, auth: AuthScheme::OAuth(tokens), pix_key: pix_key.into() }
    }

    pub fn api(&self) -> &ApiClient<C> {
        &self.api
    }

    /// Receiver key charges are created against by default
    pub fn pix_key(&self) -> &str {
        &self.pix_key
    }

    /// Fresh random txid (32 hex characters).
    pub fn generate_txid() -> BankingResult<Txid> {
        Txid::parse(Uuid::new_v4().simple().to_string())
    }

    /// Charge for `cents` against the configured receiver key
    pub fn charge(&self, cents: u64) -> CreatePixCharge {
        CreatePixCharge::new(self.pix_key.clone(), cents)
    }

    /// Create an immediate charge.
    ///
    /// With `txid` the request is idempotent and retried after transport
    /// failures; a charge that already exists under `txid` is reported as
    /// [`BankingError::ChargeAlreadyExists`]. When the conflict answers a
    /// retry, the stored charge is read back and returned if it carries the
    /// requested amount and key.
    #[instrument(skip(self, charge), fields(txid = txid.map(Txid::as_str)))]
    pub async fn create_charge(
        &self,
        charge: &CreatePixCharge,
        txid: Option<&Txid>,
    ) -> BankingResult<PixCharge> {
        let spec = match txid {
            Some(txid) => {
                let path = format!("{COB_PATH}/{txid}");
                RequestSpec::new(Method::PUT, &path)
                    .json_body(encode_body(&path, charge)?)
                    .idempotency_key(txid.as_str())
            }
            None => RequestSpec::new(Method::POST, COB_PATH).json_body(encode_body(COB_PATH, charge)?),
        };

        let (result, report) = self.api.json_with_report::<PixCharge>(&spec, &self.auth).await;
        match result {
            Ok(created) => {
                info!(txid = %created.txid, "pix charge created");
                Ok(created)
            }
            Err(err) => match txid {
                Some(txid) if is_duplicate_charge(&err) => {
                    if report.attempt_count() > 1 {
                        if let Some(existing) = self.own_earlier_charge(charge, txid).await? {
                            return Ok(existing);
                        }
                    }
                    warn!(txid = %txid, "pix charge already exists");
                    Err(BankingError::ChargeAlreadyExists { txid: txid.to_string() })
                }
                _ => Err(err.into()),
            },
        }
    }

    /// Charge stored under `txid` when it matches `requested`
    async fn own_earlier_charge(
        &self,
        requested: &CreatePixCharge,
        txid: &Txid,
    ) -> BankingResult<Option<PixCharge>> {
        let existing = self.get_charge(txid).await?;
        if existing.valor == requested.valor && existing.chave == requested.chave {
            info!(txid = %txid, "earlier attempt created the pix charge");
            Ok(Some(existing))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self), fields(txid = %txid))]
    pub async fn get_charge(&self, txid: &Txid) -> BankingResult<PixCharge> {
        Ok(self.api.get(&format!("{COB_PATH}/{txid}"), &self.auth).await?)
    }

    /// Cancel an active charge.
    ///
    /// The charge is read first; only `ATIVA` charges are patched to
    /// `REMOVIDA_PELO_USUARIO_RECEBEDOR`.
    #[instrument(skip(self), fields(txid = %txid))]
    pub async fn cancel_charge(&self, txid: &Txid) -> BankingResult<PixCharge> {
        let current = self.get_charge(txid).await?;
        if current.status != PixChargeStatus::Ativa {
            return Err(BankingError::InvalidState {
                action: "cancel",
                id: txid.to_string(),
                status: current.status.to_string(),
                expected: PixChargeStatus::Ativa.to_string(),
            });
        }

        let path = format!("{COB_PATH}/{txid}");
        let patch = PixChargeStatusPatch { status: PixChargeStatus::RemovidaPeloUsuarioRecebedor };
        // Setting a final status is safe to repeat
        let spec = RequestSpec::new(Method::PATCH, &path)
            .json_body(encode_body(&path, &patch)?)
            .idempotency_key(txid.as_str());
        let cancelled: PixCharge = self.api.json(&spec, &self.auth).await?;
        info!(txid = %txid, "pix charge cancelled");
        Ok(cancelled)
    }

    /// Register the notification callback for the configured key.
    #[instrument(skip(self, webhook_url))]
    pub async fn register_webhook(&self, webhook_url: &str) -> BankingResult<()> {
        let path = self.webhook_path()?;
        let body = PixWebhook { webhook_url: webhook_url.to_string(), chave: None, criacao: None };
        let spec = RequestSpec::new(Method::PUT, &path).json_body(encode_body(&path, &body)?);
        self.api.send(&spec, &self.auth).await?;
        info!(chave = %self.pix_key, "pix webhook registered");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_webhook(&self) -> BankingResult<PixWebhook> {
        Ok(self.api.get(&self.webhook_path()?, &self.auth).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_webhook(&self) -> BankingResult<()> {
        let spec = RequestSpec::new(Method::DELETE, self.webhook_path()?);
        self.api.send(&spec, &self.auth).await?;
        info!(chave = %self.pix_key, "pix webhook deleted");
        Ok(())
    }

    fn webhook_path(&self) -> Result<String, ApiError> {
        Ok(format!("{WEBHOOK_PATH}{}", encode_path([self.pix_key.as_str()])?))
    }
}

/// The PSP answers a repeated txid with 409, or with a 4xx whose body says
/// the charge already exists.
fn is_duplicate_charge(err: &ApiError) -> bool {
    let ApiError::Terminal { status, body, .. } = err else {
        return false;
    };
    if *status == 409 {
        return true;
    }
    let body = body.to_lowercase();
    ["already exists", "já existe", "ja existe"].iter().any(|marker| body.contains(marker))
}

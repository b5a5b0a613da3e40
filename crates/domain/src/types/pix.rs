//! Pix immediate charge (`cob`) payloads

use serde::{Deserialize, Serialize};

use crate::errors::BankingError;
use crate::impl_domain_status_conversions;

/// Default charge lifetime, in seconds
pub const DEFAULT_EXPIRATION_SECS: u32 = 3600;

/// Validated Pix transaction id: 26 to 35 ASCII alphanumerics
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Txid(String);

impl Txid {
    pub const MIN_LEN: usize = 26;
    pub const MAX_LEN: usize = 35;

    pub fn parse(value: impl Into<String>) -> Result<Self, BankingError> {
        let value = value.into();
        let valid_len = (Self::MIN_LEN..=Self::MAX_LEN).contains(&value.len());
        if valid_len && value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(value))
        } else {
            Err(BankingError::InvalidTxid(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Txid {
    type Error = BankingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Txid> for String {
    fn from(txid: Txid) -> Self {
        txid.0
    }
}

impl std::fmt::Display for Txid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a Pix charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixChargeStatus {
    Ativa,
    Concluida,
    RemovidaPeloUsuarioRecebedor,
    RemovidaPeloPsp,
}

impl_domain_status_conversions!(PixChargeStatus {
    Ativa => "ATIVA",
    Concluida => "CONCLUIDA",
    RemovidaPeloUsuarioRecebedor => "REMOVIDA_PELO_USUARIO_RECEBEDOR",
    RemovidaPeloPsp => "REMOVIDA_PELO_PSP",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendario {
    pub expiracao: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criacao: Option<String>,
}

/// Payer identification; exactly one of `cpf`/`cnpj` is expected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Devedor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    pub nome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valor {
    /// Decimal amount with two places, e.g. `"10.50"`
    pub original: String,
}

impl Valor {
    pub fn from_cents(cents: u64) -> Self {
        Self { original: format!("{}.{:02}", cents / 100, cents % 100) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoAdicional {
    pub nome: String,
    pub valor: String,
}

/// Body of `PUT /api/v2/cob/{txid}` and `POST /api/v2/cob`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePixCharge {
    pub calendario: Calendario,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devedor: Option<Devedor>,
    pub valor: Valor,
    pub chave: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solicitacao_pagador: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_adicionais: Vec<InfoAdicional>,
}

impl CreatePixCharge {
    /// Charge for `cents` against the receiver key `chave`
    pub fn new(chave: impl Into<String>, cents: u64) -> Self {
        Self {
            calendario: Calendario { expiracao: DEFAULT_EXPIRATION_SECS, criacao: None },
            devedor: None,
            valor: Valor::from_cents(cents),
            chave: chave.into(),
            solicitacao_pagador: None,
            info_adicionais: Vec::new(),
        }
    }
}

/// Settled payment attached to a concluded charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixPayment {
    pub end_to_end_id: String,
    pub valor: String,
    #[serde(default)]
    pub horario: Option<String>,
}

/// Charge as returned by the PSP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixCharge {
    pub txid: String,
    #[serde(default)]
    pub revisao: u32,
    pub status: PixChargeStatus,
    pub calendario: Calendario,
    pub valor: Valor,
    pub chave: String,
    #[serde(default)]
    pub devedor: Option<Devedor>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pix_copia_e_cola: Option<String>,
    #[serde(default)]
    pub solicitacao_pagador: Option<String>,
    #[serde(default)]
    pub pix: Vec<PixPayment>,
}

/// Body of `PATCH /api/v2/cob/{txid}` used to cancel a charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixChargeStatusPatch {
    pub status: PixChargeStatus,
}

/// Notification callback registered for a Pix key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixWebhook {
    pub webhook_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chave: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criacao: Option<String>,
}

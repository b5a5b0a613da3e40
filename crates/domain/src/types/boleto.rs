//! Hybrid boleto (boleto with Pix QR code) payloads and status mapping

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoPessoa {
    PessoaFisica,
    PessoaJuridica,
}

impl_domain_status_conversions!(TipoPessoa {
    PessoaFisica => "PESSOA_FISICA",
    PessoaJuridica => "PESSOA_JURIDICA",
});

impl TipoPessoa {
    /// Infer the person type from a CPF (11 digits) or CNPJ (14 digits)
    pub fn from_documento(documento: &str) -> Option<Self> {
        match documento.chars().filter(char::is_ascii_digit).count() {
            11 => Some(Self::PessoaFisica),
            14 => Some(Self::PessoaJuridica),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagador {
    pub tipo_pessoa: TipoPessoa,
    pub documento: String,
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endereco: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
}

/// Body of `POST /cobranca/boleto/v1/boletos`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoleto {
    /// Always `HIBRIDO` for this client
    pub tipo_cobranca: String,
    pub codigo_beneficiario: String,
    pub pagador: Pagador,
    pub especie_documento: String,
    /// Caller reference, unique per beneficiary
    pub seu_numero: String,
    pub data_vencimento: NaiveDate,
    pub valor: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mensagens: Vec<String>,
}

impl CreateBoleto {
    pub const TIPO_HIBRIDO: &'static str = "HIBRIDO";
    pub const ESPECIE_DEFAULT: &'static str = "DUPLICATA_MERCANTIL_INDICACAO";

    /// Hybrid boleto for `cents`, due on `data_vencimento`
    pub fn hibrido(
        codigo_beneficiario: impl Into<String>,
        pagador: Pagador,
        seu_numero: impl Into<String>,
        data_vencimento: NaiveDate,
        cents: u64,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let valor = cents as f64 / 100.0;
        Self {
            tipo_cobranca: Self::TIPO_HIBRIDO.to_string(),
            codigo_beneficiario: codigo_beneficiario.into(),
            pagador,
            especie_documento: Self::ESPECIE_DEFAULT.to_string(),
            seu_numero: seu_numero.into(),
            data_vencimento,
            valor,
            mensagens: Vec::new(),
        }
    }
}

/// Response of the create endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBoleto {
    pub nosso_numero: String,
    #[serde(default)]
    pub linha_digitavel: String,
    #[serde(default)]
    pub codigo_barras: String,
    #[serde(default)]
    pub txid: Option<String>,
    /// Pix copy-and-paste payload
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub cooperativa: Option<String>,
    #[serde(default)]
    pub posto: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DadosLiquidacao {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub valor: Option<f64>,
}

/// Boleto as returned by the query endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoletoDetails {
    pub nosso_numero: String,
    pub situacao: String,
    #[serde(default)]
    pub seu_numero: Option<String>,
    #[serde(default)]
    pub linha_digitavel: Option<String>,
    #[serde(default)]
    pub codigo_barras: Option<String>,
    #[serde(default)]
    pub data_vencimento: Option<NaiveDate>,
    #[serde(default)]
    pub valor_nominal: Option<f64>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub dados_liquidacao: Option<DadosLiquidacao>,
}

impl BoletoDetails {
    pub fn status(&self) -> BoletoStatus {
        map_boleto_situacao(&self.situacao)
    }
}

/// Acknowledgement of a write-off (`baixa`) command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaixaAck {
    pub transaction_id: Option<String>,
    pub status_comando: Option<String>,
    pub data_movimento: Option<String>,
    pub nosso_numero: Option<String>,
}

/// Payment flags derived from a boleto `situacao`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoletoStatus {
    pub is_paid: bool,
    pub is_cancelled: bool,
    /// Upstream value, unchanged
    pub raw: String,
}

/// Map an upstream `situacao` to payment flags.
///
/// Every `LIQUIDADO*` variant (e.g. `LIQUIDADO REDE`, `LIQUIDADO CARTORIO`)
/// is paid; every `BAIXADO*` variant is cancelled. Anything else, including
/// `EM CARTEIRA` and values not known yet, leaves both flags false.
pub fn map_boleto_situacao(situacao: &str) -> BoletoStatus {
    let normalized = situacao.trim().to_ascii_uppercase();
    BoletoStatus {
        is_paid: normalized.starts_with("LIQUIDADO"),
        is_cancelled: normalized.starts_with("BAIXADO"),
        raw: situacao.to_string(),
    }
}

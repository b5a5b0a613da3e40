//! Wire and domain types for the partner/instance and banking upstreams

pub mod boleto;
pub mod instance;
pub mod pix;

pub use boleto::{
    map_boleto_situacao, BaixaAck, BoletoDetails, BoletoStatus, CreateBoleto, CreatedBoleto,
    DadosLiquidacao, Pagador, TipoPessoa,
};
pub use instance::{
    CreateInstanceRequest, CreatedInstance, DeviceInfo, DeviceMetadata, EveryWebhooksUpdate,
    InstancePage, InstanceStatus, InstanceSummary, LifecycleAck, ListInstancesQuery,
    NotifySentByMeUpdate, PhoneCode, QrCodeImage, ValueAck, ValueUpdate, WebhookKind,
    WebhookSettings, WebhookUpdateAck,
};
pub use pix::{
    Calendario, CreatePixCharge, Devedor, InfoAdicional, PixCharge, PixChargeStatus,
    PixChargeStatusPatch, PixPayment, PixWebhook, Txid, Valor,
};

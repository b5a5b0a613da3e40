//! Partner/instance API payloads
//!
//! Field names follow the upstream's camelCase JSON.

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Callback URLs and flags shared by instance creation and webhook updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_and_delivery_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnected_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_status_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_chat_callback_url: Option<String>,
    #[serde(default)]
    pub notify_sent_by_me: bool,
}

/// Body of `POST /instances/integrator/on-demand`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(flatten)]
    pub webhooks: WebhookSettings,
    #[serde(default)]
    pub call_reject_auto: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_reject_message: Option<String>,
    #[serde(default)]
    pub auto_read_message: bool,
    #[serde(default)]
    pub is_device: bool,
    #[serde(default)]
    pub business_device: bool,
}

impl CreateInstanceRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

/// Instance returned by the create endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInstance {
    /// Instance id used in instance-scoped routes
    pub id: String,
    /// Instance token used in instance-scoped routes
    pub token: String,
    /// Subscription due date, epoch milliseconds
    #[serde(default)]
    pub due: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub session_name: String,
    #[serde(default)]
    pub subscription_active: bool,
    #[serde(default)]
    pub call_reject_auto: bool,
    #[serde(default)]
    pub call_reject_message: Option<String>,
    #[serde(default)]
    pub auto_read_message: bool,
    #[serde(default)]
    pub middleware: String,
    #[serde(default)]
    pub webhooks: Option<WebhookSettings>,
    #[serde(default)]
    pub created_at: String,
}

/// Query of `GET /instances`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInstancesQuery {
    pub page: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middleware: Option<String>,
}

impl Default for ListInstancesQuery {
    fn default() -> Self {
        Self { page: 1, page_size: 15, query: None, middleware: None }
    }
}

/// One row of the instance listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub id: String,
    pub token: String,
    #[serde(default)]
    pub due: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub phone_connected: bool,
    #[serde(default)]
    pub whatsapp_connected: bool,
    #[serde(default)]
    pub middleware: String,
    #[serde(flatten)]
    pub webhooks: WebhookSettings,
}

/// Page of instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePage {
    pub total: u64,
    pub total_page: u32,
    pub page_size: u32,
    pub page: u32,
    #[serde(default)]
    pub content: Vec<InstanceSummary>,
}

/// `{"status": "..."}` acknowledgement of partner lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleAck {
    pub status: String,
}

/// `{"value": true}` acknowledgement of instance actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueAck {
    pub value: bool,
}

/// Connection status of an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub connected: bool,
    #[serde(default)]
    pub store_jid: Option<String>,
    #[serde(default)]
    pub last_connected: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub auto_reconnect: bool,
    #[serde(default)]
    pub worker_assigned: String,
    #[serde(default)]
    pub subscription_active: bool,
}

/// Base64 QR code image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCodeImage {
    pub image: String,
}

/// Pairing code for phone-number login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneCode {
    pub code: String,
}

/// Device metadata reported by a paired instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceInfo {
    pub phone: String,
    pub name: String,
    pub device: DeviceMetadata,
    pub session_id: i64,
    pub is_business: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceMetadata {
    pub session_name: String,
    pub wa_version: String,
    pub mcc: String,
    pub mnc: String,
    pub os_version: String,
    pub device_manufacturer: String,
    pub device_model: String,
}

/// Webhook slots that can be updated one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    Delivery,
    Received,
    ReceivedDelivery,
    MessageStatus,
    Disconnected,
    Connected,
    ChatPresence,
}

impl_domain_status_conversions!(WebhookKind {
    Delivery => "delivery",
    Received => "received",
    ReceivedDelivery => "received-delivery",
    MessageStatus => "message-status",
    Disconnected => "disconnected",
    Connected => "connected",
    ChatPresence => "chat-presence",
});

impl WebhookKind {
    pub const ALL: [WebhookKind; 7] = [
        WebhookKind::Delivery,
        WebhookKind::Received,
        WebhookKind::ReceivedDelivery,
        WebhookKind::MessageStatus,
        WebhookKind::Disconnected,
        WebhookKind::Connected,
        WebhookKind::ChatPresence,
    ];

    /// Route segment under the instance path
    pub fn route(self) -> String {
        format!("update-webhook-{}", self.as_str())
    }
}

/// `{"value": ...}` body used by the single-value update routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueUpdate<T> {
    pub value: T,
}

/// Body of `update-every-webhooks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EveryWebhooksUpdate {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_sent_by_me: Option<bool>,
}

/// Body of `update-notify-sent-by-me`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifySentByMeUpdate {
    pub notify_sent_by_me: bool,
}

/// Response of the webhook update routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookUpdateAck {
    pub value: bool,
    #[serde(default)]
    pub webhooks: Option<WebhookSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_flattens_webhooks() {
        let mut request = CreateInstanceRequest::new("support");
        request.webhooks.received_callback_url = Some("https://hooks.example/rx".into());
        request.call_reject_auto = true;

        let json = serde_json::to_value(&request).expect("serializes");

        assert_eq!(json["name"], "support");
        assert_eq!(json["receivedCallbackUrl"], "https://hooks.example/rx");
        assert_eq!(json["callRejectAuto"], true);
        assert!(json.get("deliveryCallbackUrl").is_none());
        assert!(json.get("sessionName").is_none());
    }

    #[test]
    fn test_instance_page_decodes_listing() {
        let page: InstancePage = serde_json::from_str(
            r#"{"total":1,"totalPage":1,"pageSize":15,"page":1,"content":[
                {"id":"i-1","token":"t-1","due":1700000000000,"name":"a",
                 "phoneConnected":true,"middleware":"web",
                 "deliveryCallbackUrl":"https://d"}]}"#,
        )
        .expect("decodes");

        assert_eq!(page.content.len(), 1);
        assert!(page.content[0].phone_connected);
        assert_eq!(page.content[0].webhooks.delivery_callback_url.as_deref(), Some("https://d"));
    }

    #[test]
    fn test_webhook_kind_routes() {
        assert_eq!(WebhookKind::ReceivedDelivery.route(), "update-webhook-received-delivery");
        assert_eq!(WebhookKind::ChatPresence.route(), "update-webhook-chat-presence");
        assert_eq!("message-status".parse::<WebhookKind>(), Ok(WebhookKind::MessageStatus));
        assert_eq!(WebhookKind::ALL.len(), 7);
    }
}

//! Partner/instance API client
//!
//! Partner operations authenticate with the static partner Bearer token;
//! instance-scoped operations send the account `Client-Token` header and
//! address the instance as `/instances/{id}/token/{token}`. Both share one
//! executor and therefore one circuit breaker.

use reqwest::Method;
use serde::Serialize;
use tracing::{info, instrument};
use zeda_common::{Clock, SystemClock};
use zeda_domain::{
    ApiError, CreateInstanceRequest, CreatedInstance, DeviceInfo, EveryWebhooksUpdate,
    InstancePage, InstanceStatus, LifecycleAck, ListInstancesQuery, NotifySentByMeUpdate,
    PartnerApiConfig, PhoneCode, QrCodeImage, ValueAck, ValueUpdate, WebhookKind,
    WebhookUpdateAck,
};

use crate::api::{encode_body, encode_path, ApiClient, AuthScheme, RequestSpec};

/// Identifies one instance in instance-scoped routes
#[derive(Debug, Clone, Copy)]
pub struct InstanceRef<'a> {
    pub id: &'a str,
    pub token: &'a str,
}

impl<'a> InstanceRef<'a> {
    pub fn new(id: &'a str, token: &'a str) -> Self {
        Self { id, token }
    }

    fn route(&self, suffix: &str) -> Result<String, ApiError> {
        encode_path(["instances", self.id, "token", self.token].into_iter().chain(suffix.split('/')))
    }
}

/// Facade over the partner/instance upstream
pub struct ZedaClient<C: Clock = SystemClock> {
    api: ApiClient<C>,
    partner: AuthScheme,
    instance: AuthScheme,
}

impl<C: Clock> std::fmt::Debug for ZedaClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZedaClient").field("api", &self.api).finish_non_exhaustive()
    }
}

impl<C: Clock> ZedaClient<C> {
    pub fn new(api: ApiClient<C>, config: &PartnerApiConfig) -> Self {
        Self {
            api,
            partner: AuthScheme::Bearer(config.partner_token.clone()),
            instance: AuthScheme::ClientToken(config.client_token.clone()),
        }
    }

    pub fn api(&self) -> &ApiClient<C> {
        &self.api
    }

    // ---------------------------------------------------------------------
    // Partner operations
    // ---------------------------------------------------------------------

    /// Provision a new instance. Not retried after a transport failure.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<CreatedInstance, ApiError> {
        let created: CreatedInstance = self
            .api
            .post("/instances/integrator/on-demand", request, &self.partner)
            .await?;
        info!(instance_id = %created.id, "instance created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list_instances(&self, query: &ListInstancesQuery) -> Result<InstancePage, ApiError> {
        let mut spec = RequestSpec::new(Method::GET, "/instances")
            .query("page", query.page.to_string())
            .query("pageSize", query.page_size.to_string());
        if let Some(text) = &query.query {
            spec = spec.query("query", text);
        }
        if let Some(middleware) = &query.middleware {
            spec = spec.query("middleware", middleware);
        }
        self.api.json(&spec, &self.partner).await
    }

    #[instrument(skip(self))]
    pub async fn delete_instance(&self, id: &str) -> Result<(), ApiError> {
        let spec = RequestSpec::new(Method::DELETE, encode_path(["instances", id])?);
        self.api.send(&spec, &self.partner).await?;
        info!(instance_id = %id, "instance deleted");
        Ok(())
    }

    /// Activate the instance subscription.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn subscribe_instance(&self, instance: InstanceRef<'_>) -> Result<LifecycleAck, ApiError> {
        let path = instance.route("integrator/on-demand/subscription")?;
        self.api.json(&RequestSpec::new(Method::POST, path), &self.partner).await
    }

    /// Cancel the instance subscription.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn cancel_instance(&self, instance: InstanceRef<'_>) -> Result<LifecycleAck, ApiError> {
        let path = instance.route("integrator/on-demand/cancel")?;
        self.api.json(&RequestSpec::new(Method::POST, path), &self.partner).await
    }

    // ---------------------------------------------------------------------
    // Instance-scoped operations
    // ---------------------------------------------------------------------

    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn status(&self, instance: InstanceRef<'_>) -> Result<InstanceStatus, ApiError> {
        self.api.get(&instance.route("status")?, &self.instance).await
    }

    /// Raw QR code payload, returned as plain text.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn qr_code(&self, instance: InstanceRef<'_>) -> Result<String, ApiError> {
        let spec = RequestSpec::new(Method::GET, instance.route("qr-code")?);
        self.api.text(&spec, &self.instance).await
    }

    /// QR code as a base64 image.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn qr_code_image(&self, instance: InstanceRef<'_>) -> Result<QrCodeImage, ApiError> {
        self.api.get(&instance.route("qr-code/image")?, &self.instance).await
    }

    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn device(&self, instance: InstanceRef<'_>) -> Result<DeviceInfo, ApiError> {
        self.api.get(&instance.route("device")?, &self.instance).await
    }

    /// Pairing code for logging in with a phone number instead of a QR code.
    #[instrument(skip(self, instance, phone), fields(instance_id = %instance.id))]
    pub async fn phone_code(&self, instance: InstanceRef<'_>, phone: &str) -> Result<PhoneCode, ApiError> {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(ApiError::config("phone number must contain digits"));
        }
        self.api.get(&instance.route(&format!("phone-code/{digits}"))?, &self.instance).await
    }

    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn restart(&self, instance: InstanceRef<'_>) -> Result<ValueAck, ApiError> {
        self.api.get(&instance.route("restart")?, &self.instance).await
    }

    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn disconnect(&self, instance: InstanceRef<'_>) -> Result<ValueAck, ApiError> {
        self.api.get(&instance.route("disconnect")?, &self.instance).await
    }

    /// Point one webhook slot at `url`.
    #[instrument(skip(self, instance, url), fields(instance_id = %instance.id, kind = %kind))]
    pub async fn update_webhook(
        &self,
        instance: InstanceRef<'_>,
        kind: WebhookKind,
        url: &str,
    ) -> Result<WebhookUpdateAck, ApiError> {
        self.put_value(instance, &kind.route(), &ValueUpdate { value: url }).await
    }

    /// Point every webhook slot at the same `url`.
    #[instrument(skip(self, instance, url), fields(instance_id = %instance.id))]
    pub async fn update_every_webhooks(
        &self,
        instance: InstanceRef<'_>,
        url: &str,
        notify_sent_by_me: Option<bool>,
    ) -> Result<WebhookUpdateAck, ApiError> {
        let body = EveryWebhooksUpdate { value: url.to_string(), notify_sent_by_me };
        self.put_value(instance, "update-every-webhooks", &body).await
    }

    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn update_notify_sent_by_me(
        &self,
        instance: InstanceRef<'_>,
        enabled: bool,
    ) -> Result<WebhookUpdateAck, ApiError> {
        let body = NotifySentByMeUpdate { notify_sent_by_me: enabled };
        self.put_value(instance, "update-notify-sent-by-me", &body).await
    }

    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn update_call_reject_auto(
        &self,
        instance: InstanceRef<'_>,
        enabled: bool,
    ) -> Result<ValueAck, ApiError> {
        self.put_value(instance, "update-call-reject-auto", &ValueUpdate { value: enabled }).await
    }

    #[instrument(skip(self, instance, message), fields(instance_id = %instance.id))]
    pub async fn update_call_reject_message(
        &self,
        instance: InstanceRef<'_>,
        message: &str,
    ) -> Result<ValueAck, ApiError> {
        self.put_value(instance, "update-call-reject-message", &ValueUpdate { value: message }).await
    }

    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn update_auto_read_message(
        &self,
        instance: InstanceRef<'_>,
        enabled: bool,
    ) -> Result<ValueAck, ApiError> {
        self.put_value(instance, "update-auto-read-message", &ValueUpdate { value: enabled }).await
    }

    async fn put_value<B, R>(&self, instance: InstanceRef<'_>, route: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let path = instance.route(route)?;
        let spec = RequestSpec::new(Method::PUT, &path).json_body(encode_body(&path, body)?);
        self.api.json(&spec, &self.instance).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zeda_common::{CircuitBreaker, RetryConfig};

    use super::*;
    use crate::api::RequestExecutor;
    use crate::http::client::local_transport;
    use crate::http::Transport;

    fn client(server: &MockServer) -> ZedaClient {
        let transport: Arc<dyn Transport> = Arc::new(local_transport());
        let retry = RetryConfig::builder()
            .max_retries(3)
            .exponential_backoff(Duration::from_millis(5), 2.0, Duration::from_millis(20))
            .build()
            .unwrap();
        let executor = RequestExecutor::new(
            "zeda",
            server.uri(),
            transport,
            CircuitBreaker::new(Default::default()).unwrap(),
            retry,
        )
        .unwrap();
        let config = PartnerApiConfig {
            base_url: server.uri(),
            partner_token: "partner-token".into(),
            client_token: "client-token".into(),
        };
        ZedaClient::new(ApiClient::new(executor), &config)
    }

    const INSTANCE: InstanceRef<'static> = InstanceRef { id: "i-1", token: "t-1" };

    #[tokio::test]
    async fn test_create_instance_uses_partner_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instances/integrator/on-demand"))
            .and(header("authorization", "Bearer partner-token"))
            .and(body_json(serde_json::json!({
                "name": "support",
                "notifySentByMe": false,
                "callRejectAuto": false,
                "autoReadMessage": false,
                "isDevice": false,
                "businessDevice": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "i-1", "token": "t-1", "due": 1_700_000_000_000_i64
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client(&server)
            .create_instance(&CreateInstanceRequest::new("support"))
            .await
            .unwrap();
        assert_eq!(created.id, "i-1");
        assert_eq!(created.token, "t-1");
    }

    #[tokio::test]
    async fn test_list_instances_sends_paging_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instances"))
            .and(query_param("page", "2"))
            .and(query_param("pageSize", "10"))
            .and(query_param("query", "sales"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 0, "totalPage": 0, "pageSize": 10, "page": 2, "content": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = ListInstancesQuery {
            page: 2,
            page_size: 10,
            query: Some("sales".into()),
            middleware: None,
        };
        let page = client(&server).list_instances(&query).await.unwrap();
        assert_eq!(page.page, 2);
        assert!(page.content.is_empty());
    }

    #[tokio::test]
    async fn test_instance_routes_use_client_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instances/i-1/token/t-1/status"))
            .and(header("client-token", "client-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "connected": true, "smartphoneConnected": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let status = client(&server).status(INSTANCE).await.unwrap();
        assert!(status.connected);
    }

    #[tokio::test]
    async fn test_qr_code_is_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instances/i-1/token/t-1/qr-code"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2@qr-payload"))
            .mount(&server)
            .await;

        assert_eq!(client(&server).qr_code(INSTANCE).await.unwrap(), "2@qr-payload");
    }

    #[tokio::test]
    async fn test_update_webhook_route_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/instances/i-1/token/t-1/update-webhook-received-delivery"))
            .and(header_exists("client-token"))
            .and(body_json(serde_json::json!({"value": "https://hooks.example/rx"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ack = client(&server)
            .update_webhook(INSTANCE, WebhookKind::ReceivedDelivery, "https://hooks.example/rx")
            .await
            .unwrap();
        assert!(ack.value);
    }

    #[tokio::test]
    async fn test_phone_code_strips_formatting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instances/i-1/token/t-1/phone-code/5511999990000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "ABCD-1234"
            })))
            .mount(&server)
            .await;

        let zeda = client(&server);
        let code = zeda.phone_code(INSTANCE, "+55 (11) 99999-0000").await.unwrap();
        assert_eq!(code.code, "ABCD-1234");
        assert!(matches!(
            zeda.phone_code(INSTANCE, "n/a").await,
            Err(ApiError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_instance_ignores_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_instance("i-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_instance_credentials_cannot_escape_their_segments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/instances/i%2F1/token/t%3Fpage=2%23x/restart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": true})))
            .expect(1)
            .mount(&server)
            .await;

        let ack = client(&server).restart(InstanceRef::new("i/1", "t?page=2#x")).await.unwrap();
        assert!(ack.value);
    }

    #[tokio::test]
    async fn test_dot_segment_id_is_rejected_before_io() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server).delete_instance("..").await.unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
        let err = client(&server).status(InstanceRef::new("", "t-1")).await.unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }
}

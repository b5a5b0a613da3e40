use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Certificate, Client as ReqwestClient, Identity, Method};
use serde::de::DeserializeOwned;
use tracing::debug;
use zeda_domain::constants::DEFAULT_TIMEOUT_MS;
use zeda_domain::{ApiError, MtlsConfig};

use crate::errors::conversions::{invalid_pem, read_pem, FailureContext, IntoApiError};

/// One fully built outbound request.
///
/// `path` is the upstream-relative path used in logs and error context; `url`
/// is what actually goes on the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Add a header, rejecting values that cannot be sent.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiError::config(format!("Invalid header name {name:?}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ApiError::config(format!("Invalid value for header {name}")))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status, headers and fully buffered body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode a JSON body. Empty bodies and 204/205 decode from `null`, so
    /// `()` and `Option<T>` targets accept them.
    pub fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let decoded = if self.status == 204 || self.status == 205 || self.body.is_empty() {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };
        decoded.map_err(|err| ApiError::Decode { path: path.to_string(), message: err.to_string() })
    }

    /// Numeric `Retry-After` header, in seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Classify a non-success response.
    pub fn into_error(self, path: &str) -> ApiError {
        let retry_after = self.retry_after();
        ApiError::from_status(path, self.status, &self.text(), retry_after)
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations classify transport failures ([`ApiError::Timeout`],
/// [`ApiError::Network`]) and must not interpret HTTP status codes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// TLS setup for one upstream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Standard TLS trusting the system roots
    #[default]
    System,
    /// Present a client certificate on every request, optionally trusting an
    /// extra CA bundle
    Mutual(MtlsConfig),
}

/// reqwest-backed [`Transport`].
///
/// A hard timeout wraps connect, send and the full body read. Dropping the
/// request future on timeout releases the connection.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    timeout: Duration,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, ApiError> {
        Self::builder().build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let HttpRequest { method, url, path, headers, body } = request;
        let context = FailureContext { path: &path, timeout: self.timeout };

        let mut builder = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        debug!(%method, path = %path, "sending HTTP request");

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(HttpResponse { status, headers, body: body.to_vec() })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => {
                debug!(%method, path = %path, status = response.status, "received HTTP response");
                Ok(response)
            }
            Ok(Err(err)) => {
                debug!(%method, path = %path, error = %err, "HTTP request failed");
                Err(err.into_api_error(context))
            }
            Err(elapsed) => {
                debug!(%method, path = %path, "HTTP request timed out");
                Err(elapsed.into_api_error(context))
            }
        }
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    tls: TlsMode,
    system_proxy: bool,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: None,
            default_headers: None,
            tls: TlsMode::System,
            system_proxy: true,
        }
    }
}

impl HttpTransportBuilder {
    /// Hard per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Honor the proxy environment variables (the default). When off, every
    /// request connects directly.
    pub fn system_proxy(mut self, enabled: bool) -> Self {
        self.system_proxy = enabled;
        self
    }

    /// Build the transport, reading and parsing certificate material once.
    ///
    /// # Errors
    /// [`ApiError::Configuration`] when a certificate, key or CA file is
    /// missing or not valid PEM.
    pub fn build(self) -> Result<HttpTransport, ApiError> {
        let agent = self
            .user_agent
            .unwrap_or_else(|| format!("zeda-client/{}", env!("CARGO_PKG_VERSION")));
        let mut builder = ReqwestClient::builder()
            .use_rustls_tls()
            .timeout(self.timeout)
            .user_agent(agent);
        if !self.system_proxy {
            builder = builder.no_proxy();
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        if let TlsMode::Mutual(mtls) = &self.tls {
            let mut pem = read_pem("client certificate", &mtls.cert_path)?;
            let key = read_pem("private key", &mtls.key_path)?;
            pem.push(b'\n');
            pem.extend_from_slice(&key);
            let identity = Identity::from_pem(&pem)
                .map_err(|err| invalid_pem("client identity", &mtls.cert_path, &err))?;
            builder = builder.identity(identity);

            if let Some(ca_path) = &mtls.ca_path {
                let bundle = read_pem("CA bundle", ca_path)?;
                let certificates = Certificate::from_pem_bundle(&bundle)
                    .map_err(|err| invalid_pem("CA bundle", ca_path, &err))?;
                if certificates.is_empty() {
                    return Err(ApiError::config(format!(
                        "CA bundle {} contains no certificates",
                        ca_path.display()
                    )));
                }
                for certificate in certificates {
                    builder = builder.add_root_certificate(certificate);
                }
            }
            debug!(cert = %mtls.cert_path.display(), "loaded client certificate for mutual TLS");
        }

        let client = builder
            .build()
            .map_err(|err| ApiError::config(format!("Failed to build HTTP client: {err}")))?;

        Ok(HttpTransport { client, timeout: self.timeout })
    }
}

/// Direct-connecting transport for tests against local mock servers
#[cfg(test)]
pub(crate) fn local_transport() -> HttpTransport {
    HttpTransport::builder()
        .timeout(Duration::from_secs(2))
        .system_proxy(false)
        .build()
        .expect("transport builds")
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;

    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::builder()
            .timeout(Duration::from_millis(200))
            .system_proxy(false)
            .build()
            .expect("transport")
    }

    #[tokio::test]
    async fn sends_headers_and_body_and_buffers_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instances"))
            .and(header("client-token", "abc"))
            .and(body_string("{\"a\":1}"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{\"id\":\"i-1\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let request =
            HttpRequest::new(Method::POST, format!("{}/instances", server.uri()), "/instances")
                .header("Client-Token", "abc")
                .unwrap()
                .body(b"{\"a\":1}".to_vec());

        let response = transport().send(request).await.expect("response");
        assert_eq!(response.status, 201);
        let value: serde_json::Value = response.json("/instances").unwrap();
        assert_eq!(value["id"], "i-1");
    }

    #[tokio::test]
    async fn status_codes_are_not_interpreted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let response = transport()
            .send(HttpRequest::new(Method::GET, server.uri(), "/"))
            .await
            .expect("503 is still a response");
        assert!(!response.is_success());
        assert_eq!(response.retry_after(), Some(Duration::from_secs(7)));
        assert!(matches!(
            response.into_error("/"),
            ApiError::Retryable { status: 503, retry_after: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn slow_upstream_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err =
            transport().send(HttpRequest::new(Method::GET, server.uri(), "/slow")).await.unwrap_err();
        assert_eq!(err, ApiError::Timeout { path: "/slow".into(), timeout: Duration::from_millis(200) });
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport()
            .send(HttpRequest::new(Method::GET, format!("http://{addr}"), "/down"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        assert_eq!(err.equivalent_status(), Some(503));
    }

    #[test]
    fn empty_and_no_content_bodies_decode_as_unit() {
        let response = HttpResponse { status: 204, headers: HeaderMap::new(), body: Vec::new() };
        response.json::<()>("/x").unwrap();

        let garbage = HttpResponse { status: 200, headers: HeaderMap::new(), body: b"<html>".to_vec() };
        assert!(matches!(garbage.json::<serde_json::Value>("/x"), Err(ApiError::Decode { .. })));
    }

    #[test]
    fn missing_client_certificate_fails_at_build() {
        let err = HttpTransport::builder()
            .tls(TlsMode::Mutual(MtlsConfig {
                cert_path: "/nonexistent/client.pem".into(),
                key_path: "/nonexistent/client.key".into(),
                ca_path: None,
            }))
            .build()
            .unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[test]
    fn malformed_client_certificate_fails_at_build() {
        let mut cert = NamedTempFile::new().unwrap();
        cert.write_all(b"not a certificate").unwrap();
        let mut key = NamedTempFile::new().unwrap();
        key.write_all(b"not a key").unwrap();

        let err = HttpTransport::builder()
            .tls(TlsMode::Mutual(MtlsConfig {
                cert_path: cert.path().to_path_buf(),
                key_path: key.path().to_path_buf(),
                ca_path: None,
            }))
            .build()
            .unwrap_err();
        match err {
            ApiError::Configuration(message) => assert!(message.contains("client identity")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_header_value_is_rejected() {
        let result = HttpRequest::new(Method::GET, "http://localhost", "/")
            .header("x-api-key", "bad\nvalue");
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }
}

//! Proxy environment handling of the HTTP transport
//!
//! Lives in its own test binary: it sets `HTTP_PROXY` for the whole process.

use std::time::Duration;

use reqwest::Method;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeda_domain::ApiError;
use zeda_infra::{HttpRequest, HttpTransport, Transport};

const UPSTREAM: &str = "http://zeda-upstream.invalid/ping";

#[tokio::test]
async fn test_transport_honors_proxy_environment_unless_disabled() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(1)
        .mount(&proxy)
        .await;

    std::env::remove_var("NO_PROXY");
    std::env::remove_var("no_proxy");
    std::env::set_var("HTTP_PROXY", proxy.uri());
    std::env::set_var("http_proxy", proxy.uri());

    let proxied = HttpTransport::builder().timeout(Duration::from_secs(2)).build().unwrap();
    let direct = HttpTransport::builder()
        .timeout(Duration::from_secs(2))
        .system_proxy(false)
        .build()
        .unwrap();

    let response = proxied.send(HttpRequest::new(Method::GET, UPSTREAM, "/ping")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"via proxy");

    // Direct connections have to resolve the reserved .invalid name
    let err = direct.send(HttpRequest::new(Method::GET, UPSTREAM, "/ping")).await.unwrap_err();
    assert!(matches!(err, ApiError::Network { .. } | ApiError::Timeout { .. }));
}

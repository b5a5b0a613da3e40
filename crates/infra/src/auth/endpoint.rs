//! Token endpoint exchange shared by both grant types

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tracing::debug;
use url::form_urlencoded;
use zeda_domain::ApiError;

use super::types::{TokenGrant, TokenResponse};
use crate::http::{HttpRequest, Transport};

/// POST a form-encoded grant and parse the token response.
///
/// Every failure becomes [`ApiError::Auth`]. Unreachable or overloaded
/// (429/5xx) token endpoints are marked transient so the request executor may
/// retry; rejected credentials are not.
pub(crate) async fn request_token(
    transport: &Arc<dyn Transport>,
    upstream: &str,
    token_url: &str,
    headers: &[(&str, &str)],
    form: &[(&str, &str)],
) -> Result<TokenGrant, ApiError> {
    let grant_type =
        form.iter().find(|(key, _)| *key == "grant_type").map_or("unknown", |(_, value)| *value);
    let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();

    let mut request = HttpRequest::new(Method::POST, token_url, token_path(token_url))
        .header(CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded")?;
    for (name, value) in headers {
        request = request.header(name, value)?;
    }
    let request = request.body(body.into_bytes());

    debug!(upstream, grant_type, "requesting token");

    let response = transport.send(request).await.map_err(|err| ApiError::Auth {
        upstream: upstream.to_string(),
        message: format!("token endpoint unreachable: {err}"),
        status: None,
        transient: true,
    })?;

    if !response.is_success() {
        let status = response.status;
        return Err(ApiError::Auth {
            upstream: upstream.to_string(),
            message: format!("{grant_type} grant rejected with HTTP {status}"),
            status: Some(status),
            transient: status == 429 || status >= 500,
        });
    }

    let parsed: TokenResponse = serde_json::from_slice(&response.body).map_err(|err| {
        ApiError::Auth {
            upstream: upstream.to_string(),
            message: format!("malformed token response: {err}"),
            status: Some(response.status),
            transient: false,
        }
    })?;

    Ok(parsed.into())
}

fn token_path(token_url: &str) -> String {
    url::Url::parse(token_url).map_or_else(|_| token_url.to_string(), |url| url.path().to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::client::local_transport;

    fn transport() -> Arc<dyn Transport> {
        Arc::new(local_transport())
    }

    #[tokio::test]
    async fn posts_form_and_parses_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(header("x-api-key", "k"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("scope=cob.read+cob.write"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = request_token(
            &transport(),
            "sicredi-pix",
            &format!("{}/oauth/token", server.uri()),
            &[("x-api-key", "k")],
            &[("grant_type", "client_credentials"), ("scope", "cob.read cob.write")],
        )
        .await
        .unwrap();

        assert_eq!(grant.access_token, "tok");
        assert_eq!(grant.expires_in, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn rejected_credentials_are_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = request_token(
            &transport(),
            "sicredi-boleto",
            &server.uri(),
            &[],
            &[("grant_type", "password")],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Auth { status: Some(401), transient: false, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn overloaded_token_endpoint_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = request_token(
            &transport(),
            "sicredi-pix",
            &server.uri(),
            &[],
            &[("grant_type", "client_credentials")],
        )
        .await
        .unwrap_err();

        assert!(err.is_retryable());
    }
}

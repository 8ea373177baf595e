//! HTTP implementation of the configuration backend API.
//!
//! Thin transport layer: it serializes requests, maps status codes to
//! the service's error taxonomy, and decodes responses. All retry,
//! backoff, and verification policy lives in `remconf-service`.

use std::time::Duration;

use async_trait::async_trait;
use remconf_protocol::{LatestConfigsRequest, LatestConfigsResponse, OrgStatusResponse};
use remconf_service::api::{BackendApi, BackendError};
use reqwest::StatusCode;
use url::Url;

const CONFIGS_PATH: &str = "api/v0.1/configurations";
const ORG_STATUS_PATH: &str = "api/v0.1/status";
const API_KEY_HEADER: &str = "X-Api-Key";

/// Per-request deadline. The service's bypass path blocks clients on
/// in-flight fetches, so a request must never hang longer than this.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("could not build http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the configuration backend.
    pub endpoint: String,
    pub api_key: String,
    /// Per-request deadline. `None` uses the default.
    pub timeout: Option<Duration>,
}

pub struct HttpBackend {
    http: reqwest::Client,
    configs_url: Url,
    status_url: Url,
    api_key: String,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ClientBuildError> {
        let base = config.endpoint.trim_end_matches('/');
        let configs_url = Url::parse(&format!("{base}/{CONFIGS_PATH}"))?;
        let status_url = Url::parse(&format!("{base}/{ORG_STATUS_PATH}"))?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()?;
        Ok(Self {
            http,
            configs_url,
            status_url,
            api_key: config.api_key,
        })
    }
}

fn check_status(status: StatusCode) -> Result<(), BackendError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::Unauthorized),
        StatusCode::PROXY_AUTHENTICATION_REQUIRED => Err(BackendError::Proxy),
        status if !status.is_success() => Err(BackendError::Status(status.as_u16())),
        _ => Ok(()),
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn fetch(
        &self,
        request: LatestConfigsRequest,
    ) -> Result<LatestConfigsResponse, BackendError> {
        tracing::debug!(
            products = request.products.len(),
            new_products = request.new_products.len(),
            active_clients = request.active_clients.len(),
            "fetching latest configurations"
        );
        let response = self
            .http
            .post(self.configs_url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        tracing::debug!(status = %response.status(), "configurations response");
        check_status(response.status())?;
        response
            .json::<LatestConfigsResponse>()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))
    }

    async fn fetch_org_status(&self) -> Result<OrgStatusResponse, BackendError> {
        let response = self
            .http
            .get(self.status_url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(transport)?;
        tracing::debug!(status = %response.status(), "org status response");
        check_status(response.status())?;
        response
            .json::<OrgStatusResponse>()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(BackendConfig {
            endpoint: server.uri(),
            api_key: "test-key".to_string(),
            timeout: Some(Duration::from_secs(2)),
        })
        .expect("client should build")
    }

    #[tokio::test]
    async fn fetch_posts_request_and_decodes_response() {
        let server = MockServer::start().await;
        let reply = LatestConfigsResponse {
            target_files: vec![remconf_protocol::File {
                path: "datadog/2/APM_SAMPLING/id/config".to_string(),
                raw: b"{}".to_vec(),
            }],
            ..Default::default()
        };
        Mock::given(method("POST"))
            .and(path("/api/v0.1/configurations"))
            .and(header("X-Api-Key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "hostname": "test-host",
                "products": ["APM_SAMPLING"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&reply))
            .expect(1)
            .mount(&server)
            .await;

        let request = LatestConfigsRequest {
            hostname: "test-host".to_string(),
            products: vec!["APM_SAMPLING".to_string()],
            ..Default::default()
        };
        let response = backend(&server).fetch(request).await.unwrap();
        assert_eq!(response, reply);
    }

    #[tokio::test]
    async fn auth_failures_map_to_unauthorized() {
        for status in [401, 403] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/v0.1/configurations"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = backend(&server)
                .fetch(LatestConfigsRequest::default())
                .await
                .unwrap_err();
            assert!(matches!(err, BackendError::Unauthorized), "status {status}");
            assert!(err.is_throttled_kind());
        }
    }

    #[tokio::test]
    async fn proxy_rejection_maps_to_proxy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0.1/configurations"))
            .respond_with(ResponseTemplate::new(407))
            .mount(&server)
            .await;

        let err = backend(&server)
            .fetch(LatestConfigsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Proxy));
        assert!(err.is_throttled_kind());
    }

    #[tokio::test]
    async fn other_failures_carry_the_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0.1/configurations"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = backend(&server)
            .fetch(LatestConfigsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status(503)));
        assert!(!err.is_throttled_kind());
    }

    #[tokio::test]
    async fn garbage_body_maps_to_decode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0.1/configurations"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .fetch(LatestConfigsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn org_status_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0.1/status"))
            .and(header("X-Api-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(OrgStatusResponse {
                enabled: true,
                authorized: true,
            }))
            .mount(&server)
            .await;

        let status = backend(&server).fetch_org_status().await.unwrap();
        assert!(status.enabled);
        assert!(status.authorized);
    }

    #[test]
    fn endpoint_with_trailing_slash_is_normalized() {
        let client = HttpBackend::new(BackendConfig {
            endpoint: "https://config.example.com/".to_string(),
            api_key: String::new(),
            timeout: None,
        })
        .unwrap();
        assert_eq!(
            client.configs_url.as_str(),
            "https://config.example.com/api/v0.1/configurations"
        );
    }
}

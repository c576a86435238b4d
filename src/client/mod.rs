//! Thin REST client for the SignalFx `/v2` API.
//!
//! Requests carry the `X-SF-Token` header and are retried on connection
//! failures, 429 and 5xx responses according to the configured
//! [`RetryPolicy`]. Non-success statuses become [`ProviderError`]s via
//! [`ProviderError::from_status`].

mod chart;
mod dashboard;
mod dashboard_group;
mod dimension;
mod integration;
mod notification;
mod org_token;
mod retry;
mod slo;

pub use chart::Chart;
pub use dashboard::{
    Dashboard, DashboardChart, DashboardFilters, DashboardSource, DashboardTime, DashboardVariable,
};
pub use dashboard_group::{DashboardConfig, DashboardGroup};
pub use dimension::{Dimension, DimensionSearch};
pub use integration::Integration;
pub use notification::Notification;
pub use org_token::{OrgToken, TokenLimits};
pub use retry::RetryPolicy;
pub use slo::{Slo, SloAlertRule, SloInputs, SloRule, SloTarget};

use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ResolvedConfig;
use crate::error::ProviderError;

/// Header carrying the API token.
pub const AUTH_HEADER: &str = "X-SF-Token";

/// Shared, cheaply clonable API client.
#[derive(Clone)]
pub struct SignalFxClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SignalFxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalFxClient")
            .field("base", &self.base.as_str())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SignalFxClient {
    /// Create a client for `api_url` authenticating with `token`.
    pub fn new(
        api_url: &str,
        token: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(timeout)?,
            base: parse_base(api_url)?,
            token: token.into(),
            retry,
        })
    }

    /// Build a client from resolved configuration. Fails without a token.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        let token = config
            .auth_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::Configuration("auth_token is required".to_string()))?;
        Self::new(&config.api_url, token, config.timeout, config.retry)
    }

    /// Exchange user credentials for a session token via `POST /v2/session`.
    #[instrument(skip_all, fields(api_url = %api_url))]
    pub async fn create_session_token(
        api_url: &str,
        timeout: Duration,
        email: &str,
        password: &str,
        organization_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut url = parse_base(api_url)?;
        push_segments(&mut url, &["v2", "session"])?;

        let mut body = serde_json::json!({ "email": email, "password": password });
        if let Some(org) = organization_id {
            body["organizationId"] = Value::String(org.to_string());
        }

        let response = http_client(timeout)?.post(url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), text));
        }

        let session: Value = serde_json::from_str(&text)?;
        session
            .get("accessToken")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Api("session response has no accessToken".to_string()))
    }

    /// The API base URL.
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ProviderError> {
        self.get_with_query(path, &[]).await
    }

    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let text = self.execute(Method::GET, path, query, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
    ) -> Result<T, ProviderError> {
        self.post_with_query(path, &[], body).await
    }

    pub(crate) async fn post_with_query<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ProviderError> {
        let body = serde_json::to_value(body)?;
        let text = self.execute(Method::POST, path, query, Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
    ) -> Result<T, ProviderError> {
        let body = serde_json::to_value(body)?;
        let text = self.execute(Method::PUT, path, &[], Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) async fn delete(&self, path: &[&str]) -> Result<(), ProviderError> {
        self.execute(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    fn url(&self, path: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        push_segments(&mut url, path)?;
        Ok(url)
    }

    /// Send a request, retrying transient failures. Returns the response body.
    #[instrument(skip_all, fields(method = %method, path = %path.join("/")))]
    async fn execute(
        &self,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, ProviderError> {
        let url = self.url(path)?;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(AUTH_HEADER, &self.token);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let (err, hint) = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let hint = retry_after(&response);
                    let text = response.text().await?;
                    if status.is_success() {
                        debug!(status = status.as_u16(), attempt, "API request succeeded");
                        return Ok(text);
                    }
                    (ProviderError::from_status(status.as_u16(), text), hint)
                },
                Err(e) if e.is_timeout() => (
                    ProviderError::DeadlineExceeded(format!("{} {} timed out", method, url.path())),
                    None,
                ),
                Err(e) => (ProviderError::Http(e), None),
            };

            if !err.is_retryable() || !self.retry.should_retry(attempt) {
                debug!(attempt, error = %err, "API request failed");
                return Err(err);
            }

            let delay = self.retry.delay_with_hint(attempt - 1, hint);
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying API request");
            tokio::time::sleep(delay).await;
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("signalfx-provider/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn parse_base(api_url: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(api_url)
        .map_err(|e| ProviderError::Configuration(format!("Invalid api_url {}: {}", api_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(ProviderError::Configuration(format!(
            "Invalid api_url {}: not a base URL",
            api_url
        )));
    }
    Ok(url)
}

fn push_segments(url: &mut Url, segments: &[&str]) -> Result<(), ProviderError> {
    let shown = url.to_string();
    url.path_segments_mut()
        .map_err(|()| ProviderError::Configuration(format!("Invalid api_url {}", shown)))?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    async fn client_for(server: &MockServer, attempts: u32) -> SignalFxClient {
        SignalFxClient::new(&server.uri(), "tok", Duration::from_secs(5), fast_retry(attempts)).unwrap()
    }

    #[tokio::test]
    async fn sends_token_and_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/dashboard/D1"))
            .and(header(AUTH_HEADER, "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "D1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 1).await;
        let value: Value = client.get(&["v2", "dashboard", "D1"]).await.unwrap();
        assert_eq!(value["id"], "D1");
    }

    #[tokio::test]
    async fn path_segments_are_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/token/ci%20token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ci token"})))
            .mount(&server)
            .await;

        let client = client_for(&server, 1).await;
        let value: Value = client.get(&["v2", "token", "ci token"]).await.unwrap();
        assert_eq!(value["name"], "ci token");
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/chart/C1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/chart/C1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "C1"})))
            .mount(&server)
            .await;

        let client = client_for(&server, 3).await;
        let value: Value = client.get(&["v2", "chart", "C1"]).await.unwrap();
        assert_eq!(value["id"], "C1");
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, 2).await;
        let err = client.get::<Value>(&["v2", "chart", "C1"]).await.unwrap_err();
        assert!(matches!(err, ProviderError::ResourceExhausted(_)));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such chart"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 4).await;
        let err = client.delete(&["v2", "chart", "C1"]).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "no such chart");
    }

    #[tokio::test]
    async fn post_sends_body_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/dashboardgroup"))
            .and(query_param("empty", "true"))
            .and(body_json(json!({"name": "Ops"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "G1", "name": "Ops"})))
            .mount(&server)
            .await;

        let client = client_for(&server, 1).await;
        let value: Value = client
            .post_with_query(&["v2", "dashboardgroup"], &[("empty", "true".to_string())], &json!({"name": "Ops"}))
            .await
            .unwrap();
        assert_eq!(value["id"], "G1");
    }

    #[tokio::test]
    async fn session_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/session"))
            .and(body_json(json!({"email": "ops@example.com", "password": "pw", "organizationId": "O1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "session-tok"})))
            .mount(&server)
            .await;

        let token = SignalFxClient::create_session_token(
            &server.uri(),
            Duration::from_secs(5),
            "ops@example.com",
            "pw",
            Some("O1"),
        )
        .await
        .unwrap();
        assert_eq!(token, "session-tok");
    }

    #[test]
    fn from_config_requires_token() {
        let config = crate::config::resolve(
            &crate::config::ProviderConfig::default(),
            &crate::config::CredentialSources::none(),
        )
        .unwrap();
        assert!(matches!(
            SignalFxClient::from_config(&config),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = SignalFxClient::new("not a url", "tok", Duration::from_secs(1), RetryPolicy::none())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let client =
            SignalFxClient::new("https://api.eu0.signalfx.com", "tok", Duration::from_secs(1), RetryPolicy::none())
                .unwrap();
        assert_eq!(client.base_url(), "https://api.eu0.signalfx.com/");
    }

    #[test]
    fn segments_extend_the_base_path() {
        let mut url = Url::parse("https://proxy.example.com/signalfx/").unwrap();
        push_segments(&mut url, &["v2", "chart", "C 1"]).unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.com/signalfx/v2/chart/C%201");

        let mut opaque = Url::parse("mailto:ops@example.com").unwrap();
        let err = push_segments(&mut opaque, &["v2"]).unwrap_err();
        assert_eq!(err.message(), "Invalid api_url mailto:ops@example.com");
    }
}

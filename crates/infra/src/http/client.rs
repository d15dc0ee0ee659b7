use std::time::Duration;

use mdmlink_common::error::{CommonError, CommonResult};
use mdmlink_common::resilience::with_timeout;
use mdmlink_domain::TransportSettings;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::errors::{classify_status, InfraError};

/// JSON-over-HTTP client bound to one server root.
///
/// Performs exactly one attempt per call, raced against the configured
/// timeout; retries and circuit breaking are applied by the caller. Non-success statuses come back as classified
/// [`CommonError`]s.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder::new(base_url)
    }

    /// Client configured from transport settings; `base_url` must be set.
    pub fn from_settings(settings: &TransportSettings) -> CommonResult<Self> {
        let base_url = settings
            .base_url
            .as_deref()
            .ok_or_else(|| CommonError::config_field("transport.base_url", "must be set"))?;

        let mut builder = Self::builder(base_url)
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.clone());
        if let Some(token) = &settings.api_token {
            builder = builder.bearer_token(token.clone());
        }
        builder.build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a path template against the base URL.
    ///
    /// Segments equal to a placeholder in `params` (e.g. `{id}`) are replaced
    /// by the percent-encoded value.
    pub fn endpoint(&self, template: &str, params: &[(&str, &str)]) -> CommonResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                CommonError::config_field("transport.base_url", "cannot be used as a base URL")
            })?;
            segments.pop_if_empty();
            for segment in template.split('/').filter(|segment| !segment.is_empty()) {
                let value = params
                    .iter()
                    .find(|(placeholder, _)| *placeholder == segment)
                    .map_or(segment, |(_, value)| *value);
                segments.push(value);
            }
        }
        Ok(url)
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub async fn get_json(&self, url: Url) -> CommonResult<Value> {
        self.exchange_json(self.request(Method::GET, url)).await
    }

    pub async fn post_json(&self, url: Url, body: &Value) -> CommonResult<Value> {
        self.exchange_json(self.request(Method::POST, url).json(body)).await
    }

    /// Execute one request, classifying transport failures and non-success
    /// statuses. The exchange is bounded by the client timeout.
    pub async fn send(&self, builder: RequestBuilder) -> CommonResult<Response> {
        let request = build_request(builder)?;
        let operation = operation_name(&request);
        with_timeout(&operation, self.timeout, self.execute(request)).await
    }

    /// Request and body read share one deadline.
    async fn exchange_json(&self, builder: RequestBuilder) -> CommonResult<Value> {
        let request = build_request(builder)?;
        let operation = operation_name(&request);
        with_timeout(&operation, self.timeout, async {
            let response = self.execute(request).await?;
            read_json(response).await
        })
        .await
    }

    async fn execute(&self, request: Request) -> CommonResult<Response> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.client.execute(request).await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            CommonError::from(InfraError::from(err))
        })?;

        let status = response.status();
        debug!(%method, %url, %status, "received HTTP response");
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &headers, url.path(), &body))
    }
}

fn build_request(builder: RequestBuilder) -> CommonResult<Request> {
    builder.build().map_err(|err| CommonError::from(InfraError::from(err)))
}

/// `METHOD /path`, used to name timeouts
fn operation_name(request: &Request) -> String {
    format!("{} {}", request.method(), request.url().path())
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Decode a JSON body; an empty body reads as `null`
async fn read_json(response: Response) -> CommonResult<Value> {
    let bytes = response.bytes().await.map_err(|err| CommonError::from(InfraError::from(err)))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    bearer_token: Option<String>,
}

impl HttpClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            bearer_token: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn build(self) -> CommonResult<HttpClient> {
        let base_url = Url::parse(&self.base_url).map_err(|err| CommonError::from(InfraError::from(err)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                CommonError::config_field("transport.api_token", "contains invalid header characters")
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = ReqwestClient::builder().no_proxy().default_headers(headers);
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| CommonError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, base_url, timeout: self.timeout })
    }
}

#[cfg(test)]
mod tests {
    use mdmlink_common::error::{ErrorClassification, ErrorKind};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> HttpClient {
        HttpClient::builder(server.uri()).timeout(Duration::from_secs(5)).build().unwrap()
    }

    #[tokio::test]
    async fn test_returns_json_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/computers-inventory"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalCount": 0 })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let url = client.endpoint("/api/v1/computers-inventory", &[]).unwrap();
        let body = client.get_json(url).await.unwrap();

        assert_eq!(body["totalCount"], 0);
    }

    #[tokio::test]
    async fn test_sends_bearer_token_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/policies/9/execute"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({ "deviceIds": ["1"] })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder(server.uri()).bearer_token("secret").build().unwrap();
        let url = client.endpoint("/api/v1/policies/{id}/execute", &[("{id}", "9")]).unwrap();
        let body = client.post_json(url, &json!({ "deviceIds": ["1"] })).await.unwrap();

        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_does_not_retry_and_classifies_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get_json(client.base_url().clone()).await.unwrap_err();

        assert_eq!(err, CommonError::server(503, "HTTP 503 Service Unavailable: maintenance"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get_json(client.base_url().clone()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_slow_response_becomes_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client =
            HttpClient::builder(server.uri()).timeout(Duration::from_millis(50)).build().unwrap();
        let err = client.get_json(client.base_url().clone()).await.unwrap_err();

        assert_eq!(err, CommonError::timeout("GET /", Duration::from_millis(50)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_endpoint_substitutes_and_encodes_placeholders() {
        let client = HttpClient::builder("https://tenant.example.com/base/").build().unwrap();

        let url = client
            .endpoint("/JSSResource/computers/match/{query}", &[("{query}", "*design mac*")])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://tenant.example.com/base/JSSResource/computers/match/*design%20mac*"
        );
    }

    #[test]
    fn test_from_settings_requires_base_url() {
        let err = HttpClient::from_settings(&TransportSettings::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = HttpClient::builder("::nope").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}

//! Datadog REST API client implementation.
//!
//! This module provides the HTTP client used against both the source and the
//! destination organization. It owns authentication, per-request timeouts and
//! retries; callers only ever see a final success or a [`ClientError`].

use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{ClientError, Result, SyncError};

/// Default Datadog API URL.
pub const DEFAULT_API_URL: &str = "https://api.datadoghq.com";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default time budget for retries in seconds.
pub const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 60;

/// Endpoint used to validate API keys.
const VALIDATE_ENDPOINT: &str = "/api/v1/validate";

/// Initial delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 250;

/// Upper bound for a single backoff delay in milliseconds.
const MAX_RETRY_DELAY_MS: u64 = 10_000;

/// Connection settings for one organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base URL, e.g. `https://api.datadoghq.eu`.
    pub base_url: String,
    /// `DD-API-KEY` header value.
    pub api_key: Option<String>,
    /// `DD-APPLICATION-KEY` header value.
    pub app_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total time budget for retrying a request, in seconds.
    pub retry_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            app_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_timeout_secs: DEFAULT_RETRY_TIMEOUT_SECS,
        }
    }
}

/// Datadog API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// API key.
    api_key: Option<String>,
    /// Application key.
    app_key: Option<String>,
    /// Retry budget.
    retry_timeout: Duration,
}

impl ApiClient {
    /// Creates a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ClientError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            app_key: settings.app_key.clone(),
            retry_timeout: Duration::from_secs(settings.retry_timeout_secs),
        })
    }

    /// Returns the base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.execute(Method::GET, path, &[], None).await
    }

    /// Sends a GET request with query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    pub async fn get_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.execute(Method::GET, path, query, None).await
    }

    /// Sends a POST request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.execute(Method::POST, path, &[], Some(body)).await
    }

    /// Sends a PUT request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.execute(Method::PUT, path, &[], Some(body)).await
    }

    /// Sends a PATCH request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.execute(Method::PATCH, path, &[], Some(body)).await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.execute(Method::DELETE, path, &[], None).await
    }

    /// Fetches every page of a page-number paginated collection.
    ///
    /// Pages are requested with `page[size]` / `page[number]` until a page
    /// comes back shorter than `page_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails or a page lacks `data_key`.
    pub async fn get_paginated(
        &self,
        path: &str,
        data_key: &str,
        page_size: usize,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_number = 0usize;

        loop {
            let query = [
                ("page[size]", page_size.to_string()),
                ("page[number]", page_number.to_string()),
            ];
            let response = self.get_with_query(path, &query).await?;
            let page = match response.get(data_key) {
                Some(Value::Array(page)) => page.clone(),
                _ => {
                    return Err(ClientError::invalid_response(format!(
                        "{path}: missing '{data_key}' array in page {page_number}"
                    ))
                    .into());
                }
            };

            let fetched = page.len();
            items.extend(page);
            trace!("{path}: fetched page {page_number} ({fetched} items)");

            if fetched < page_size {
                break;
            }
            page_number += 1;
        }

        Ok(items)
    }

    /// Validates the configured keys against the API.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthenticationFailed`] when the keys are rejected,
    /// or the underlying error when the endpoint cannot be reached.
    pub async fn validate(&self) -> Result<()> {
        match self.get(VALIDATE_ENDPOINT).await {
            Ok(_) => Ok(()),
            Err(SyncError::Client(ClientError::Http { status, body }))
                if status == 401 || status == 403 =>
            {
                Err(ClientError::AuthenticationFailed { message: body }.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Executes a request, retrying transient failures within the retry budget.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let started = Instant::now();
        let mut delay = Duration::from_millis(RETRY_DELAY_MS);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.execute_once(method.clone(), path, query, body).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    let wait = match &e {
                        ClientError::RateLimited { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs).max(delay)
                        }
                        _ => delay,
                    };

                    if started.elapsed() + wait > self.retry_timeout {
                        debug!("{method} {path}: giving up after {attempt} attempts: {e}");
                        return Err(e.into());
                    }

                    debug!("{method} {path}: attempt {attempt} failed ({e}), retrying in {wait:?}");
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Executes a single request.
    async fn execute_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> std::result::Result<Value, ClientError> {
        let url = format!("{}{path}", self.base_url);
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json");

        if let Some(key) = &self.api_key {
            request = request.header("DD-API-KEY", key);
        }
        if let Some(key) = &self.app_key {
            request = request.header("DD-APPLICATION-KEY", key);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout {
                    message: format!("{url}: {e}"),
                }
            } else {
                ClientError::network(format!("Request to {url} failed: {e}"))
            }
        })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = ["retry-after", "x-ratelimit-reset"]
                .iter()
                .find_map(|name| {
                    response
                        .headers()
                        .get(*name)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                })
                .unwrap_or(1);

            return Err(ClientError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ClientError::network(format!("Failed to read response from {url}: {e}")))?;

        if !status.is_success() {
            return Err(ClientError::http(status.as_u16(), text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| ClientError::invalid_response(format!("Failed to parse response from {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&ClientSettings {
            base_url: server.uri(),
            api_key: Some("api-key".to_string()),
            app_key: Some("app-key".to_string()),
            timeout_secs: 5,
            retry_timeout_secs: 3,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn test_get_sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/monitor"))
            .and(header("DD-API-KEY", "api-key"))
            .and(header("DD-APPLICATION-KEY", "app-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let value = client_for(&server).get("/api/v1/monitor").await.expect("get");
        assert_eq!(value, json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_http_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/monitor/42"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"errors\":[\"Not found\"]}"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get("/api/v1/monitor/42")
            .await
            .expect_err("should fail");

        match err {
            SyncError::Client(ClientError::Http { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/monitor"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/monitor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .mount(&server)
            .await;

        let value = client_for(&server)
            .post("/api/v1/monitor", &json!({"name": "cpu"}))
            .await
            .expect("post");
        assert_eq!(value["id"], 7);
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/roles/abc"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let value = client_for(&server).delete("/api/v2/roles/abc").await.expect("delete");
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn test_pagination_stops_on_short_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/roles"))
            .and(query_param("page[number]", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "a"}, {"id": "b"}]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/roles"))
            .and(query_param("page[number]", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "c"}]})))
            .mount(&server)
            .await;

        let items = client_for(&server)
            .get_paginated("/api/v2/roles", "data", 2)
            .await
            .expect("paginate");
        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["id"], "c");
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/validate"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let err = client_for(&server).validate().await.expect_err("invalid keys");
        assert!(matches!(
            err,
            SyncError::Client(ClientError::AuthenticationFailed { .. })
        ));
    }
}

//! HTTP client for the identity-management REST API.

use std::time::Duration;

use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

pub use reqwest::Method;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for tool callers.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client. Clone is cheap - reqwest::Client uses Arc internally for
/// connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidResponse("bearer token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send one request to `path` (relative to the base URL).
    ///
    /// Empty bodies (204 No Content, DELETE) come back as `Value::Null`.
    /// Nothing is retried; callers see every failure.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%method, url = %url, "API request");

        let mut builder = self
            .client
            .request(method, &url)
            .headers(self.auth_headers()?);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = Self::check_response(builder.send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("failed to parse JSON from {}: {}", url, e)))
    }
}

/// Substitute `{name}` placeholders in a path template from `params`.
///
/// Values must be non-empty strings without `/`, so an argument can never
/// escape its path segment.
pub fn expand_path(
    template: &str,
    params: &serde_json::Map<String, Value>,
) -> Result<String, ApiError> {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| ApiError::InvalidPath(template.to_string()))?;
        let name = &after[..end];
        let value = params
            .get(name)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty() && !v.contains('/'))
            .ok_or_else(|| ApiError::InvalidPath(name.to_string()))?;
        path.push_str(value);
        rest = &after[end + 1..];
    }
    path.push_str(rest);
    Ok(path)
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

use super::{announce, request_token, Endpoints};
use crate::auth::{AuthHint, Token, TokenSource};
use crate::error::AuthError;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Poll interval when the provider does not send one (RFC 8628 §3.2).
const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Added to the poll interval on every `slow_down` response.
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

#[derive(Debug, Deserialize)]
struct DeviceAuthorization {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

/// What to do after one poll of the token endpoint.
#[derive(Debug, PartialEq, Eq)]
enum PollStep {
    Pending,
    SlowDown,
}

/// Device authorization in progress.
pub struct DeviceCodeSource {
    http: Client,
    endpoints: Arc<Endpoints>,
    device_code: String,
    interval: Duration,
    deadline: Instant,
}

impl DeviceCodeSource {
    /// Request a device code and show the user where to enter it.
    pub async fn start(
        http: Client,
        endpoints: Arc<Endpoints>,
        hint: Option<&AuthHint>,
    ) -> Result<Self, AuthError> {
        let form = [
            ("client_id", endpoints.client_id.as_str()),
            ("scope", endpoints.scopes.as_str()),
        ];
        let response = http
            .post(&endpoints.device_authorization_url)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange(format!(
                "device authorization returned {}: {}",
                status,
                truncate(&body)
            )));
        }
        let authorization: DeviceAuthorization = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(format!("invalid device authorization response: {}", e)))?;

        let message = match &authorization.verification_uri_complete {
            Some(uri) => format!(
                "To sign in, visit:\n  {}\nand confirm the code {}",
                uri, authorization.user_code
            ),
            None => format!(
                "To sign in, visit:\n  {}\nand enter the code {}",
                authorization.verification_uri, authorization.user_code
            ),
        };
        announce(hint, &message);

        let deadline = Instant::now()
            .checked_add(Duration::from_secs(authorization.expires_in))
            .ok_or_else(|| {
                AuthError::Exchange(format!(
                    "device code lifetime out of range: {}s",
                    authorization.expires_in
                ))
            })?;

        Ok(Self {
            http,
            endpoints,
            device_code: authorization.device_code,
            interval: Duration::from_secs(authorization.interval),
            deadline,
        })
    }

    /// One request to the token endpoint. `None` means keep waiting; a
    /// `slow_down` answer also stretches the poll interval.
    async fn poll(&mut self) -> Result<Option<Token>, AuthError> {
        let form = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("device_code", self.device_code.as_str()),
            ("client_id", self.endpoints.client_id.as_str()),
        ];
        match request_token(&self.http, &self.endpoints.token_url, &form).await? {
            Ok(response) => response.into_token().map(Some),
            Err(error) => match classify_poll_error(&error.error) {
                Some(PollStep::Pending) => {
                    debug!("Device authorization pending");
                    Ok(None)
                }
                Some(PollStep::SlowDown) => {
                    self.interval = self
                        .interval
                        .saturating_add(Duration::from_secs(SLOW_DOWN_INCREMENT_SECS));
                    debug!(interval = ?self.interval, "Provider asked to slow down");
                    Ok(None)
                }
                None => Err(error.into_auth_error()),
            },
        }
    }
}

#[async_trait]
impl TokenSource for DeviceCodeSource {
    async fn token(&mut self) -> Result<Token, AuthError> {
        loop {
            tokio::time::sleep(self.interval).await;
            if Instant::now() >= self.deadline {
                return Err(AuthError::Exchange("device code expired".to_string()));
            }
            if let Some(token) = self.poll().await? {
                return Ok(token);
            }
        }
    }
}

fn classify_poll_error(code: &str) -> Option<PollStep> {
    match code {
        "authorization_pending" => Some(PollStep::Pending),
        "slow_down" => Some(PollStep::SlowDown),
        _ => None,
    }
}

/// Maximum error body length carried into error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_authorization_defaults_interval() {
        let authorization: DeviceAuthorization = serde_json::from_str(
            r#"{
                "device_code": "dc",
                "user_code": "ABCD-EFGH",
                "verification_uri": "https://auth.example.com/device",
                "expires_in": 600
            }"#,
        )
        .unwrap();
        assert_eq!(authorization.interval, DEFAULT_INTERVAL_SECS);
        assert_eq!(authorization.verification_uri_complete, None);
    }

    #[test]
    fn test_classify_poll_error() {
        assert_eq!(classify_poll_error("authorization_pending"), Some(PollStep::Pending));
        assert_eq!(classify_poll_error("slow_down"), Some(PollStep::SlowDown));
        assert_eq!(classify_poll_error("access_denied"), None);
        assert_eq!(classify_poll_error("expired_token"), None);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(500);
        assert_eq!(truncate(&long).len(), MAX_ERROR_BODY_LENGTH);
    }

    // ========================================================================
    // Against a mock identity provider
    // ========================================================================

    fn endpoints(server: &mockito::ServerGuard) -> Arc<Endpoints> {
        Arc::new(Endpoints {
            client_id: "client-1".to_string(),
            authorize_url: format!("{}/as/authorize", server.url()),
            token_url: format!("{}/as/token", server.url()),
            device_authorization_url: format!("{}/as/device_authorization", server.url()),
            scopes: "openid".to_string(),
            redirect_port: 0,
        })
    }

    async fn device_authorization(server: &mut mockito::ServerGuard, body: &str) -> mockito::Mock {
        server
            .mock("POST", "/as/device_authorization")
            .match_body(mockito::Matcher::UrlEncoded("client_id".into(), "client-1".into()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    async fn token_endpoint(server: &mut mockito::ServerGuard, status: usize, body: &str) {
        server
            .mock("POST", "/as/token")
            .match_body(mockito::Matcher::UrlEncoded("device_code".into(), "dc".into()))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;
    }

    const AUTHORIZATION: &str = r#"{
        "device_code": "dc",
        "user_code": "ABCD-EFGH",
        "verification_uri": "https://auth.example.com/device",
        "expires_in": 600,
        "interval": 0
    }"#;

    #[tokio::test]
    async fn test_device_flow_issues_token() {
        let mut server = mockito::Server::new_async().await;
        let authorize = device_authorization(&mut server, AUTHORIZATION).await;
        token_endpoint(&mut server, 200, r#"{ "access_token": "A", "expires_in": 60 }"#).await;

        let mut source = DeviceCodeSource::start(Client::new(), endpoints(&server), None)
            .await
            .unwrap();
        let token = source.token().await.unwrap();

        assert_eq!(token.access_token, "A");
        assert_eq!(token.refresh_token, None);
        authorize.assert_async().await;
    }

    #[tokio::test]
    async fn test_device_authorization_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/as/device_authorization")
            .with_status(401)
            .with_body(r#"{ "error": "invalid_client" }"#)
            .create_async()
            .await;

        let result = DeviceCodeSource::start(Client::new(), endpoints(&server), None).await;
        assert!(matches!(result, Err(AuthError::Exchange(m)) if m.contains("401") && m.contains("invalid_client")));
    }

    #[tokio::test]
    async fn test_out_of_range_device_code_lifetime() {
        let mut server = mockito::Server::new_async().await;
        let body = AUTHORIZATION.replace("\"expires_in\": 600", &format!("\"expires_in\": {}", u64::MAX));
        device_authorization(&mut server, &body).await;

        let result = DeviceCodeSource::start(Client::new(), endpoints(&server), None).await;
        assert!(matches!(result, Err(AuthError::Exchange(m)) if m.contains("out of range")));
    }

    #[tokio::test]
    async fn test_expired_device_code_stops_polling() {
        let mut server = mockito::Server::new_async().await;
        let body = AUTHORIZATION.replace("\"expires_in\": 600", "\"expires_in\": 0");
        device_authorization(&mut server, &body).await;
        let token = server.mock("POST", "/as/token").expect(0).create_async().await;

        let mut source = DeviceCodeSource::start(Client::new(), endpoints(&server), None)
            .await
            .unwrap();

        assert!(matches!(source.token().await, Err(AuthError::Exchange(m)) if m == "device code expired"));
        token.assert_async().await;
    }

    async fn started(server: &mut mockito::ServerGuard) -> DeviceCodeSource {
        device_authorization(server, AUTHORIZATION).await;
        DeviceCodeSource::start(Client::new(), endpoints(server), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_poll_pending_keeps_interval() {
        let mut server = mockito::Server::new_async().await;
        let mut source = started(&mut server).await;
        token_endpoint(&mut server, 400, r#"{ "error": "authorization_pending" }"#).await;

        assert!(source.poll().await.unwrap().is_none());
        assert_eq!(source.interval, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_poll_slow_down_backs_off() {
        let mut server = mockito::Server::new_async().await;
        let mut source = started(&mut server).await;
        token_endpoint(&mut server, 400, r#"{ "error": "slow_down" }"#).await;

        assert!(source.poll().await.unwrap().is_none());
        assert_eq!(source.interval, Duration::from_secs(SLOW_DOWN_INCREMENT_SECS));
        assert!(source.poll().await.unwrap().is_none());
        assert_eq!(source.interval, Duration::from_secs(2 * SLOW_DOWN_INCREMENT_SECS));
    }

    #[tokio::test]
    async fn test_poll_access_denied() {
        let mut server = mockito::Server::new_async().await;
        let mut source = started(&mut server).await;
        token_endpoint(&mut server, 400, r#"{ "error": "access_denied" }"#).await;

        assert!(matches!(source.poll().await, Err(AuthError::Denied(m)) if m == "access_denied"));
    }

    #[tokio::test]
    async fn test_poll_expired_token() {
        let mut server = mockito::Server::new_async().await;
        let mut source = started(&mut server).await;
        token_endpoint(&mut server, 400, r#"{ "error": "expired_token" }"#).await;

        assert!(matches!(source.poll().await, Err(AuthError::Exchange(m)) if m == "expired_token"));
    }
}

//! OAuth2 client used to obtain access tokens.
//!
//! Implements `AuthClient` for the two supported grants:
//! - authorization code with PKCE, receiving the redirect on a loopback port
//! - device code (RFC 8628), polling the token endpoint
//!
//! Endpoints follow the `<auth_base_url>/as/...` layout of the identity
//! provider.

pub mod authorization_code;
pub mod device_code;
pub mod pkce;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::{AuthClient, AuthHint, GrantType, Token, TokenSource};
use crate::config::Config;
use crate::error::{AuthError, Error, Result};

pub use authorization_code::AuthorizationCodeSource;
pub use device_code::DeviceCodeSource;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds for a single OAuth2 request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Token lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub device_authorization_url: String,
    pub scopes: String,
    pub redirect_port: u16,
}

impl Endpoints {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client_id = config.require_client_id()?.to_string();
        let base = config.auth_base_url.trim_end_matches('/');
        Ok(Self {
            client_id,
            authorize_url: format!("{}/as/authorize", base),
            token_url: format!("{}/as/token", base),
            device_authorization_url: format!("{}/as/device_authorization", base),
            scopes: config.scopes.clone(),
            redirect_port: config.redirect_port,
        })
    }
}

/// OAuth2 client. Clone is cheap - reqwest::Client uses Arc internally.
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    endpoints: Arc<Endpoints>,
}

impl OAuthClient {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoints = Endpoints::from_config(config)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoints: Arc::new(endpoints),
        })
    }
}

#[async_trait]
impl AuthClient for OAuthClient {
    async fn token_source(
        &self,
        grant_type: GrantType,
        hint: Option<&AuthHint>,
    ) -> std::result::Result<Box<dyn TokenSource>, AuthError> {
        debug!(grant_type = %grant_type, client = ?hint.and_then(|h| h.client_name.as_deref()), "Starting OAuth2 exchange");
        match grant_type {
            GrantType::AuthorizationCode => {
                let source =
                    AuthorizationCodeSource::start(self.http.clone(), self.endpoints.clone(), hint)
                        .await?;
                Ok(Box::new(source))
            }
            GrantType::DeviceCode => {
                let source =
                    DeviceCodeSource::start(self.http.clone(), self.endpoints.clone(), hint).await?;
                Ok(Box::new(source))
            }
        }
    }
}

// ============================================================================
// Token endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// A lifetime that does not fit a timestamp is a protocol error, not a panic.
    fn into_token(self) -> std::result::Result<Token, AuthError> {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expiry = TimeDelta::try_seconds(lifetime)
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or_else(|| {
                AuthError::Exchange(format!("token lifetime out of range: {}s", lifetime))
            })?;
        Ok(Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expiry,
        })
    }
}

/// RFC 6749 §5.2 error body.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthErrorResponse {
    fn message(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{} ({})", self.error, description),
            None => self.error.clone(),
        }
    }

    fn into_auth_error(self) -> AuthError {
        if self.error == "access_denied" {
            AuthError::Denied(self.message())
        } else {
            AuthError::Exchange(self.message())
        }
    }
}

/// POST a form to the token endpoint. Protocol-level errors come back as
/// `Ok(Err(..))` so pollers can inspect the error code.
async fn request_token(
    http: &Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> std::result::Result<std::result::Result<TokenResponse, OAuthErrorResponse>, AuthError> {
    let response = http.post(token_url).form(form).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body)
            .map(Ok)
            .map_err(|e| AuthError::Exchange(format!("invalid token response: {}", e)));
    }

    serde_json::from_str::<OAuthErrorResponse>(&body)
        .map(Err)
        .map_err(|_| AuthError::Exchange(format!("token endpoint returned {}", status)))
}

/// Tell the user what to do. Goes to stderr because stdout may be the MCP
/// transport.
fn announce(hint: Option<&AuthHint>, message: &str) {
    match hint.and_then(|h| h.client_name.as_deref()) {
        Some(client) => eprintln!("\n[idgate] Sign-in requested by {}.\n{}\n", client, message),
        None => eprintln!("\n{}\n", message),
    }
    info!("{}", message);
}

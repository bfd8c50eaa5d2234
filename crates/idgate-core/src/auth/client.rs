use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::GrantType;
use crate::error::AuthError;

/// Token material returned by an OAuth2 exchange.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

/// Context about who is asking for a login, passed through to the auth
/// client so it can phrase its prompt for the environment it runs in.
#[derive(Debug, Clone, Default)]
pub struct AuthHint {
    /// Name the connected MCP client reported during initialization.
    pub client_name: Option<String>,
    /// False when the login was triggered from a running server rather than
    /// a terminal command.
    pub interactive: bool,
}

impl AuthHint {
    pub fn terminal() -> Self {
        Self {
            client_name: None,
            interactive: true,
        }
    }

    pub fn for_client(client_name: Option<String>) -> Self {
        Self {
            client_name,
            interactive: false,
        }
    }
}

/// A started exchange that yields a token once the user completes it.
#[async_trait]
pub trait TokenSource: Send {
    async fn token(&mut self) -> Result<Token, AuthError>;
}

/// Starts OAuth2 exchanges. Implemented by `oauth::OAuthClient`; tests plug
/// in scripted clients.
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn token_source(
        &self,
        grant_type: GrantType,
        hint: Option<&AuthHint>,
    ) -> Result<Box<dyn TokenSource>, AuthError>;
}

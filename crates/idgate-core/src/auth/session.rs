use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::client::Token;

/// One successful login, as persisted by a session store.
///
/// Expiry is not enforced by the stores: an expired session still loads, and
/// callers compare `expiry` against the clock themselves.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Expired,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => f.write_str("active"),
            SessionStatus::Expired => f.write_str("expired"),
        }
    }
}

impl AuthSession {
    /// Build a session from a freshly acquired token. The session id is
    /// generated here and is unrelated to the token contents.
    pub fn from_token(token: Token) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token.unwrap_or_default(),
            expiry: token.expiry,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A session is only usable while its expiry is strictly in the future.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_expired() {
            SessionStatus::Expired
        } else {
            SessionStatus::Active
        }
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expiry - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

// Token material stays out of logs.
impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("session_id", &self.session_id)
            .finish()
    }
}

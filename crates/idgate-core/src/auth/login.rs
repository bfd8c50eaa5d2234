//! Login orchestration and logout.
//!
//! `Authenticator` decides whether the stored session can be reused or a new
//! OAuth2 exchange must run. It is used both by the CLI commands and, once per
//! tool call, by the auth middleware.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{AuthClient, AuthHint, Token};
use super::{AuthSession, GrantType};
use crate::error::{AuthError, Error, Result, StoreError};
use crate::store::SessionStore;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for a complete OAuth2 exchange, user interaction included.
/// Five minutes is enough to finish a browser or device login.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Outcome of a logout, for callers that want to report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    NoSession,
    Removed { session_id: String },
}

/// Read the stored session, if any.
fn read_session(store: &dyn SessionStore, operation: &'static str) -> Result<Option<AuthSession>> {
    let exists = store
        .has_session()
        .map_err(|e| Error::store(operation, e))?;
    if !exists {
        return Ok(None);
    }

    match store.get_session() {
        Ok(session) => Ok(Some(session)),
        Err(StoreError::NotFound) => Err(Error::state(
            operation,
            "store reported a session but returned none",
        )),
        Err(e) => Err(Error::store(operation, e)),
    }
}

/// Remove the persisted session, if any.
pub fn logout(store: &dyn SessionStore) -> Result<LogoutOutcome> {
    const OP: &str = "logout";

    let exists = store.has_session().map_err(|e| Error::store(OP, e))?;
    if !exists {
        info!("No session to remove");
        return Ok(LogoutOutcome::NoSession);
    }

    let session = match store.get_session() {
        Ok(session) => session,
        Err(StoreError::NotFound) => {
            return Err(Error::state(OP, "store reported a session but returned none"));
        }
        Err(e) => return Err(Error::store(OP, e)),
    };

    store.delete_session().map_err(|e| Error::store(OP, e))?;
    info!(session_id = %session.session_id, "Session removed");

    Ok(LogoutOutcome::Removed {
        session_id: session.session_id,
    })
}

// ============================================================================
// Authenticator
// ============================================================================

/// Reuse-or-reauthenticate logic over one session store.
///
/// Nothing here serializes concurrent logins: two callers that both see no
/// valid session each run an exchange and the last `put_session` wins.
pub struct Authenticator {
    store: Arc<dyn SessionStore>,
    client: Arc<dyn AuthClient>,
    grant_type: GrantType,
    timeout: Duration,
}

#[derive(Default)]
pub struct AuthenticatorBuilder {
    store: Option<Arc<dyn SessionStore>>,
    client: Option<Arc<dyn AuthClient>>,
    grant_type: GrantType,
    timeout: Option<Duration>,
}

impl AuthenticatorBuilder {
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn client(mut self, client: Arc<dyn AuthClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn grant_type(mut self, grant_type: GrantType) -> Self {
        self.grant_type = grant_type;
        self
    }

    /// Override `AUTH_TIMEOUT`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Authenticator> {
        let store = self
            .store
            .ok_or_else(|| Error::Configuration("no session store was supplied".to_string()))?;
        let client = self
            .client
            .ok_or_else(|| Error::Configuration("no auth client was supplied".to_string()))?;

        Ok(Authenticator {
            store,
            client,
            grant_type: self.grant_type,
            timeout: self.timeout.unwrap_or(AUTH_TIMEOUT),
        })
    }
}

impl Authenticator {
    pub fn builder() -> AuthenticatorBuilder {
        AuthenticatorBuilder::default()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn grant_type(&self) -> GrantType {
        self.grant_type
    }

    /// Return the stored session if it is still valid, otherwise log in.
    pub async fn login_if_necessary(&self, cancel: &CancellationToken) -> Result<AuthSession> {
        self.login(false, None, cancel).await
    }

    /// Always run a new exchange, discarding any stored session first.
    pub async fn force_login(&self, cancel: &CancellationToken) -> Result<AuthSession> {
        self.login(true, None, cancel).await
    }

    pub fn logout(&self) -> Result<LogoutOutcome> {
        logout(self.store.as_ref())
    }

    /// Full login decision. `hint` is forwarded to the auth client.
    ///
    /// On failure the store is not written; if a stale session was deleted
    /// before the exchange failed, the store stays empty.
    pub async fn login(
        &self,
        force_reauth: bool,
        hint: Option<&AuthHint>,
        cancel: &CancellationToken,
    ) -> Result<AuthSession> {
        const OP: &str = "login";

        if let Some(session) = self.with_store(OP, |store| read_session(store, OP)).await? {
            if !force_reauth && !session.is_expired() {
                debug!(session_id = %session.session_id, "Reusing stored session");
                return Ok(session);
            }

            if force_reauth {
                info!(session_id = %session.session_id, "Re-authentication requested, discarding session");
            } else {
                info!(session_id = %session.session_id, expiry = %session.expiry, "Session expired, discarding");
            }
            self.with_store(OP, logout).await?;
        }

        info!(grant_type = %self.grant_type, "Starting authentication");
        let token = self
            .acquire_token(hint, cancel)
            .await
            .map_err(|e| Error::auth(OP, e))?;

        let session = AuthSession::from_token(token);
        let stored = session.clone();
        self.with_store(OP, move |store| {
            store.put_session(&stored).map_err(|e| Error::store(OP, e))
        })
        .await?;

        info!(session_id = %session.session_id, expiry = %session.expiry, "Login successful");
        Ok(session)
    }

    /// Run store access on the blocking pool. Keychain and file backends
    /// block the calling thread.
    async fn with_store<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&dyn SessionStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| Error::state(operation, format!("session store task failed: {}", e)))?
    }

    /// Start the exchange and wait for its token, bounded by the timeout and
    /// the cancellation token.
    async fn acquire_token(
        &self,
        hint: Option<&AuthHint>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Token, AuthError> {
        let exchange = async {
            let mut source = self.client.token_source(self.grant_type, hint).await?;
            source.token().await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Authentication cancelled");
                Err(AuthError::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, exchange) => match result {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout = ?self.timeout, "Authentication timed out");
                    Err(AuthError::TimedOut(self.timeout))
                }
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

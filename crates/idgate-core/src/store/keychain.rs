use keyring::Entry;
use tracing::debug;

use super::SessionStore;
use crate::auth::AuthSession;
use crate::error::StoreError;

const SERVICE_NAME: &str = "idgate";

/// Fixed account name: one session per machine profile.
const ACCOUNT_NAME: &str = "session";

/// Stores the session JSON document in the OS keychain.
pub struct KeychainSessionStore {
    entry: Entry,
}

impl KeychainSessionStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self::with_entry(Entry::new(SERVICE_NAME, ACCOUNT_NAME)?))
    }

    /// Store backed by an existing entry (mock credentials in tests).
    pub fn with_entry(entry: Entry) -> Self {
        Self { entry }
    }
}

impl SessionStore for KeychainSessionStore {
    fn put_session(&self, session: &AuthSession) -> Result<(), StoreError> {
        let contents = serde_json::to_string(session).map_err(StoreError::Serialization)?;
        self.entry.set_password(&contents)?;
        debug!(session_id = %session.session_id, "Session written to keychain");
        Ok(())
    }

    fn get_session(&self) -> Result<AuthSession, StoreError> {
        let contents = match self.entry.get_password() {
            Ok(contents) => contents,
            Err(keyring::Error::NoEntry) => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(StoreError::Corrupt)
    }

    fn delete_session(&self) -> Result<(), StoreError> {
        match self.entry.delete_credential() {
            Ok(()) => {
                debug!("Session removed from keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> String {
        format!("keychain ({}/{})", SERVICE_NAME, ACCOUNT_NAME)
    }
}

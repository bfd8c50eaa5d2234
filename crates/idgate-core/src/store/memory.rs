use std::sync::{Mutex, MutexGuard};

use super::SessionStore;
use crate::auth::AuthSession;
use crate::error::StoreError;

/// Non-persistent store. Keeps the serialized document rather than the
/// struct so it behaves like the real backends, corrupt payloads included.
#[derive(Default)]
pub struct MemorySessionStore {
    contents: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored document verbatim.
    pub fn put_raw(&self, contents: impl Into<String>) {
        *self.lock() = Some(contents.into());
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.contents.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn put_session(&self, session: &AuthSession) -> Result<(), StoreError> {
        let contents = serde_json::to_string(session).map_err(StoreError::Serialization)?;
        *self.lock() = Some(contents);
        Ok(())
    }

    fn get_session(&self) -> Result<AuthSession, StoreError> {
        match self.lock().as_deref() {
            Some(contents) => serde_json::from_str(contents).map_err(StoreError::Corrupt),
            None => Err(StoreError::NotFound),
        }
    }

    fn delete_session(&self) -> Result<(), StoreError> {
        *self.lock() = None;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

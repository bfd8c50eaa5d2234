//! Session persistence.
//!
//! Every backend holds at most one `AuthSession`: the storage key is fixed
//! and never derived from the user, so a store is scoped to the local
//! machine/user profile. Callers pick a backend with `StoreType` and then
//! only talk to the `SessionStore` trait.

pub mod file;
pub mod keychain;
pub mod memory;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::AuthSession;
use crate::error::{ParseError, StoreError};

pub use file::FileSessionStore;
pub use keychain::KeychainSessionStore;
pub use memory::MemorySessionStore;

/// Single-record session storage.
///
/// `put_session` replaces whatever was stored. `delete_session` on an empty
/// store is not an error. A stored payload that cannot be decoded is an
/// error for both `get_session` and `has_session`.
pub trait SessionStore: Send + Sync {
    fn put_session(&self, session: &AuthSession) -> Result<(), StoreError>;

    fn get_session(&self) -> Result<AuthSession, StoreError>;

    fn delete_session(&self) -> Result<(), StoreError>;

    /// Human-readable location, for logs and the `session` command.
    fn location(&self) -> String;

    fn has_session(&self) -> Result<bool, StoreError> {
        match self.get_session() {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Persistence backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    #[default]
    Keychain,
    File,
}

impl StoreType {
    pub const ALL: [StoreType; 2] = [StoreType::Keychain, StoreType::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Keychain => "keychain",
            StoreType::File => "file",
        }
    }

    /// Construct the backend. `base_dir` only applies to the file store and
    /// defaults to the home directory.
    pub fn open(&self, base_dir: Option<PathBuf>) -> Result<Arc<dyn SessionStore>, StoreError> {
        match self {
            StoreType::Keychain => Ok(Arc::new(KeychainSessionStore::new()?)),
            StoreType::File => {
                let store = match base_dir {
                    Some(dir) => FileSessionStore::with_base_dir(dir),
                    None => FileSessionStore::new()?,
                };
                Ok(Arc::new(store))
            }
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keychain" => Ok(StoreType::Keychain),
            "file" => Ok(StoreType::File),
            other => Err(ParseError {
                kind: "store type",
                value: other.to_string(),
                expected: "keychain, file",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_type_parse() {
        assert_eq!("keychain".parse::<StoreType>().unwrap(), StoreType::Keychain);
        assert_eq!("file".parse::<StoreType>().unwrap(), StoreType::File);
        let err = "memory".parse::<StoreType>().unwrap_err();
        assert_eq!(err.kind, "store type");
        assert!("File".parse::<StoreType>().is_err());
    }

    #[test]
    fn test_store_type_display_round_trips() {
        for store_type in StoreType::ALL {
            assert_eq!(store_type.to_string().parse::<StoreType>().unwrap(), store_type);
        }
    }

    #[test]
    fn test_open_file_store_uses_base_dir() {
        let dir = TempDir::new().unwrap();
        let store = StoreType::File.open(Some(dir.path().to_path_buf())).unwrap();
        assert!(store.location().starts_with(&dir.path().display().to_string()));
        assert!(!store.has_session().unwrap());
    }
}

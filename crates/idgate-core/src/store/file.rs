use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::SessionStore;
use crate::auth::AuthSession;
use crate::error::StoreError;

/// Directory created under the base directory (home by default)
const SESSION_DIR: &str = ".idgate";

/// Session file name inside `SESSION_DIR`
const SESSION_FILE: &str = "session.json";

/// Stores the session as a JSON document readable only by the owner.
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    /// Store rooted at the current user's home directory.
    pub fn new() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDirectory)?;
        Ok(Self::with_base_dir(home))
    }

    /// Store rooted at an explicit directory (used by tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn session_path(&self) -> PathBuf {
        self.base_dir.join(SESSION_DIR).join(SESSION_FILE)
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn create_dir(dir: &Path) -> Result<(), StoreError> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(dir).map_err(|e| Self::io_error(dir, e))
    }

    /// Write to a sibling temp file, then rename over the target so readers
    /// see either the old document or the new one. A failed write leaves no
    /// temp file behind.
    fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp_path = path.with_extension("json.tmp");
        let result = Self::write_then_rename(&tmp_path, path, contents);
        if result.is_err() {
            if let Err(e) = fs::remove_file(&tmp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %tmp_path.display(), error = %e, "Could not remove temp session file");
                }
            }
        }
        result
    }

    fn write_then_rename(tmp_path: &Path, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(tmp_path)
            .map_err(|e| Self::io_error(tmp_path, e))?;
        file.write_all(contents)
            .and_then(|_| file.sync_all())
            .map_err(|e| Self::io_error(tmp_path, e))?;
        drop(file);

        // The temp file may predate this process with looser permissions.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp_path, fs::Permissions::from_mode(0o600))
                .map_err(|e| Self::io_error(tmp_path, e))?;
        }

        fs::rename(tmp_path, path).map_err(|e| Self::io_error(path, e))
    }
}

impl SessionStore for FileSessionStore {
    fn put_session(&self, session: &AuthSession) -> Result<(), StoreError> {
        let path = self.session_path();
        let contents = serde_json::to_vec_pretty(session).map_err(StoreError::Serialization)?;

        if let Some(parent) = path.parent() {
            Self::create_dir(parent)?;
        }
        Self::write_atomic(&path, &contents)?;

        debug!(path = %path.display(), session_id = %session.session_id, "Session written");
        Ok(())
    }

    fn get_session(&self) -> Result<AuthSession, StoreError> {
        let path = self.session_path();
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(Self::io_error(&path, e)),
        };
        serde_json::from_slice(&contents).map_err(StoreError::Corrupt)
    }

    fn delete_session(&self) -> Result<(), StoreError> {
        let path = self.session_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn location(&self) -> String {
        self.session_path().display().to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn create_temp_store() -> (FileSessionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::with_base_dir(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    fn sample_session(id: &str) -> AuthSession {
        AuthSession {
            access_token: format!("access-{}", id),
            refresh_token: format!("refresh-{}", id),
            expiry: Utc::now() + Duration::hours(1),
            session_id: id.to_string(),
        }
    }

    #[test]
    fn test_put_then_get_returns_same_session() {
        let (store, _temp_dir) = create_temp_store();
        let session = sample_session("s1");

        store.put_session(&session).unwrap();

        let loaded = store.get_session().unwrap();
        assert_eq!(loaded, session);
        assert!(store.has_session().unwrap());
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let (store, _temp_dir) = create_temp_store();
        assert!(!store.has_session().unwrap());
        assert!(matches!(store.get_session(), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_put_overwrites_previous_session() {
        let (store, _temp_dir) = create_temp_store();
        store.put_session(&sample_session("old")).unwrap();
        store.put_session(&sample_session("new")).unwrap();

        let loaded = store.get_session().unwrap();
        assert_eq!(loaded.session_id, "new");
        assert_eq!(loaded.access_token, "access-new");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, _temp_dir) = create_temp_store();
        store.delete_session().unwrap();

        store.put_session(&sample_session("s1")).unwrap();
        store.delete_session().unwrap();
        assert!(!store.has_session().unwrap());
        store.delete_session().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (store, _temp_dir) = create_temp_store();
        let path = store.session_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(store.has_session(), Err(StoreError::Corrupt(_))));
        assert!(matches!(store.get_session(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_expired_session_still_loads() {
        let (store, _temp_dir) = create_temp_store();
        let mut session = sample_session("old");
        session.expiry = Utc::now() - Duration::hours(1);
        store.put_session(&session).unwrap();

        let loaded = store.get_session().unwrap();
        assert!(loaded.is_expired());
    }

    #[test]
    fn test_file_is_plain_json_document() {
        let (store, _temp_dir) = create_temp_store();
        store.put_session(&sample_session("s1")).unwrap();

        let contents = fs::read_to_string(store.session_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["accessToken"], "access-s1");
        assert_eq!(value["refreshToken"], "refresh-s1");
        assert!(value["expiry"].as_str().is_some());
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _temp_dir) = create_temp_store();
        store.put_session(&sample_session("s1")).unwrap();

        let path = store.session_path();
        let file_mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);

        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let (store, _temp_dir) = create_temp_store();
        let path = store.session_path();
        // A non-empty directory where the session file goes makes the rename fail.
        fs::create_dir_all(path.join("occupied")).unwrap();

        let result = store.put_session(&sample_session("s1"));

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.is_dir());
    }
}

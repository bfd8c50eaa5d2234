use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error for session, login and request-pipeline operations.
///
/// Store and auth failures carry the name of the operation that hit them so
/// the CLI can print a single useful line.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{operation}: {source}")]
    Auth {
        operation: &'static str,
        #[source]
        source: AuthError,
    },

    #[error("{operation}: internal consistency error: {message}")]
    State {
        operation: &'static str,
        message: String,
    },

    /// Raised by the auth middleware; keeps auth failures distinguishable
    /// from failures of the tool itself.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[source] Box<Error>),

    #[error("tool '{0}' is not available")]
    ToolUnavailable(String),

    #[error("tool '{name}' failed: {message}")]
    Tool { name: String, message: String },
}

impl Error {
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        Error::Store { operation, source }
    }

    pub fn auth(operation: &'static str, source: AuthError) -> Self {
        Error::Auth { operation, source }
    }

    pub fn state(operation: &'static str, message: impl Into<String>) -> Self {
        Error::State {
            operation,
            message: message.into(),
        }
    }

    pub fn tool(name: impl Into<String>, message: impl ToString) -> Self {
        Error::Tool {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// True when the underlying failure is an authentication timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Auth { source, .. } => matches!(source, AuthError::TimedOut(_)),
            Error::AuthenticationFailed(inner) => inner.is_timeout(),
            _ => false,
        }
    }
}

/// Failures of a session store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no session found")]
    NotFound,

    #[error("failed to serialize session: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("stored session is unreadable: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("session file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("could not determine home directory")]
    NoHomeDirectory,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Failures while acquiring a token.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("authentication timed out after {}", format_timeout(.0))]
    TimedOut(Duration),

    #[error("authentication cancelled")]
    Cancelled,

    #[error("unexpected request payload: {0}")]
    InvalidRequest(String),

    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("redirect listener error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

/// An external string did not name a known enum variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized {kind} '{value}' (expected one of: {expected})")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

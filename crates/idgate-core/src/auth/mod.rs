//! Authentication module for managing the local login session.
//!
//! This module provides:
//! - `AuthSession`: the persisted outcome of a successful login
//! - `GrantType`: which OAuth2 exchange the auth client performs
//! - `AuthClient` / `TokenSource`: the seam to the OAuth2 implementation
//! - `Authenticator`: reuse-or-reauthenticate logic, plus logout
//!
//! Expired sessions are never refreshed in place; they are deleted and a new
//! login runs.

pub mod client;
pub mod grant;
pub mod login;
pub mod session;

pub use client::{AuthClient, AuthHint, Token, TokenSource};
pub use grant::GrantType;
pub use login::{logout, Authenticator, AuthenticatorBuilder, LogoutOutcome, AUTH_TIMEOUT};
pub use session::{AuthSession, SessionStatus};

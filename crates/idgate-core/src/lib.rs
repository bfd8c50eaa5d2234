//! Core library for idgate.
//!
//! This crate owns everything stateful about talking to the identity-management
//! API on behalf of a local user:
//!
//! - `auth`: the persisted `AuthSession`, grant types, the login orchestrator
//!   and logout, plus the traits an OAuth2 client must implement
//! - `store`: single-record session persistence (keychain, file, memory)
//! - `middleware`: the per-request pipeline placed in front of tool handlers
//! - `tools`: tool descriptors and the read-only/include/exclude filter
//! - `oauth`: the concrete OAuth2 client (authorization code + PKCE, device code)
//! - `api`: the management API HTTP client
//! - `config`: endpoint and client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod store;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::{AuthError, Error, ParseError, Result, StoreError};

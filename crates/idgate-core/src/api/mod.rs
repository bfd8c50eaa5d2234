//! REST client for the identity-management API.
//!
//! This module provides the `ApiClient` used by tool handlers to call the
//! management API with the bearer token of the current session.

pub mod client;
pub mod error;

pub use client::{expand_path, ApiClient, Method};
pub use error::ApiError;

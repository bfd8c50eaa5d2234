//! Subcommand implementations.

pub mod login;
pub mod logout;
pub mod run;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use idgate_core::auth::{Authenticator, GrantType};
use idgate_core::config::Config;
use idgate_core::oauth::OAuthClient;
use idgate_core::store::{SessionStore, StoreType};

pub fn open_store(store_type: StoreType, store_dir: Option<PathBuf>) -> Result<Arc<dyn SessionStore>> {
    store_type
        .open(store_dir)
        .with_context(|| format!("Failed to open {} session store", store_type))
}

/// Authenticator backed by the configured OAuth2 client.
pub fn authenticator(
    config: &Config,
    grant_type: GrantType,
    store: Arc<dyn SessionStore>,
) -> Result<Arc<Authenticator>> {
    let client = OAuthClient::new(config)?;
    let authenticator = Authenticator::builder()
        .store(store)
        .client(Arc::new(client))
        .grant_type(grant_type)
        .build()?;
    Ok(Arc::new(authenticator))
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use idgate_core::auth::GrantType;
use idgate_core::config::Config;
use idgate_core::store::StoreType;

pub async fn run(
    grant_type: GrantType,
    store_type: StoreType,
    store_dir: Option<PathBuf>,
    cancel: &CancellationToken,
) -> Result<()> {
    let config = Config::load()?;
    let store = super::open_store(store_type, store_dir)?;
    let authenticator = super::authenticator(&config, grant_type, store.clone())?;

    let session = authenticator
        .force_login(cancel)
        .await
        .context("Login failed")?;

    println!("Logged in.");
    println!("  Session: {}", session.session_id);
    println!(
        "  Expires: {} ({} minutes)",
        session.expiry.to_rfc3339(),
        session.minutes_until_expiry()
    );
    println!("  Stored in: {}", store.location());
    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};

use idgate_core::auth::{logout, LogoutOutcome};
use idgate_core::store::StoreType;

pub fn run(store_type: StoreType, store_dir: Option<PathBuf>) -> Result<()> {
    let store = super::open_store(store_type, store_dir)?;
    let outcome = logout(store.as_ref()).context("Logout failed")?;
    println!("{}", describe(&outcome));
    Ok(())
}

fn describe(outcome: &LogoutOutcome) -> String {
    match outcome {
        LogoutOutcome::NoSession => "No session to log out of.".to_string(),
        LogoutOutcome::Removed { session_id } => format!("Logged out (session {}).", session_id),
    }
}

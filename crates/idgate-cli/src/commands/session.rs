use std::path::PathBuf;

use anyhow::{Context, Result};

use idgate_core::auth::AuthSession;
use idgate_core::store::{SessionStore, StoreType};
use idgate_core::Error;

pub fn run(store_type: StoreType, store_dir: Option<PathBuf>) -> Result<()> {
    let store = super::open_store(store_type, store_dir)?;
    let session = current(store.as_ref()).context("Failed to read session")?;
    println!("{}", describe(session.as_ref(), &store.location()));
    Ok(())
}

/// Read the stored session without touching the network.
fn current(store: &dyn SessionStore) -> idgate_core::Result<Option<AuthSession>> {
    const OP: &str = "session";

    if !store.has_session().map_err(|e| Error::store(OP, e))? {
        return Ok(None);
    }
    match store.get_session() {
        Ok(session) => Ok(Some(session)),
        Err(e) if e.is_not_found() => Err(Error::state(
            OP,
            "store reported a session but returned none",
        )),
        Err(e) => Err(Error::store(OP, e)),
    }
}

fn describe(session: Option<&AuthSession>, location: &str) -> String {
    match session {
        None => format!("No session ({}).", location),
        Some(session) => format!(
            "Session: {}\nExpiry:  {}\nStatus:  {}\nStore:   {}",
            session.session_id,
            session.expiry.to_rfc3339(),
            session.status(),
            location
        ),
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use idgate_core::api::ApiClient;
use idgate_core::auth::GrantType;
use idgate_core::config::Config;
use idgate_core::middleware::Pipeline;
use idgate_core::store::{SessionStore, StoreType};
use idgate_core::tools::ToolFilter;

use crate::server::{CatalogEntry, McpServer, ToolRouter, CATALOG};

pub struct RunOptions {
    pub grant_type: GrantType,
    pub store_type: StoreType,
    pub store_dir: Option<PathBuf>,
    pub include_tools: Vec<String>,
    pub exclude_tools: Vec<String>,
    pub include_collections: Vec<String>,
    pub exclude_collections: Vec<String>,
    pub read_only: bool,
}

impl RunOptions {
    fn filter(&self) -> ToolFilter {
        ToolFilter::new(self.read_only)
            .include_tools(self.include_tools.iter().cloned())
            .exclude_tools(self.exclude_tools.iter().cloned())
            .include_collections(self.include_collections.iter().cloned())
            .exclude_collections(self.exclude_collections.iter().cloned())
    }
}

/// Start the MCP server on stdio. Login is left to the first tool call.
pub async fn run(options: RunOptions, cancel: CancellationToken) -> Result<()> {
    let config = Config::load()?;
    let store = super::open_store(options.store_type, options.store_dir.clone())?;
    check_session(store.as_ref());

    let filter = options.filter();
    for name in filter.unknown_names(CATALOG) {
        warn!(name = %name, "Filter names a tool or collection that does not exist");
    }
    let advertised: Vec<&'static CatalogEntry> = filter.apply(CATALOG);
    info!(
        read_only = filter.is_read_only(),
        tools = advertised.len(),
        "Tool filter applied"
    );

    let authenticator = super::authenticator(&config, options.grant_type, store)?;
    let api = ApiClient::new(config.api_base_url.clone())
        .context("Failed to create management API client")?;
    let router = ToolRouter::new(api, &advertised);
    let pipeline = Pipeline::standard(
        std::sync::Arc::new(router),
        authenticator,
        advertised.iter().map(|entry| entry.name()),
    );

    let server = McpServer::new(pipeline, &advertised, cancel.clone())
        .map_err(|e| anyhow::anyhow!("Failed to build tool list: {}", e.message))?;

    info!(
        grant_type = %options.grant_type,
        store_type = %options.store_type,
        "Starting MCP server on stdio"
    );
    let service = server
        .serve(stdio())
        .await
        .context("Failed to start MCP service")?;

    tokio::select! {
        result = service.waiting() => {
            result.context("MCP service terminated abnormally")?;
            info!("MCP client disconnected");
        }
        _ = cancel.cancelled() => info!("MCP server stopped"),
    }
    Ok(())
}

/// Report the stored session. Problems are only logged: the auth middleware
/// resolves them on the first tool call.
fn check_session(store: &dyn SessionStore) {
    match store.get_session() {
        Ok(session) if session.is_expired() => warn!(
            session_id = %session.session_id,
            expiry = %session.expiry,
            "Stored session has expired; the next tool call will sign in again"
        ),
        Ok(session) => info!(
            session_id = %session.session_id,
            minutes_left = session.minutes_until_expiry(),
            "Using stored session"
        ),
        Err(e) if e.is_not_found() => {
            warn!(location = %store.location(), "No stored session; the first tool call will sign in")
        }
        Err(e) => warn!(error = %e, "Could not read stored session"),
    }
}

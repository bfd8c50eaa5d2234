//! Terminal handler of the request pipeline.
//!
//! `tools/list` answers with the names of the advertised tools; `tools/call`
//! performs the tool's HTTP route with the bearer token the auth middleware
//! attached to the request.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use idgate_core::api::{expand_path, ApiClient};
use idgate_core::middleware::{Handler, Request, Response, TOOLS_CALL, TOOLS_LIST};
use idgate_core::{Error, Result};

use super::catalog::CatalogEntry;

pub struct ToolRouter {
    api: ApiClient,
    tools: HashMap<&'static str, &'static CatalogEntry>,
}

impl ToolRouter {
    /// Route calls for `tools`, which should already be filtered.
    pub fn new<'a, I>(api: ApiClient, tools: I) -> Self
    where
        I: IntoIterator<Item = &'a &'static CatalogEntry>,
    {
        let tools = tools.into_iter().map(|entry| (entry.name(), *entry)).collect();
        Self { api, tools }
    }

    fn list(&self) -> Response {
        let mut names: Vec<&str> = self.tools.keys().copied().collect();
        names.sort_unstable();
        json!({ "tools": names })
    }

    async fn call_tool(&self, request: &Request) -> Result<Response> {
        let call = request
            .tool_call_params()
            .map_err(|e| Error::tool("<unknown>", format!("invalid tool call: {}", e)))?;
        let entry = self
            .tools
            .get(call.name.as_str())
            .ok_or_else(|| Error::ToolUnavailable(call.name.clone()))?;
        let token = request
            .context
            .auth
            .as_ref()
            .map(|auth| auth.bearer_token())
            .ok_or_else(|| Error::tool(&call.name, "request was not authenticated"))?;

        let arguments = call.arguments.unwrap_or_default();
        let path = expand_path(entry.path, &arguments).map_err(|e| Error::tool(&call.name, e))?;
        let body = request_body(entry, &arguments).map_err(|message| Error::tool(&call.name, message))?;

        debug!(tool = %call.name, method = %entry.method, path = %path, "Calling management API");
        self.api
            .with_token(token)
            .request(entry.method.clone(), &path, body)
            .await
            .map_err(|e| Error::tool(&call.name, e))
    }
}

fn request_body<'a>(
    entry: &CatalogEntry,
    arguments: &'a Map<String, Value>,
) -> std::result::Result<Option<&'a Value>, &'static str> {
    if !entry.has_body() {
        return Ok(None);
    }
    match arguments.get("body") {
        Some(body @ Value::Object(_)) => Ok(Some(body)),
        Some(_) => Err("'body' must be a JSON object"),
        None => Err("missing 'body' argument"),
    }
}

#[async_trait]
impl Handler for ToolRouter {
    async fn call(&self, request: Request) -> Result<Response> {
        match request.method.as_str() {
            TOOLS_LIST => Ok(self.list()),
            TOOLS_CALL => self.call_tool(&request).await,
            other => Err(Error::tool(other, "unsupported request method")),
        }
    }
}

//! rmcp handler that feeds MCP requests into the request pipeline.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext as McpRequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use idgate_core::middleware::{Pipeline, Request, RequestContext, ToolCall};
use idgate_core::Error;

use super::catalog::CatalogEntry;

#[derive(Clone)]
pub struct McpServer {
    pipeline: Arc<Pipeline>,
    tools: Arc<Vec<Tool>>,
    cancel: CancellationToken,
}

impl McpServer {
    /// `entries` are the tools advertised for this run.
    pub fn new(
        pipeline: Pipeline,
        entries: &[&CatalogEntry],
        cancel: CancellationToken,
    ) -> Result<Self, McpError> {
        let tools = entries
            .iter()
            .map(|entry| create_tool(entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            tools: Arc::new(tools),
            cancel,
        })
    }

    fn request_context(&self, context: &McpRequestContext<RoleServer>) -> RequestContext {
        let client_name = context
            .peer
            .peer_info()
            .map(|info| info.client_info.name.clone());
        RequestContext {
            client_name,
            cancel: self.cancel.clone(),
            auth: None,
        }
    }
}

/// Create a tool definition from a catalog entry
fn create_tool(entry: &CatalogEntry) -> Result<Tool, McpError> {
    let schema_value = serde_json::to_value(entry.input_schema())
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let input_schema = schema_value
        .as_object()
        .ok_or_else(|| {
            McpError::internal_error(format!("Schema for {} is not an object", entry.name()), None)
        })?
        .clone();

    Ok(Tool {
        name: Cow::Borrowed(entry.name()),
        title: None,
        description: Some(Cow::Borrowed(entry.description)),
        input_schema: Arc::new(input_schema),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: Default::default(),
    })
}

/// Tool failures go back to the model as error results; protocol misuse is
/// an MCP error.
fn into_call_result(result: idgate_core::Result<Value>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(Error::ToolUnavailable(name)) => Err(McpError::invalid_params(
            format!("Unknown tool: {}", name),
            None,
        )),
        Err(e @ (Error::AuthenticationFailed(_) | Error::Tool { .. })) => {
            Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
        }
        Err(e) => Err(McpError::internal_error(e.to_string(), None)),
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "idgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Identity-management API tools.\n\n\
                 Tool calls use the locally stored login session. When there is no valid \
                 session the first call starts a sign-in; follow the instructions printed \
                 by the server.\n"
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        context: McpRequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let request = Request::list_tools().with_context(self.request_context(&context));
        let response = self
            .pipeline
            .dispatch(request)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let names: HashSet<&str> = response["tools"]
            .as_array()
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let tools = self
            .tools
            .iter()
            .filter(|tool| names.contains(tool.name.as_ref()))
            .cloned()
            .collect();

        Ok(ListToolsResult {
            tools,
            meta: Default::default(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: McpRequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        debug!(tool = %request.name, "Tool call received");
        let call = ToolCall {
            name: request.name.to_string(),
            arguments: request.arguments,
        };
        let request = Request::tool_call(&call).with_context(self.request_context(&context));
        into_call_result(self.pipeline.dispatch(request).await)
    }
}

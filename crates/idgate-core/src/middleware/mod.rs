//! Request pipeline in front of the tool handlers.
//!
//! A `Pipeline` is an ordered list of `Middleware` plus a terminal `Handler`.
//! Each middleware gets the request and a `Next` continuation and either calls
//! `next.run(request)` or returns an error without calling it.
//!
//! The standard order is audit logging, then authentication, then tool policy.

pub mod audit;
pub mod auth;
pub mod policy;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthSession, Authenticator};
use crate::error::Result;

pub use audit::AuditMiddleware;
pub use auth::AuthMiddleware;
pub use policy::PolicyMiddleware;

/// MCP method name for tool invocations.
pub const TOOLS_CALL: &str = "tools/call";

/// MCP method name for tool listing.
pub const TOOLS_LIST: &str = "tools/list";

pub type Response = Value;

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// Authenticated state attached by `AuthMiddleware`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session: AuthSession,
}

impl AuthContext {
    pub fn bearer_token(&self) -> &str {
        &self.session.access_token
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Name the MCP client reported during initialization.
    pub client_name: Option<String>,
    /// Cancelled when the process shuts down.
    pub cancel: CancellationToken,
    /// Set once authentication succeeded for this request.
    pub auth: Option<AuthContext>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub params: Value,
    pub context: RequestContext,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            context: RequestContext::default(),
        }
    }

    pub fn tool_call(call: &ToolCall) -> Self {
        let params = serde_json::to_value(call).unwrap_or(Value::Null);
        Self::new(TOOLS_CALL, params)
    }

    pub fn list_tools() -> Self {
        Self::new(TOOLS_LIST, Value::Null)
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn is_tool_call(&self) -> bool {
        self.method == TOOLS_CALL
    }

    /// Decode the params of a tool call.
    pub fn tool_call_params(&self) -> std::result::Result<ToolCall, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }

    /// Tool name for logging, if this looks like a tool call.
    pub fn tool_name(&self) -> Option<&str> {
        if !self.is_tool_call() {
            return None;
        }
        self.params.get("name").and_then(Value::as_str)
    }
}

/// Terminal request handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request) -> Result<Response>;
}

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response>;
}

/// The rest of the pipeline after the current middleware.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub async fn run(self, request: Request) -> Result<Response> {
        match self.middlewares.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middlewares: rest,
                    endpoint: self.endpoint,
                };
                current.handle(request, next).await
            }
            None => self.endpoint.call(request).await,
        }
    }
}

pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn new(endpoint: Arc<dyn Handler>) -> Self {
        Self {
            middlewares: Vec::new(),
            endpoint,
        }
    }

    /// Audit, auth and policy middlewares in their required order.
    pub fn standard<I, S>(
        endpoint: Arc<dyn Handler>,
        authenticator: Arc<Authenticator>,
        advertised_tools: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(endpoint)
            .with(AuditMiddleware)
            .with(AuthMiddleware::new(authenticator))
            .with(PolicyMiddleware::new(advertised_tools))
    }

    /// Append a middleware; it runs after the ones already added.
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        Next {
            middlewares: &self.middlewares,
            endpoint: self.endpoint.as_ref(),
        }
        .run(request)
        .await
    }
}

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::warn;

use super::{Middleware, Next, Request, Response};
use crate::error::{Error, Result};

/// Rejects calls to tools that were not advertised for this run.
///
/// Clients normally only call listed tools; this keeps a filtered-out write
/// tool from being invoked by name anyway.
pub struct PolicyMiddleware {
    allowed: HashSet<String>,
}

impl PolicyMiddleware {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Middleware for PolicyMiddleware {
    fn name(&self) -> &'static str {
        "policy"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response> {
        if !request.is_tool_call() {
            return next.run(request).await;
        }

        let name = match request.tool_call_params() {
            Ok(call) => call.name,
            Err(e) => return Err(Error::tool("<unknown>", format!("invalid tool call: {}", e))),
        };

        if !self.allowed.contains(&name) {
            warn!(tool = %name, "Call to tool that is not enabled");
            return Err(Error::ToolUnavailable(name));
        }

        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Handler, Pipeline, ToolCall};
    use serde_json::json;
    use std::sync::Arc;

    struct Ok200;

    #[async_trait]
    impl Handler for Ok200 {
        async fn call(&self, _request: Request) -> Result<Response> {
            Ok(json!({ "ok": true }))
        }
    }

    fn call(name: &str) -> Request {
        Request::tool_call(&ToolCall {
            name: name.to_string(),
            arguments: None,
        })
    }

    #[tokio::test]
    async fn test_allowed_tool_passes() {
        let pipeline = Pipeline::new(Arc::new(Ok200)).with(PolicyMiddleware::new(["list_environments"]));
        let response = pipeline.dispatch(call("list_environments")).await.unwrap();
        assert_eq!(response["ok"], true);
    }

    #[tokio::test]
    async fn test_filtered_tool_is_rejected() {
        let pipeline = Pipeline::new(Arc::new(Ok200)).with(PolicyMiddleware::new(["list_environments"]));
        let err = pipeline.dispatch(call("create_environment")).await.unwrap_err();
        assert!(matches!(err, Error::ToolUnavailable(ref name) if name == "create_environment"));
    }

    #[tokio::test]
    async fn test_listing_is_not_filtered() {
        let pipeline = Pipeline::new(Arc::new(Ok200)).with(PolicyMiddleware::new(Vec::<String>::new()));
        assert!(pipeline.dispatch(Request::list_tools()).await.is_ok());
    }
}

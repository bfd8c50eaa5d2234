use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, info_span, warn, Instrument};

use super::{Middleware, Next, Request, Response};
use crate::error::Result;

/// Logs every request with its outcome and duration.
pub struct AuditMiddleware;

#[async_trait]
impl Middleware for AuditMiddleware {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response> {
        let method = request.method.clone();
        let tool = request.tool_name().map(str::to_string);
        let span = info_span!("request", method = %method, tool = tool.as_deref().unwrap_or("-"));
        let started = Instant::now();

        let result = next.run(request).instrument(span.clone()).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        span.in_scope(|| match &result {
            Ok(_) => info!(elapsed_ms, "Request completed"),
            Err(e) => warn!(elapsed_ms, error = %e, "Request failed"),
        });
        result
    }
}

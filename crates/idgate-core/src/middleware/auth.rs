use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AuthContext, Middleware, Next, Request, Response};
use crate::auth::{AuthHint, Authenticator};
use crate::error::{AuthError, Error, Result};

/// Makes sure a valid session exists before any tool call runs.
///
/// Runs the same reuse-or-login decision as the `login` command on every
/// tool call, so a session that expires while the server is up is replaced
/// on the next call. Non-tool requests pass through untouched.
pub struct AuthMiddleware {
    authenticator: Arc<Authenticator>,
}

impl AuthMiddleware {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn handle(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        if !request.is_tool_call() {
            return next.run(request).await;
        }

        if let Err(e) = request.tool_call_params() {
            warn!(error = %e, "Rejecting malformed tool call");
            let source = Error::auth("authenticate", AuthError::InvalidRequest(e.to_string()));
            return Err(Error::AuthenticationFailed(Box::new(source)));
        }

        let hint = AuthHint::for_client(request.context.client_name.clone());
        let cancel = request.context.cancel.clone();

        let session = self
            .authenticator
            .login(false, Some(&hint), &cancel)
            .await
            .map_err(|e| Error::AuthenticationFailed(Box::new(e)))?;

        debug!(session_id = %session.session_id, "Request authenticated");
        request.context.auth = Some(AuthContext { session });
        next.run(request).await
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use reqwest::{Client, Url};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::pkce::{random_string, Pkce};
use super::{announce, request_token, Endpoints};
use crate::auth::{AuthHint, Token, TokenSource};
use crate::error::AuthError;

const CALLBACK_PATH: &str = "/callback";

/// Length of the anti-CSRF `state` parameter
const STATE_LENGTH: usize = 32;

type Outcome = Result<String, AuthError>;

/// Shared with the `/callback` handler. The sender is taken by the first
/// callback, later ones only get a page back.
#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

/// Loopback HTTP server for the browser redirect. Serves one `/callback`
/// route and hands the first result over a oneshot.
struct RedirectListener {
    receiver: Option<oneshot::Receiver<Outcome>>,
    shutdown: CancellationToken,
    redirect_uri: String,
}

impl RedirectListener {
    async fn bind(port: u16, expected_state: &str) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let port = listener.local_addr()?.port();

        let (sender, receiver) = oneshot::channel();
        let router = Router::new()
            .route(CALLBACK_PATH, get(callback))
            .with_state(CallbackState {
                expected_state: Arc::from(expected_state),
                sender: Arc::new(Mutex::new(Some(sender))),
            });

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await });
            if let Err(e) = server.await {
                debug!(error = %e, "Redirect listener stopped");
            }
        });
        debug!(port, "Redirect listener started");

        Ok(Self {
            receiver: Some(receiver),
            shutdown,
            redirect_uri: format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH),
        })
    }

    async fn wait_for_code(&mut self) -> Result<String, AuthError> {
        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| AuthError::Exchange("redirect already received".to_string()))?;
        let outcome = receiver
            .await
            .map_err(|_| AuthError::Exchange("redirect listener stopped".to_string()));
        self.shutdown.cancel();
        outcome?
    }
}

impl Drop for RedirectListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Authorization-code exchange waiting for the browser redirect.
pub struct AuthorizationCodeSource {
    http: Client,
    endpoints: Arc<Endpoints>,
    listener: RedirectListener,
    pkce: Pkce,
}

impl AuthorizationCodeSource {
    /// Start the redirect listener and announce the authorize URL.
    pub async fn start(
        http: Client,
        endpoints: Arc<Endpoints>,
        hint: Option<&AuthHint>,
    ) -> Result<Self, AuthError> {
        let pkce = Pkce::generate();
        let state = random_string(STATE_LENGTH);
        let listener = RedirectListener::bind(endpoints.redirect_port, &state).await?;

        let url = authorize_url(&endpoints, &listener.redirect_uri, &pkce, &state)?;
        announce(
            hint,
            &format!("Open this URL in your browser to sign in:\n  {}", url),
        );

        Ok(Self {
            http,
            endpoints,
            listener,
            pkce,
        })
    }
}

#[async_trait]
impl TokenSource for AuthorizationCodeSource {
    async fn token(&mut self) -> Result<Token, AuthError> {
        let code = self.listener.wait_for_code().await?;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", self.listener.redirect_uri.as_str()),
            ("client_id", self.endpoints.client_id.as_str()),
            ("code_verifier", self.pkce.verifier.as_str()),
        ];
        match request_token(&self.http, &self.endpoints.token_url, &form).await? {
            Ok(response) => response.into_token(),
            Err(error) => Err(error.into_auth_error()),
        }
    }
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let outcome = parse_callback(&params, &state.expected_state);
    let (status, message) = match &outcome {
        Ok(_) => (StatusCode::OK, "Sign-in complete. You can close this window."),
        Err(AuthError::Denied(_)) => (StatusCode::BAD_REQUEST, "Sign-in was not completed."),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid sign-in response."),
    };

    match state.sender.lock().await.take() {
        Some(sender) => {
            // The login may have been abandoned; nobody is listening then.
            let _ = sender.send(outcome);
        }
        None => debug!("Redirect received after sign-in already finished"),
    }

    (status, Html(format!("<html><body><p>{}</p></body></html>", message)))
}

fn authorize_url(
    endpoints: &Endpoints,
    redirect_uri: &str,
    pkce: &Pkce,
    state: &str,
) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &endpoints.authorize_url,
        &[
            ("response_type", "code"),
            ("client_id", endpoints.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", endpoints.scopes.as_str()),
            ("state", state),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| AuthError::Exchange(format!("invalid authorize URL: {}", e)))
}

/// Interpret the query of a redirect to `/callback`.
fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> Outcome {
    if let Some(error) = params.get("error") {
        let reason = match params.get("error_description") {
            Some(description) => format!("{} ({})", error, description),
            None => error.clone(),
        };
        return Err(AuthError::Denied(reason));
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::Exchange("state mismatch in redirect".to_string()));
    }

    params
        .get("code")
        .cloned()
        .ok_or_else(|| AuthError::Exchange("redirect did not include a code".to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpStream;

    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints {
            client_id: "client-1".to_string(),
            authorize_url: "https://auth.example.com/as/authorize".to_string(),
            token_url: "https://auth.example.com/as/token".to_string(),
            device_authorization_url: "https://auth.example.com/as/device_authorization".to_string(),
            scopes: "openid profile".to_string(),
            redirect_port: 0,
        }
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_callback_code() {
        let params = query(&[("code", "abc"), ("state", "xyz")]);
        assert_eq!(parse_callback(&params, "xyz").unwrap(), "abc");
    }

    #[test]
    fn test_parse_callback_state_mismatch() {
        let params = query(&[("code", "abc"), ("state", "other")]);
        assert!(matches!(parse_callback(&params, "xyz"), Err(AuthError::Exchange(_))));
        let params = query(&[("code", "abc")]);
        assert!(matches!(parse_callback(&params, "xyz"), Err(AuthError::Exchange(_))));
    }

    #[test]
    fn test_parse_callback_error() {
        let params = query(&[("error", "access_denied"), ("error_description", "no thanks")]);
        assert!(matches!(
            parse_callback(&params, "xyz"),
            Err(AuthError::Denied(m)) if m == "access_denied (no thanks)"
        ));
    }

    #[test]
    fn test_parse_callback_missing_code() {
        let params = query(&[("state", "xyz")]);
        assert!(matches!(parse_callback(&params, "xyz"), Err(AuthError::Exchange(_))));
    }

    #[test]
    fn test_authorize_url_carries_pkce() {
        let pkce = Pkce::from_verifier("verifier".to_string());
        let url = authorize_url(&endpoints(), "http://127.0.0.1:7464/callback", &pkce, "st").unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:7464/callback");
        assert_eq!(params["scope"], "openid profile");
        assert_eq!(params["state"], "st");
        assert_eq!(params["code_challenge"], pkce.challenge);
        assert_eq!(params["code_challenge_method"], "S256");
    }

    // ========================================================================
    // Redirect listener
    // ========================================================================

    async fn get(url: String) -> (reqwest::StatusCode, String) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_listener_receives_code() {
        let mut listener = RedirectListener::bind(0, "st").await.unwrap();
        let url = format!("{}?code=the-code&state=st", listener.redirect_uri);

        let browser = tokio::spawn(get(url));

        assert_eq!(listener.wait_for_code().await.unwrap(), "the-code");
        let (status, body) = browser.await.unwrap();
        assert_eq!(status, reqwest::StatusCode::OK);
        assert!(body.contains("Sign-in complete"));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_callback() {
        let mut listener = RedirectListener::bind(0, "st").await.unwrap();
        let port: u16 = listener
            .redirect_uri
            .trim_start_matches("http://127.0.0.1:")
            .trim_end_matches(CALLBACK_PATH)
            .parse()
            .unwrap();

        // Connects and never sends a byte.
        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let url = format!("{}?code=late-code&state=st", listener.redirect_uri);
        let browser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            get(url).await
        });

        let code = tokio::time::timeout(Duration::from_secs(2), listener.wait_for_code())
            .await
            .expect("callback was blocked by the idle connection")
            .unwrap();
        assert_eq!(code, "late-code");
        assert_eq!(browser.await.unwrap().0, reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_other_paths_do_not_complete_sign_in() {
        let mut listener = RedirectListener::bind(0, "st").await.unwrap();
        let base = listener.redirect_uri.trim_end_matches(CALLBACK_PATH).to_string();

        let (status, _) = get(format!("{}/favicon.ico", base)).await;
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

        let url = format!("{}?code=the-code&state=st", listener.redirect_uri);
        tokio::spawn(get(url));
        assert_eq!(listener.wait_for_code().await.unwrap(), "the-code");
    }

    #[tokio::test]
    async fn test_listener_reports_denial() {
        let mut listener = RedirectListener::bind(0, "st").await.unwrap();
        let url = format!("{}?error=access_denied", listener.redirect_uri);

        let browser = tokio::spawn(get(url));

        assert!(matches!(listener.wait_for_code().await, Err(AuthError::Denied(m)) if m == "access_denied"));
        assert_eq!(browser.await.unwrap().0, reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_listener_rejects_forged_state() {
        let mut listener = RedirectListener::bind(0, "st").await.unwrap();
        let url = format!("{}?code=the-code&state=forged", listener.redirect_uri);

        tokio::spawn(get(url));

        assert!(matches!(
            listener.wait_for_code().await,
            Err(AuthError::Exchange(m)) if m.contains("state mismatch")
        ));
    }

    #[tokio::test]
    async fn test_start_announces_loopback_redirect() {
        let source = AuthorizationCodeSource::start(
            Client::new(),
            Arc::new(endpoints()),
            Some(&AuthHint::terminal()),
        )
        .await
        .unwrap();
        assert!(source.listener.redirect_uri.starts_with("http://127.0.0.1:"));
        assert!(source.listener.redirect_uri.ends_with(CALLBACK_PATH));
    }
}

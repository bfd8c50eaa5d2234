//! Scripted auth client shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::auth::{AuthClient, AuthHint, GrantType, Token, TokenSource};
use crate::error::AuthError;

#[derive(Clone, Copy)]
pub enum Behavior {
    Succeed,
    Deny,
    Hang,
}

/// Hands out tokens `A1`/`RA1`, `A2`/`RA2`, ... valid for one hour.
pub struct FakeAuthClient {
    behavior: Behavior,
    calls: AtomicUsize,
    hints: Mutex<Vec<Option<AuthHint>>>,
}

impl FakeAuthClient {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            hints: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hints(&self) -> Vec<Option<AuthHint>> {
        self.hints.lock().unwrap().clone()
    }
}

struct FakeSource {
    behavior: Behavior,
    n: usize,
}

#[async_trait]
impl TokenSource for FakeSource {
    async fn token(&mut self) -> Result<Token, AuthError> {
        match self.behavior {
            Behavior::Succeed => Ok(Token {
                access_token: format!("A{}", self.n),
                refresh_token: Some(format!("RA{}", self.n)),
                expiry: Utc::now() + Duration::hours(1),
            }),
            Behavior::Deny => Err(AuthError::Denied("access_denied".to_string())),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl AuthClient for FakeAuthClient {
    async fn token_source(
        &self,
        _grant_type: GrantType,
        hint: Option<&AuthHint>,
    ) -> Result<Box<dyn TokenSource>, AuthError> {
        self.hints.lock().unwrap().push(hint.cloned());
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakeSource {
            behavior: self.behavior,
            n,
        }))
    }
}

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::header::AUTHORIZATION;

use crate::context::Context;
use crate::filter::{FilterChain, HttpClientFilter, RequestFilter, RetryFilter};
use crate::request::Request;
use crate::util::lock_unpoisoned;

/// Sends HTTP basic credentials with every attempt.
#[derive(Clone)]
pub struct BasicAuthFilter {
    credentials: String,
}

impl BasicAuthFilter {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        Self {
            credentials: format!("Basic {encoded}"),
        }
    }
}

impl std::fmt::Debug for BasicAuthFilter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BasicAuthFilter")
            .field("credentials", &"<redacted>")
            .finish()
    }
}

impl RequestFilter for BasicAuthFilter {
    fn filter_request(&self, request: &mut Request) -> crate::Result<()> {
        request.set_header(AUTHORIZATION.as_str(), self.credentials.clone());
        Ok(())
    }
}

impl HttpClientFilter for BasicAuthFilter {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_request_filter(self);
    }
}

/// A token obtained by a [`TokenAuthenticator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    /// Past this instant the token is fetched again before the next attempt.
    pub expires_at: Option<SystemTime>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// Obtains tokens for [`TokenAuthFilter`].
pub trait TokenAuthenticator: Send + Sync {
    fn authenticate(&self) -> crate::Result<AuthToken>;

    /// Header that carries the token.
    fn header_name(&self) -> &str;

    /// Whether the completed attempt was rejected for lack of valid credentials.
    fn has_authentication_failed(&self, context: &Context) -> bool {
        context
            .response()
            .is_some_and(|response| response.status().as_u16() == 401)
    }
}

/// Attaches a cached token to each attempt and re-authenticates once when the first
/// attempt is rejected.
pub struct TokenAuthFilter<A> {
    authenticator: A,
    token: Mutex<Option<AuthToken>>,
}

impl<A: TokenAuthenticator> TokenAuthFilter<A> {
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            token: Mutex::new(None),
        }
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    pub fn token(&self) -> Option<AuthToken> {
        lock_unpoisoned(&self.token).clone()
    }

    /// Drops the cached token so the next attempt authenticates again.
    pub fn reset(&self) {
        *lock_unpoisoned(&self.token) = None;
    }
}

impl<A> std::fmt::Debug for TokenAuthFilter<A> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TokenAuthFilter")
            .finish_non_exhaustive()
    }
}

impl<A: TokenAuthenticator> RequestFilter for TokenAuthFilter<A> {
    fn filter_request(&self, request: &mut Request) -> crate::Result<()> {
        let mut token = lock_unpoisoned(&self.token);
        let value = match token.as_ref() {
            Some(current) if !current.is_expired(SystemTime::now()) => current.value.clone(),
            _ => {
                let fresh = self.authenticator.authenticate()?;
                let value = fresh.value.clone();
                *token = Some(fresh);
                value
            }
        };
        drop(token);

        request.set_header(self.authenticator.header_name(), value);
        Ok(())
    }
}

impl<A: TokenAuthenticator> RetryFilter for TokenAuthFilter<A> {
    fn is_retry_required(&self, context: &Context) -> bool {
        if context.retries() == 0 && self.authenticator.has_authentication_failed(context) {
            self.reset();
            return true;
        }
        false
    }
}

impl<A: TokenAuthenticator + 'static> HttpClientFilter for TokenAuthFilter<A> {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_request_filter(self.clone());
        chain.add_retry_filter(self);
    }
}

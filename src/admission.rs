// ABOUTME: Admission middleware resolving inbound credentials to a principal
// ABOUTME: Accepts bearer headers or session cookies, hands (principal, scope) downstream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use tracing::debug;

use crate::errors::{AuthError, AuthResult};
use crate::models::Principal;
use crate::scope::Scope;
use crate::tokens::TokenRegistry;

/// Name of the browser session cookie
pub const SESSION_COOKIE: &str = "session";

/// Maps an inbound request to a `(principal, scope)` pair
#[derive(Clone)]
pub struct Admission {
    registry: Arc<TokenRegistry>,
}

impl Admission {
    pub fn new(registry: Arc<TokenRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the caller from an `Authorization: Bearer` header or a
    /// session cookie. No credential at all resolves to `Anonymous` with
    /// an empty scope; a presented-but-invalid credential is an error.
    ///
    /// # Errors
    /// `Unauthenticated` for malformed headers and unknown or expired
    /// credentials.
    pub async fn resolve(
        &self,
        bearer_header: Option<&str>,
        session_cookie: Option<&str>,
    ) -> AuthResult<(Principal, Scope)> {
        if let Some(header) = bearer_header {
            let token = header.strip_prefix("Bearer ").ok_or_else(|| {
                AuthError::Unauthenticated("authorization header is not a bearer token".into())
            })?;
            return self.registry.validate(token.trim()).await;
        }

        if let Some(cookie) = session_cookie {
            let principal = self.registry.validate_session(cookie).await?;
            // Browser sessions authenticate the account UI, they carry no
            // API scope of their own.
            return Ok((principal, Scope::empty()));
        }

        debug!("request without credentials admitted as anonymous");
        Ok((Principal::Anonymous, Scope::empty()))
    }

    /// Convenience wrapper over raw header access for axum handlers
    ///
    /// # Errors
    /// Same as [`Admission::resolve`].
    pub async fn resolve_headers(&self, headers: &HeaderMap) -> AuthResult<(Principal, Scope)> {
        let bearer = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let cookie = headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_cookie_value);
        self.resolve(bearer, cookie.as_deref()).await
    }

    /// Resolve and insist on an authenticated (non-anonymous) caller
    ///
    /// # Errors
    /// `Unauthenticated` when no credential was presented.
    pub async fn require_authenticated(
        &self,
        headers: &HeaderMap,
    ) -> AuthResult<(Principal, Scope)> {
        let (principal, scope) = self.resolve_headers(headers).await?;
        if principal == Principal::Anonymous {
            return Err(AuthError::Unauthenticated("credentials required".into()));
        }
        Ok((principal, scope))
    }
}

/// Extract the session cookie value from a `Cookie` header
fn session_cookie_value(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_parsing_picks_the_session_pair() {
        assert_eq!(
            session_cookie_value("theme=dark; session=abc123; lang=en"),
            Some("abc123".to_owned())
        );
        assert_eq!(session_cookie_value("theme=dark"), None);
        assert_eq!(session_cookie_value(""), None);
    }
}

// ABOUTME: Handlers for the /oauth endpoints: authorize, login, approve, token, validate
// ABOUTME: Wire-level request parsing on top of the grant engine and token registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect};
use axum::{Form, Json};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::errors::{AuthError, AuthResult};
use crate::grants::{CreateGrant, IssuedTokens};
use crate::routes::AppState;
use crate::scope::Scope;

/// Form of POST /oauth/authorize
#[derive(Debug, Deserialize)]
pub struct AuthorizeForm {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    /// Echoed back verbatim on the final redirect
    #[serde(default)]
    pub state: String,
}

/// Form of POST /oauth/login
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub grant_request: String,
    pub login: String,
    pub password: String,
}

/// Form of POST /oauth/approve
#[derive(Debug, Deserialize)]
pub struct ApproveForm {
    pub grant_request: String,
    /// Whitespace-separated confirmed scope subset
    pub scope: String,
}

/// Form of POST /oauth/token, shared by all grant types
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token exchange response body
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    fn from_issued(issued: IssuedTokens, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            access_token: issued.access.token.clone(),
            token_type: "Bearer",
            expires_in: issued.access.expires_in(now),
            scope: issued.access.scope.render(),
            refresh_token: issued.refresh.map(|r| r.token),
        }
    }
}

/// Introspection response body
#[derive(Debug, Serialize)]
pub struct TokenInfo {
    /// `account` | `client`
    pub kind: &'static str,
    /// Login handle or client id
    pub subject: String,
    pub scope: String,
    pub expires_in: i64,
}

/// POST /oauth/authorize: start a grant, redirect to the login page
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AuthorizeForm>,
) -> AuthResult<impl IntoResponse> {
    let target = state
        .engine
        .create(CreateGrant {
            client_id: form.client_id,
            response_type: form.response_type,
            scope: form.scope,
            redirect_uri: form.redirect_uri,
            state: form.state,
        })
        .await?;
    Ok(Redirect::to(&target))
}

/// POST /oauth/login: bind the account holder to the grant request
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> AuthResult<impl IntoResponse> {
    let grant = state
        .engine
        .login(&form.grant_request, &form.login, &form.password)
        .await?;
    let target = format!(
        "{}/oauth/approve_page?grant_request={}",
        state.config.base_url, grant.token
    );
    Ok(Redirect::to(&target))
}

/// POST /oauth/approve: confirm a scope subset, mint code or token
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ApproveForm>,
) -> AuthResult<impl IntoResponse> {
    let confirmed = Scope::parse(&form.scope)?;
    let outcome = state.engine.approve(&form.grant_request, &confirmed).await?;
    Ok(Redirect::to(&outcome.redirect))
}

/// POST /oauth/token: exchange code / refresh token / password /
/// client credentials for tokens
pub async fn token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> AuthResult<impl IntoResponse> {
    let (client_id, client_secret) = client_credentials(&headers, &form)?;

    let issued = match form.grant_type.as_str() {
        "authorization_code" => {
            let code = form
                .code
                .as_deref()
                .ok_or_else(|| AuthError::Malformed("missing code".into()))?;
            let redirect_uri = form
                .redirect_uri
                .as_deref()
                .ok_or_else(|| AuthError::Malformed("missing redirect_uri".into()))?;
            state
                .engine
                .redeem(code, &client_id, &client_secret, redirect_uri)
                .await?
        }
        "refresh_token" => {
            let refresh = form
                .refresh_token
                .as_deref()
                .ok_or_else(|| AuthError::Malformed("missing refresh_token".into()))?;
            state
                .engine
                .refresh_grant(&client_id, &client_secret, refresh)
                .await?
        }
        "password" => {
            let username = form
                .username
                .as_deref()
                .ok_or_else(|| AuthError::Malformed("missing username".into()))?;
            let password = form
                .password
                .as_deref()
                .ok_or_else(|| AuthError::Malformed("missing password".into()))?;
            state
                .engine
                .password_grant(
                    &client_id,
                    &client_secret,
                    username,
                    password,
                    form.scope.as_deref().unwrap_or_default(),
                )
                .await?
        }
        "client_credentials" => {
            state
                .engine
                .client_credentials_grant(
                    &client_id,
                    &client_secret,
                    form.scope.as_deref().unwrap_or_default(),
                )
                .await?
        }
        other => {
            return Err(AuthError::Malformed(format!(
                "unsupported grant type '{other}'"
            )))
        }
    };

    let now = state.clock.now();
    Ok(Json(TokenResponse::from_issued(issued, now)))
}

/// GET /oauth/validate/:token: introspection
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AuthResult<impl IntoResponse> {
    let (principal, scope, expires_in) = state.tokens.introspect(&token).await?;
    Ok(Json(TokenInfo {
        kind: principal.kind(),
        subject: principal.subject(),
        scope: scope.render(),
        expires_in,
    }))
}

/// Client authentication: HTTP Basic takes precedence, form fields are
/// the fallback.
fn client_credentials(headers: &HeaderMap, form: &TokenForm) -> AuthResult<(String, String)> {
    if let Some(header) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(encoded) = header.strip_prefix("Basic ") {
            let decoded = general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|_| AuthError::Malformed("invalid basic auth encoding".into()))?;
            let decoded = String::from_utf8(decoded)
                .map_err(|_| AuthError::Malformed("invalid basic auth encoding".into()))?;
            let (id, secret) = decoded
                .split_once(':')
                .ok_or_else(|| AuthError::Malformed("invalid basic auth credentials".into()))?;
            return Ok((id.to_owned(), secret.to_owned()));
        }
    }

    match (form.client_id.clone(), form.client_secret.clone()) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AuthError::Unauthenticated(
            "client authentication required".into(),
        )),
    }
}

// ABOUTME: Handlers for the /api/accounts endpoints
// ABOUTME: Listing, reading, profile updates, and password rotation with self-or-admin checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::errors::{AuthError, AuthResult};
use crate::models::{Account, Principal};
use crate::routes::AppState;
use crate::scope::Scope;
use crate::tokens::TokenRegistry;

const MIN_PASSWORD_LEN: usize = 8;

/// Public JSON view of an account; secrets never leave the service
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountJson {
    pub url: String,
    pub uuid: String,
    pub login: String,
    pub title: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountJson {
    fn from_account(account: &Account, base_url: &str) -> Self {
        Self {
            url: format!("{}/api/accounts/{}", base_url, account.login),
            uuid: account.uuid.to_string(),
            login: account.login.clone(),
            title: account.title.clone(),
            first_name: account.first_name.clone(),
            middle_name: account.middle_name.clone(),
            last_name: account.last_name.clone(),
            email: account.email.clone(),
            is_active: account.is_active,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Profile fields an account holder may change
#[derive(Debug, Deserialize)]
pub struct AccountUpdate {
    pub title: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

/// Body of PUT /api/accounts/:login/password
#[derive(Debug, Deserialize)]
pub struct PasswordUpdate {
    pub password_old: String,
    pub password_new: String,
    pub password_new_repeat: String,
}

/// GET /api/accounts: admin-scoped account listing
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse> {
    let (principal, scope) = state.admission.require_authenticated(&headers).await?;
    let admin = Scope::parse("account-admin")?;
    TokenRegistry::require_scope(&principal, &scope, &admin)?;

    let accounts = state
        .accounts
        .list_accounts()
        .await
        .map_err(|e| AuthError::store(&e))?;
    let body: Vec<AccountJson> = accounts
        .iter()
        .map(|a| AccountJson::from_account(a, &state.config.base_url))
        .collect();
    Ok(Json(body))
}

/// GET /api/accounts/:login: own account, or any account with
/// `account-admin` scope
pub async fn read(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse> {
    let (principal, scope) = state.admission.require_authenticated(&headers).await?;
    let account = fetch_account(&state, &login).await?;
    authorize_self_or_admin(&principal, &scope, &account)?;
    Ok(Json(AccountJson::from_account(
        &account,
        &state.config.base_url,
    )))
}

/// PUT /api/accounts/:login: profile update, own account only
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
    headers: HeaderMap,
    Json(update): Json<AccountUpdate>,
) -> AuthResult<impl IntoResponse> {
    let (principal, _) = state.admission.require_authenticated(&headers).await?;
    let mut account = fetch_account(&state, &login).await?;
    authorize_self(&principal, &account)?;

    account.title = update.title;
    account.first_name = update.first_name;
    account.middle_name = update.middle_name;
    account.last_name = update.last_name;
    account.updated_at = state.clock.now();

    state
        .accounts
        .put_account(&account)
        .await
        .map_err(|e| AuthError::store(&e))?;
    info!(login = %account.login, "updated account profile");
    Ok(Json(AccountJson::from_account(
        &account,
        &state.config.base_url,
    )))
}

/// PUT /api/accounts/:login/password: rotate the password, own account only
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
    headers: HeaderMap,
    Json(update): Json<PasswordUpdate>,
) -> AuthResult<impl IntoResponse> {
    let (principal, _) = state.admission.require_authenticated(&headers).await?;
    let mut account = fetch_account(&state, &login).await?;
    authorize_self(&principal, &account)?;

    if !account.verify_password(&update.password_old) {
        return Err(AuthError::Malformed("old password does not match".into()));
    }
    if update.password_new.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Malformed(format!(
            "new password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if update.password_new != update.password_new_repeat {
        return Err(AuthError::Malformed("repeated password differs".into()));
    }

    account.password_hash = bcrypt::hash(&update.password_new, bcrypt::DEFAULT_COST)
        .map_err(|e| AuthError::StoreUnavailable(format!("password hashing failed: {e}")))?;
    account.updated_at = state.clock.now();

    state
        .accounts
        .put_account(&account)
        .await
        .map_err(|e| AuthError::store(&e))?;
    info!(login = %account.login, "rotated account password");
    Ok(Json(serde_json::json!({ "message": "password changed" })))
}

/// POST /api/accounts/:login/reset: request a password-reset e-mail.
///
/// Always answers 200: the response must not disclose whether the login
/// exists. Dispatch failures are logged and swallowed for the same reason.
pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
) -> AuthResult<impl IntoResponse> {
    if let Some(mut account) = state
        .accounts
        .account_by_login(&login)
        .await
        .map_err(|e| AuthError::store(&e))?
    {
        let code = crate::clock::random_token().map_err(|e| AuthError::store(&e))?;
        account.reset_code = Some(code.clone());
        account.reset_code_expires_at = Some(state.clock.now() + chrono::Duration::hours(24));
        state
            .accounts
            .put_account(&account)
            .await
            .map_err(|e| AuthError::store(&e))?;

        let data = crate::notify::TemplateData {
            login: account.login.clone(),
            code,
        };
        if let Err(e) = state
            .notifier
            .notify(
                crate::notify::EmailTemplate::PasswordReset,
                &[account.email.clone()],
                &data,
            )
            .await
        {
            tracing::warn!(login = %account.login, "password reset dispatch failed: {e:#}");
        } else {
            info!(login = %account.login, "password reset requested");
        }
    }
    Ok(Json(
        serde_json::json!({ "message": "reset instructions sent if the account exists" }),
    ))
}

async fn fetch_account(state: &AppState, login: &str) -> AuthResult<Account> {
    state
        .accounts
        .account_by_login(login)
        .await
        .map_err(|e| AuthError::store(&e))?
        .ok_or_else(|| AuthError::NotFound(format!("account '{login}'")))
}

fn authorize_self_or_admin(
    principal: &Principal,
    scope: &Scope,
    account: &Account,
) -> AuthResult<()> {
    if scope.contains("account-admin") {
        return Ok(());
    }
    authorize_self(principal, account)
}

fn authorize_self(principal: &Principal, account: &Account) -> AuthResult<()> {
    match principal.account_uuid() {
        Some(uuid) if uuid == account.uuid => Ok(()),
        _ => Err(AuthError::Forbidden("not own account".into())),
    }
}

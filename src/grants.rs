// ABOUTME: OAuth2 grant engine driving the authorization state machine
// ABOUTME: Authorization-code, implicit, password, client-credentials, and refresh flows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

//! The grant lifecycle is `New → Authenticated → Approved → Consumed`, with
//! expiry cutting in from every non-terminal state. Strict ordering is
//! enforced through the state enum persisted with the request: every
//! transition is a compare-and-swap against the expected predecessor, so a
//! racing second writer aborts with `Conflict` instead of regressing the
//! machine.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::clients::ClientRegistry;
use crate::clock::{random_token, Clock};
use crate::errors::{AuthError, AuthResult};
use crate::models::{
    AccessToken, Account, AuthorizationCode, GrantRequest, GrantState, RefreshToken, ResponseType,
};
use crate::scope::Scope;
use crate::store::{AccountStore, GrantStore};
use crate::tokens::TokenRegistry;

/// Parameters of a new authorization request
#[derive(Debug, Clone)]
pub struct CreateGrant {
    pub client_id: String,
    pub response_type: String,
    pub scope: String,
    pub redirect_uri: String,
    /// Echoed back verbatim in the final redirect
    pub state: String,
}

/// Outcome of an approval: where to send the browser next
#[derive(Debug, Clone)]
pub struct ApproveOutcome {
    pub redirect: String,
}

/// Access/refresh pair produced by the token-issuing flows
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: AccessToken,
    pub refresh: Option<RefreshToken>,
}

/// The OAuth2 grant state machine
pub struct GrantEngine {
    clients: Arc<ClientRegistry>,
    grants: Arc<dyn GrantStore>,
    accounts: Arc<dyn AccountStore>,
    tokens: Arc<TokenRegistry>,
    clock: Arc<dyn Clock>,
    grant_lifetime: Duration,
    base_url: String,
}

impl GrantEngine {
    pub fn new(
        clients: Arc<ClientRegistry>,
        grants: Arc<dyn GrantStore>,
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<TokenRegistry>,
        clock: Arc<dyn Clock>,
        grant_lifetime: Duration,
        base_url: String,
    ) -> Self {
        Self {
            clients,
            grants,
            accounts,
            tokens,
            clock,
            grant_lifetime,
            base_url,
        }
    }

    /// Start an authorization: validate the request and persist a grant in
    /// state `New`. Returns the login-page redirect carrying the grant
    /// token.
    ///
    /// Validations run in a fixed order and the first failure wins.
    ///
    /// # Errors
    /// `UnknownClient`, `InvalidRedirect`, `UnsupportedResponseType`,
    /// `ScopeNotAllowed`, or `Malformed`.
    pub async fn create(&self, request: CreateGrant) -> AuthResult<String> {
        let client = self
            .clients
            .get(&request.client_id)
            .ok_or_else(|| AuthError::UnknownClient(request.client_id.clone()))?;

        if self
            .clients
            .matches_redirect(&request.client_id, &request.redirect_uri)
            .is_none()
        {
            return Err(AuthError::InvalidRedirect(request.redirect_uri));
        }

        let response_type = ResponseType::from_wire(&request.response_type).ok_or_else(|| {
            AuthError::UnsupportedResponseType(request.response_type.clone())
        })?;
        if response_type == ResponseType::Token && !client.implicit_flow {
            return Err(AuthError::UnsupportedResponseType(
                "implicit flow not permitted for this client".into(),
            ));
        }

        let scope = Scope::parse(&request.scope)?;
        if scope.is_empty() {
            return Err(AuthError::Malformed("empty scope".into()));
        }
        if !self.clients.allows(&request.client_id, &scope) {
            return Err(AuthError::ScopeNotAllowed(scope.render()));
        }

        let grant = GrantRequest {
            token: random_token().map_err(|e| AuthError::store(&e))?,
            state: GrantState::New,
            client_id: request.client_id,
            scope_requested: scope,
            redirect_uri: request.redirect_uri,
            response_type,
            client_state: request.state,
            account_uuid: None,
            created_at: self.clock.now(),
        };
        self.grants
            .put_grant_request(&grant)
            .await
            .map_err(|e| AuthError::store(&e))?;

        info!(client = %grant.client_id, grant = %grant.token, "created grant request");
        Ok(format!(
            "{}/oauth/login_page?grant_request={}",
            self.base_url, grant.token
        ))
    }

    /// Fetch a live grant request; expired ones are reaped on sight.
    ///
    /// # Errors
    /// `UnknownGrant` when absent, `GrantExpired` past its lifetime.
    pub async fn lookup(&self, grant_token: &str) -> AuthResult<GrantRequest> {
        let grant = self
            .grants
            .grant_request(grant_token)
            .await
            .map_err(|e| AuthError::store(&e))?
            .ok_or(AuthError::UnknownGrant)?;

        if grant.is_expired(self.clock.now(), self.grant_lifetime) {
            self.grants
                .delete_grant_request(grant_token)
                .await
                .map_err(|e| AuthError::store(&e))?;
            return Err(AuthError::GrantExpired);
        }
        Ok(grant)
    }

    /// `New → Authenticated`: verify the account holder's credentials and
    /// bind the account to the request.
    ///
    /// # Errors
    /// `BadCredentials`, `GrantExpired`, `UnknownGrant`, or `Conflict`
    /// when a racer already moved the machine.
    pub async fn login(
        &self,
        grant_token: &str,
        login: &str,
        password: &str,
    ) -> AuthResult<GrantRequest> {
        let mut grant = self.lookup(grant_token).await?;
        if grant.state != GrantState::New {
            return Err(AuthError::Conflict(format!(
                "grant request is not awaiting login (state {:?})",
                grant.state
            )));
        }

        let account = self.verify_account(login, password).await?;

        grant.state = GrantState::Authenticated;
        grant.account_uuid = Some(account.uuid);
        let updated = self
            .grants
            .update_grant_request_if_state(&grant, GrantState::New)
            .await
            .map_err(|e| AuthError::store(&e))?;
        if !updated {
            return Err(AuthError::Conflict("grant request state changed".into()));
        }

        info!(grant = %grant.token, account = %account.login, "grant request authenticated");
        Ok(grant)
    }

    async fn verify_account(&self, login: &str, password: &str) -> AuthResult<Account> {
        let account = self
            .accounts
            .account_by_login(login)
            .await
            .map_err(|e| AuthError::store(&e))?;
        // Verify against a missing account too, keeping timing comparable
        match account {
            Some(account) if account.is_active && account.verify_password(password) => Ok(account),
            _ => {
                warn!(login, "rejected credentials");
                Err(AuthError::BadCredentials)
            }
        }
    }

    /// `Authenticated → Approved`: narrow the scope to the user-confirmed
    /// subset and mint the response-type-specific artifact. The returned
    /// redirect carries the client's `state` string verbatim.
    ///
    /// # Errors
    /// `ScopeNotAllowed` when the confirmation widens the scope,
    /// `Conflict` on a stale state, plus the usual lookup failures.
    pub async fn approve(&self, grant_token: &str, confirmed: &Scope) -> AuthResult<ApproveOutcome> {
        let mut grant = self.lookup(grant_token).await?;
        if grant.state != GrantState::Authenticated {
            return Err(AuthError::Conflict(format!(
                "grant request is not awaiting approval (state {:?})",
                grant.state
            )));
        }
        let account_uuid = grant
            .account_uuid
            .ok_or_else(|| AuthError::Conflict("authenticated grant lost its account".into()))?;

        if !grant.scope_requested.is_superset(confirmed) {
            return Err(AuthError::ScopeNotAllowed(confirmed.render()));
        }
        grant.scope_requested = confirmed.clone();

        match grant.response_type {
            ResponseType::Code => {
                grant.state = GrantState::Approved;
                let updated = self
                    .grants
                    .update_grant_request_if_state(&grant, GrantState::Authenticated)
                    .await
                    .map_err(|e| AuthError::store(&e))?;
                if !updated {
                    return Err(AuthError::Conflict("grant request state changed".into()));
                }

                let code = AuthorizationCode {
                    code: random_token().map_err(|e| AuthError::store(&e))?,
                    grant_token: grant.token.clone(),
                    client_id: grant.client_id.clone(),
                    account_uuid,
                    scope: confirmed.clone(),
                    redirect_uri: grant.redirect_uri.clone(),
                    created_at: self.clock.now(),
                };
                self.grants
                    .put_auth_code(&code)
                    .await
                    .map_err(|e| AuthError::store(&e))?;

                info!(grant = %grant.token, "approved grant request, minted authorization code");
                Ok(ApproveOutcome {
                    redirect: format!(
                        "{}?code={}&state={}",
                        grant.redirect_uri, code.code, grant.client_state
                    ),
                })
            }
            ResponseType::Token => {
                // Implicit flow has no redemption step; the machine jumps
                // straight to its terminal state.
                grant.state = GrantState::Consumed;
                let updated = self
                    .grants
                    .update_grant_request_if_state(&grant, GrantState::Authenticated)
                    .await
                    .map_err(|e| AuthError::store(&e))?;
                if !updated {
                    return Err(AuthError::Conflict("grant request state changed".into()));
                }

                let (access, _) = self
                    .tokens
                    .issue(&grant.client_id, Some(account_uuid), confirmed)
                    .await?;
                info!(grant = %grant.token, "approved grant request, issued implicit token");
                Ok(ApproveOutcome {
                    redirect: format!(
                        "{}#access_token={}&token_type=Bearer&state={}",
                        grant.redirect_uri, access.token, grant.client_state
                    ),
                })
            }
        }
    }

    /// `Approved → Consumed`: exchange an authorization code for a token
    /// pair. The code is consumed whether or not the exchange succeeds.
    ///
    /// # Errors
    /// `UnknownCode`, `ClientMismatch`, `BadSecret`, `RedirectMismatch`,
    /// or `CodeExpired`.
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> AuthResult<IssuedTokens> {
        // Compare-and-delete first: losing the race means another redeemer
        // consumed the code, and a failed exchange must burn it too.
        let code = self
            .grants
            .consume_auth_code(code)
            .await
            .map_err(|e| AuthError::store(&e))?
            .ok_or(AuthError::UnknownCode)?;

        if code.client_id != client_id {
            return Err(AuthError::ClientMismatch);
        }
        if !self.clients.verify_secret(client_id, client_secret) {
            return Err(AuthError::BadSecret);
        }
        if code.redirect_uri != redirect_uri {
            return Err(AuthError::RedirectMismatch);
        }
        if code.is_expired(self.clock.now()) {
            return Err(AuthError::CodeExpired);
        }

        if let Some(mut grant) = self
            .grants
            .grant_request(&code.grant_token)
            .await
            .map_err(|e| AuthError::store(&e))?
        {
            grant.state = GrantState::Consumed;
            // A lost race here only means the cleaner or a peer finished
            // the bookkeeping; the code consume above is authoritative.
            let _ = self
                .grants
                .update_grant_request_if_state(&grant, GrantState::Approved)
                .await
                .map_err(|e| AuthError::store(&e))?;
        }

        let (access, refresh) = self
            .tokens
            .issue(client_id, Some(code.account_uuid), &code.scope)
            .await?;
        info!(client = client_id, "redeemed authorization code");
        Ok(IssuedTokens { access, refresh })
    }

    /// Direct resource-owner password exchange, for trusted clients only
    ///
    /// # Errors
    /// `UnknownClient`, `BadSecret`, `UnsupportedResponseType` for
    /// untrusted clients, `ScopeNotAllowed`, `BadCredentials`.
    pub async fn password_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        login: &str,
        password: &str,
        scope: &str,
    ) -> AuthResult<IssuedTokens> {
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| AuthError::UnknownClient(client_id.to_owned()))?;
        if !self.clients.verify_secret(client_id, client_secret) {
            return Err(AuthError::BadSecret);
        }
        if !client.trusted {
            return Err(AuthError::UnsupportedResponseType(
                "password grant not permitted for this client".into(),
            ));
        }

        let scope = Scope::parse(scope)?;
        if !self.clients.allows(client_id, &scope) {
            return Err(AuthError::ScopeNotAllowed(scope.render()));
        }

        let account = self.verify_account(login, password).await?;
        let (access, refresh) = self
            .tokens
            .issue(client_id, Some(account.uuid), &scope)
            .await?;
        info!(client = client_id, account = login, "issued tokens via password grant");
        Ok(IssuedTokens { access, refresh })
    }

    /// Client-credentials exchange: the client itself is the subject
    ///
    /// # Errors
    /// `UnknownClient`, `BadSecret`, `ScopeNotAllowed`.
    pub async fn client_credentials_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> AuthResult<IssuedTokens> {
        if self.clients.get(client_id).is_none() {
            return Err(AuthError::UnknownClient(client_id.to_owned()));
        }
        if !self.clients.verify_secret(client_id, client_secret) {
            return Err(AuthError::BadSecret);
        }
        let scope = Scope::parse(scope)?;
        if !self.clients.allows(client_id, &scope) {
            return Err(AuthError::ScopeNotAllowed(scope.render()));
        }

        let (access, refresh) = self.tokens.issue(client_id, None, &scope).await?;
        info!(client = client_id, "issued client-credentials token");
        Ok(IssuedTokens { access, refresh })
    }

    /// Rotate a refresh token: the old token is atomically deleted and a
    /// fresh access/refresh pair issued.
    ///
    /// # Errors
    /// `UnknownRefresh` when the token is gone or belongs to a different
    /// client; in that case no tokens are issued.
    pub async fn refresh_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> AuthResult<IssuedTokens> {
        if self.clients.get(client_id).is_none() {
            return Err(AuthError::UnknownClient(client_id.to_owned()));
        }
        if !self.clients.verify_secret(client_id, client_secret) {
            return Err(AuthError::BadSecret);
        }

        // Ownership check happens before the consume so a foreign client
        // cannot burn someone else's token.
        let stored = self
            .tokens_store_refresh(refresh_token)
            .await?
            .ok_or(AuthError::UnknownRefresh)?;
        if stored.client_id != client_id {
            return Err(AuthError::UnknownRefresh);
        }

        let old = self
            .tokens_store_consume_refresh(refresh_token)
            .await?
            .ok_or(AuthError::UnknownRefresh)?;

        let (access, refresh) = self
            .tokens
            .issue(client_id, Some(old.account_uuid), &old.scope)
            .await?;
        info!(client = client_id, "rotated refresh token");
        Ok(IssuedTokens { access, refresh })
    }

    async fn tokens_store_refresh(&self, token: &str) -> AuthResult<Option<RefreshToken>> {
        self.tokens
            .refresh_lookup(token)
            .await
            .map_err(|e| AuthError::store(&e))
    }

    async fn tokens_store_consume_refresh(
        &self,
        token: &str,
    ) -> AuthResult<Option<RefreshToken>> {
        self.tokens
            .refresh_consume(token)
            .await
            .map_err(|e| AuthError::store(&e))
    }
}

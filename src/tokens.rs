// ABOUTME: Token and session registry with lifetime and scope enforcement
// ABOUTME: Issues token pairs atomically, validates bearers, and manages browser sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::{random_token, Clock};
use crate::errors::{AuthError, AuthResult};
use crate::models::{AccessToken, Principal, RefreshToken, Session};
use crate::scope::Scope;
use crate::store::{AccountStore, SessionStore, TokenStore};

/// Registry over access tokens, refresh tokens, and browser sessions
pub struct TokenRegistry {
    tokens: Arc<dyn TokenStore>,
    sessions: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    token_lifetime: Duration,
    session_lifetime: Duration,
}

impl TokenRegistry {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        token_lifetime: Duration,
        session_lifetime: Duration,
    ) -> Self {
        Self {
            tokens,
            sessions,
            accounts,
            clock,
            token_lifetime,
            session_lifetime,
        }
    }

    /// Resolve a bearer token to its principal and granted scope.
    ///
    /// An expired token is deleted on sight and reported exactly like an
    /// absent one.
    ///
    /// # Errors
    /// `Unauthenticated` for unknown or expired tokens, `StoreUnavailable`
    /// on persistence failure.
    pub async fn validate(&self, bearer: &str) -> AuthResult<(Principal, Scope)> {
        let token = self
            .tokens
            .access_token(bearer)
            .await
            .map_err(|e| AuthError::store(&e))?
            .ok_or_else(|| AuthError::Unauthenticated("unknown access token".into()))?;

        if token.is_expired(self.clock.now()) {
            debug!(client = %token.client_id, "deleting expired access token on validate");
            self.tokens
                .delete_access_token(bearer)
                .await
                .map_err(|e| AuthError::store(&e))?;
            return Err(AuthError::Unauthenticated("access token expired".into()));
        }

        let principal = self.principal_for(&token).await?;
        Ok((principal, token.scope))
    }

    /// Introspection: principal, scope, and seconds until expiry.
    /// Expired tokens are deleted on sight, like in [`TokenRegistry::validate`].
    ///
    /// # Errors
    /// `Unauthenticated` for unknown or expired tokens.
    pub async fn introspect(&self, bearer: &str) -> AuthResult<(Principal, Scope, i64)> {
        let token = self
            .tokens
            .access_token(bearer)
            .await
            .map_err(|e| AuthError::store(&e))?
            .ok_or_else(|| AuthError::Unauthenticated("unknown access token".into()))?;

        let now = self.clock.now();
        if token.is_expired(now) {
            self.tokens
                .delete_access_token(bearer)
                .await
                .map_err(|e| AuthError::store(&e))?;
            return Err(AuthError::Unauthenticated("access token expired".into()));
        }

        let principal = self.principal_for(&token).await?;
        let expires_in = token.expires_in(now);
        Ok((principal, token.scope, expires_in))
    }

    async fn principal_for(&self, token: &AccessToken) -> AuthResult<Principal> {
        match token.account_uuid {
            Some(uuid) => {
                let account = self
                    .accounts
                    .account_by_uuid(uuid)
                    .await
                    .map_err(|e| AuthError::store(&e))?
                    .ok_or_else(|| {
                        AuthError::Unauthenticated("token subject no longer exists".into())
                    })?;
                Ok(Principal::Account {
                    uuid,
                    login: account.login,
                })
            }
            None => Ok(Principal::Client {
                client_id: token.client_id.clone(),
            }),
        }
    }

    /// Succeeds iff `required ⊆ held`
    ///
    /// # Errors
    /// `Forbidden` when the credential lacks a required identifier.
    pub fn require_scope(
        principal: &Principal,
        held: &Scope,
        required: &Scope,
    ) -> AuthResult<()> {
        if held.is_superset(required) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(format!(
                "{} lacks scope '{}'",
                principal.subject(),
                required.render()
            )))
        }
    }

    /// Issue an access token, plus a refresh token when an account is the
    /// subject. Both artifacts are persisted in a single store write.
    ///
    /// # Errors
    /// `StoreUnavailable` when persistence or the RNG fails; nothing is
    /// stored in that case.
    pub async fn issue(
        &self,
        client_id: &str,
        account: Option<Uuid>,
        scope: &Scope,
    ) -> AuthResult<(AccessToken, Option<RefreshToken>)> {
        self.issue_with_lifetime(client_id, account, scope, self.token_lifetime)
            .await
    }

    /// Issue with an explicit lifetime, clamped to the configured maximum
    ///
    /// # Errors
    /// Same as [`TokenRegistry::issue`].
    pub async fn issue_with_lifetime(
        &self,
        client_id: &str,
        account: Option<Uuid>,
        scope: &Scope,
        lifetime: Duration,
    ) -> AuthResult<(AccessToken, Option<RefreshToken>)> {
        let now = self.clock.now();
        let lifetime = lifetime.min(self.token_lifetime);

        let access = AccessToken {
            token: random_token().map_err(|e| AuthError::store(&e))?,
            account_uuid: account,
            client_id: client_id.to_owned(),
            scope: scope.clone(),
            created_at: now,
            lifetime_secs: lifetime.num_seconds(),
        };
        let refresh = match account {
            Some(uuid) => Some(RefreshToken {
                token: random_token().map_err(|e| AuthError::store(&e))?,
                client_id: client_id.to_owned(),
                account_uuid: uuid,
                scope: scope.clone(),
                created_at: now,
            }),
            None => None,
        };

        self.tokens
            .put_token_pair(&access, refresh.as_ref())
            .await
            .map_err(|e| AuthError::store(&e))?;
        info!(
            client = client_id,
            subject = %account.map_or_else(|| client_id.to_owned(), |u| u.to_string()),
            scope = %scope,
            "issued access token"
        );
        Ok((access, refresh))
    }

    /// Idempotent access-token revocation
    ///
    /// # Errors
    /// `StoreUnavailable` on persistence failure.
    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        self.tokens
            .delete_access_token(token)
            .await
            .map_err(|e| AuthError::store(&e))
    }

    /// Raw refresh-token lookup, used by the grant engine before rotation
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn refresh_lookup(&self, token: &str) -> Result<Option<RefreshToken>> {
        self.tokens.refresh_token(token).await
    }

    /// Compare-and-delete a refresh token; `None` when a racer was faster
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn refresh_consume(&self, token: &str) -> Result<Option<RefreshToken>> {
        self.tokens.consume_refresh_token(token).await
    }

    /// Create a browser session, replacing any live session of the account
    ///
    /// # Errors
    /// `StoreUnavailable` on persistence or RNG failure.
    pub async fn new_session(&self, account: Uuid) -> AuthResult<Session> {
        let session = Session {
            token: random_token().map_err(|e| AuthError::store(&e))?,
            account_uuid: account,
            created_at: self.clock.now(),
            lifetime_secs: self.session_lifetime.num_seconds(),
        };
        self.sessions
            .put_session_replacing(&session)
            .await
            .map_err(|e| AuthError::store(&e))?;
        debug!(account = %account, "created browser session");
        Ok(session)
    }

    /// Resolve a session cookie to its account principal, deleting expired
    /// sessions on sight.
    ///
    /// # Errors
    /// `Unauthenticated` for unknown or expired sessions.
    pub async fn validate_session(&self, cookie: &str) -> AuthResult<Principal> {
        let session = self
            .sessions
            .session(cookie)
            .await
            .map_err(|e| AuthError::store(&e))?
            .ok_or_else(|| AuthError::Unauthenticated("unknown session".into()))?;

        if session.is_expired(self.clock.now()) {
            self.sessions
                .delete_session(cookie)
                .await
                .map_err(|e| AuthError::store(&e))?;
            return Err(AuthError::Unauthenticated("session expired".into()));
        }

        let account = self
            .accounts
            .account_by_uuid(session.account_uuid)
            .await
            .map_err(|e| AuthError::store(&e))?
            .ok_or_else(|| AuthError::Unauthenticated("session account is gone".into()))?;
        Ok(Principal::Account {
            uuid: account.uuid,
            login: account.login,
        })
    }
}

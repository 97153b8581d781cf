// ABOUTME: In-process reference store backed by tokio RwLock maps
// ABOUTME: Used by the dev-mode binary and the test-suite
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

//! All four store traits over plain hash maps. A single lock per entity
//! class serialises writes, which gives the per-row CAS semantics the core
//! relies on for one-shot consumption.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    AccessToken, Account, AuthorizationCode, GrantRequest, GrantState, RefreshToken, Session,
};
use crate::store::{AccountStore, GrantStore, SessionStore, TokenStore};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    grant_requests: HashMap<String, GrantRequest>,
    auth_codes: HashMap<String, AuthorizationCode>,
    access_tokens: HashMap<String, AccessToken>,
    refresh_tokens: HashMap<String, RefreshToken>,
    sessions: HashMap<String, Session>,
}

/// Shared in-memory backend implementing every store trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live access tokens, used by sweep tests
    pub async fn access_token_count(&self) -> usize {
        self.tables.read().await.access_tokens.len()
    }

    /// Number of live sessions for one account
    pub async fn session_count(&self, account: Uuid) -> usize {
        self.tables
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.account_uuid == account)
            .count()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn account_by_uuid(&self, uuid: Uuid) -> Result<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&uuid).cloned())
    }

    async fn account_by_login(&self, login: &str) -> Result<Option<Account>> {
        let wanted = login.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.login.to_lowercase() == wanted)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> =
            self.tables.read().await.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(accounts)
    }

    async fn put_account(&self, account: &Account) -> Result<()> {
        self.tables
            .write()
            .await
            .accounts
            .insert(account.uuid, account.clone());
        Ok(())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn grant_request(&self, token: &str) -> Result<Option<GrantRequest>> {
        Ok(self.tables.read().await.grant_requests.get(token).cloned())
    }

    async fn put_grant_request(&self, request: &GrantRequest) -> Result<()> {
        self.tables
            .write()
            .await
            .grant_requests
            .insert(request.token.clone(), request.clone());
        Ok(())
    }

    async fn update_grant_request_if_state(
        &self,
        request: &GrantRequest,
        expected: GrantState,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.grant_requests.get(&request.token) {
            Some(stored) if stored.state == expected => {
                tables
                    .grant_requests
                    .insert(request.token.clone(), request.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_grant_request(&self, token: &str) -> Result<()> {
        self.tables.write().await.grant_requests.remove(token);
        Ok(())
    }

    async fn delete_expired_grant_requests(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.grant_requests.len();
        tables.grant_requests.retain(|_, g| g.created_at > cutoff);
        Ok((before - tables.grant_requests.len()) as u64)
    }

    async fn put_auth_code(&self, code: &AuthorizationCode) -> Result<()> {
        self.tables
            .write()
            .await
            .auth_codes
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume_auth_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        Ok(self.tables.write().await.auth_codes.remove(code))
    }

    async fn delete_expired_auth_codes(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.auth_codes.len();
        tables.auth_codes.retain(|_, c| c.created_at > cutoff);
        Ok((before - tables.auth_codes.len()) as u64)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        Ok(self.tables.read().await.access_tokens.get(token).cloned())
    }

    async fn put_token_pair(
        &self,
        access: &AccessToken,
        refresh: Option<&RefreshToken>,
    ) -> Result<()> {
        // One write lock covers both inserts, so the pair is atomic
        let mut tables = self.tables.write().await;
        tables
            .access_tokens
            .insert(access.token.clone(), access.clone());
        if let Some(refresh) = refresh {
            tables
                .refresh_tokens
                .insert(refresh.token.clone(), refresh.clone());
        }
        Ok(())
    }

    async fn delete_access_token(&self, token: &str) -> Result<()> {
        self.tables.write().await.access_tokens.remove(token);
        Ok(())
    }

    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        Ok(self.tables.read().await.refresh_tokens.get(token).cloned())
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        Ok(self.tables.write().await.refresh_tokens.remove(token))
    }

    async fn delete_expired_access_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.access_tokens.len();
        tables.access_tokens.retain(|_, t| !t.is_expired(now));
        Ok((before - tables.access_tokens.len()) as u64)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(token).cloned())
    }

    async fn put_session_replacing(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .retain(|_, s| s.account_uuid != session.account_uuid);
        tables
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        self.tables.write().await.sessions.remove(token);
        Ok(())
    }

    async fn delete_sessions_for_account(&self, account: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.account_uuid != account);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

// ABOUTME: Persistence abstraction consumed by the authorization core
// ABOUTME: Trait contracts per entity class plus the in-process reference backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

//! The core never talks to a database directly. Each entity class gets a
//! narrow trait; implementations are expected to serialise writes per row
//! and to provide compare-and-delete semantics where one-shot consumption
//! matters (authorization codes, refresh tokens).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AccessToken, Account, AuthorizationCode, GrantRequest, GrantState, RefreshToken, Session,
};

pub mod memory;

pub use memory::MemoryStore;

/// Account lookup and mutation
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get an account by its stable identifier
    async fn account_by_uuid(&self, uuid: Uuid) -> Result<Option<Account>>;

    /// Get an account by login handle, compared case-insensitively
    async fn account_by_login(&self, login: &str) -> Result<Option<Account>>;

    /// All accounts, ordered by login
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Insert or update an account keyed by uuid
    async fn put_account(&self, account: &Account) -> Result<()>;
}

/// Grant requests and authorization codes
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn grant_request(&self, token: &str) -> Result<Option<GrantRequest>>;

    /// Persist a freshly created request
    async fn put_grant_request(&self, request: &GrantRequest) -> Result<()>;

    /// Write `request` only if the stored copy is still in `expected`
    /// state. Returns false when a racer moved the machine first.
    async fn update_grant_request_if_state(
        &self,
        request: &GrantRequest,
        expected: GrantState,
    ) -> Result<bool>;

    async fn delete_grant_request(&self, token: &str) -> Result<()>;

    /// Delete requests created at or before `cutoff`; returns the count
    async fn delete_expired_grant_requests(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn put_auth_code(&self, code: &AuthorizationCode) -> Result<()>;

    /// Compare-and-delete: remove the code and return it. `None` means a
    /// racer consumed it first (or it never existed).
    async fn consume_auth_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Delete codes created at or before `cutoff`; returns the count
    async fn delete_expired_auth_codes(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Access and refresh tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn access_token(&self, token: &str) -> Result<Option<AccessToken>>;

    /// Persist an access token and its optional refresh companion in one
    /// write: either both land or neither does.
    async fn put_token_pair(
        &self,
        access: &AccessToken,
        refresh: Option<&RefreshToken>,
    ) -> Result<()>;

    /// Idempotent deletion by token string
    async fn delete_access_token(&self, token: &str) -> Result<()>;

    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Compare-and-delete for refresh rotation; `None` when already gone
    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Delete access tokens whose per-row lifetime has elapsed at `now`
    async fn delete_expired_access_tokens(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Browser sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session(&self, token: &str) -> Result<Option<Session>>;

    /// Store a session, removing any prior session of the same account in
    /// the same write; keeps the ≤1-session-per-account invariant.
    async fn put_session_replacing(&self, session: &Session) -> Result<()>;

    /// Idempotent deletion by token string
    async fn delete_session(&self, token: &str) -> Result<()>;

    async fn delete_sessions_for_account(&self, account: Uuid) -> Result<u64>;

    /// Delete sessions whose per-row lifetime has elapsed at `now`
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

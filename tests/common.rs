// ABOUTME: Shared test harness wiring stores, registries, and the router
// ABOUTME: Seeds the standard clients and accounts used across the suite
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use gin_auth::admission::Admission;
use gin_auth::clients::{Client, ClientRegistry};
use gin_auth::clock::ManualClock;
use gin_auth::config::{ServerConfig, SmtpMode};
use gin_auth::grants::GrantEngine;
use gin_auth::models::Account;
use gin_auth::notify::{EmailDispatcher, Notifier};
use gin_auth::routes::AppState;
use gin_auth::scope::Scope;
use gin_auth::store::{AccountStore as _, MemoryStore};
use gin_auth::tokens::TokenRegistry;

/// Low bcrypt cost keeps the suite fast
pub const TEST_BCRYPT_COST: u32 = 4;

pub const ALICE_PASSWORD: &str = "testtest";
pub const UI_CLIENT: &str = "gin-ui";
pub const UI_SECRET: &str = "secret-ui";
pub const UI_REDIRECT: &str = "https://ui.example/cb";
pub const CLI_CLIENT: &str = "gin-cli";
pub const CLI_SECRET: &str = "secret-cli";

struct NullDispatcher;

#[async_trait::async_trait]
impl EmailDispatcher for NullDispatcher {
    async fn send(&self, _recipients: &[String], _message: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a test needs: the store, a manual clock, and the wired core
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub config: Arc<ServerConfig>,
    pub tokens: Arc<TokenRegistry>,
    pub engine: Arc<GrantEngine>,
    pub state: Arc<AppState>,
    pub alice: Account,
    pub bob: Account,
}

pub fn test_clients() -> Vec<Client> {
    vec![
        Client {
            id: UI_CLIENT.to_owned(),
            secret: UI_SECRET.to_owned(),
            name: "GIN web interface".to_owned(),
            redirect_uri_prefixes: vec!["https://ui.example/".to_owned()],
            allowed_scopes: Scope::parse("account-read account-write account-admin repo-read")
                .unwrap(),
            implicit_flow: true,
            trusted: false,
        },
        Client {
            id: CLI_CLIENT.to_owned(),
            secret: CLI_SECRET.to_owned(),
            name: "GIN command line client".to_owned(),
            redirect_uri_prefixes: vec!["https://cli.example/".to_owned()],
            allowed_scopes: Scope::parse("account-read repo-read repo-write").unwrap(),
            implicit_flow: false,
            trusted: true,
        },
    ]
}

pub fn make_account(login: &str, password: &str) -> Account {
    let now = Utc::now();
    Account {
        uuid: Uuid::new_v4(),
        login: login.to_owned(),
        password_hash: bcrypt::hash(password, TEST_BCRYPT_COST).unwrap(),
        title: None,
        first_name: login.to_owned(),
        middle_name: None,
        last_name: "Tester".to_owned(),
        email: format!("{login}@example.org"),
        is_active: true,
        reset_code: None,
        reset_code_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub async fn harness() -> TestHarness {
    let config = Arc::new(ServerConfig::default());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let registry = Arc::new(ClientRegistry::from_clients(test_clients()));

    let alice = make_account("alice", ALICE_PASSWORD);
    let bob = make_account("bob", "bobbobbob");
    store.put_account(&alice).await.unwrap();
    store.put_account(&bob).await.unwrap();

    let tokens = Arc::new(TokenRegistry::new(
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
        config.token_lifetime(),
        config.session_lifetime(),
    ));
    let engine = Arc::new(GrantEngine::new(
        registry,
        store.clone(),
        store.clone(),
        tokens.clone(),
        clock.clone(),
        config.grant_req_lifetime(),
        config.base_url.clone(),
    ));
    let notifier = Arc::new(Notifier::new(
        SmtpMode::Skip,
        config.smtp.from.clone(),
        config.base_url.clone(),
        Arc::new(NullDispatcher),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        engine: engine.clone(),
        tokens: tokens.clone(),
        admission: Admission::new(tokens.clone()),
        accounts: store.clone(),
        notifier,
        clock: clock.clone(),
    });

    TestHarness {
        store,
        clock,
        config,
        tokens,
        engine,
        state,
        alice,
        bob,
    }
}

impl TestHarness {
    /// Drive the full code flow for `alice` and return the authorization
    /// code embedded in the approval redirect.
    pub async fn authorization_code(&self, requested: &str, confirmed: &str) -> String {
        let login_url = self
            .engine
            .create(gin_auth::grants::CreateGrant {
                client_id: UI_CLIENT.to_owned(),
                response_type: "code".to_owned(),
                scope: requested.to_owned(),
                redirect_uri: UI_REDIRECT.to_owned(),
                state: "xyz".to_owned(),
            })
            .await
            .unwrap();
        let grant_token = query_param(&login_url, "grant_request").unwrap();

        self.engine
            .login(&grant_token, "alice", ALICE_PASSWORD)
            .await
            .unwrap();
        let outcome = self
            .engine
            .approve(&grant_token, &Scope::parse(confirmed).unwrap())
            .await
            .unwrap();
        query_param(&outcome.redirect, "code").unwrap()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// Pull a query (or fragment) parameter out of a redirect URL
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, tail) = url.split_once(|c| c == '?' || c == '#')?;
    tail.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}

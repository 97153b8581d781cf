// ABOUTME: HTTP route assembly for the gin-auth service
// ABOUTME: Shared application state plus the /oauth and /api routers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::admission::Admission;
use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::grants::GrantEngine;
use crate::notify::Notifier;
use crate::store::AccountStore;
use crate::tokens::TokenRegistry;

pub mod account;
pub mod oauth;

/// Shared state handed to every handler
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub engine: Arc<GrantEngine>,
    pub tokens: Arc<TokenRegistry>,
    pub admission: Admission,
    pub accounts: Arc<dyn AccountStore>,
    pub notifier: Arc<Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Build the complete router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/oauth/authorize", post(oauth::authorize))
        .route("/oauth/login", post(oauth::login))
        .route("/oauth/approve", post(oauth::approve))
        .route("/oauth/token", post(oauth::token))
        .route("/oauth/validate/:token", get(oauth::validate))
        .route("/api/accounts", get(account::list))
        .route(
            "/api/accounts/:login",
            get(account::read).put(account::update),
        )
        .route(
            "/api/accounts/:login/password",
            put(account::update_password),
        )
        .route("/api/accounts/:login/reset", post(account::request_reset))
        .with_state(state)
}

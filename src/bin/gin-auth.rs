// ABOUTME: gin-auth server binary: wiring, startup, and graceful shutdown
// ABOUTME: Builds the registries and engine, spawns the cleaner, serves the HTTP surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gin_auth::admission::Admission;
use gin_auth::cleaner::Cleaner;
use gin_auth::clients::ClientRegistry;
use gin_auth::clock::SystemClock;
use gin_auth::config::{ServerConfig, SmtpMode};
use gin_auth::grants::GrantEngine;
use gin_auth::notify::{EmailDispatcher, Notifier};
use gin_auth::routes::{self, AppState};
use gin_auth::store::MemoryStore;
use gin_auth::tokens::TokenRegistry;

/// Placeholder transport for deployments without an SMTP relay wired in
struct UnconfiguredDispatcher;

#[async_trait::async_trait]
impl EmailDispatcher for UnconfiguredDispatcher {
    async fn send(&self, _recipients: &[String], _message: &[u8]) -> Result<()> {
        anyhow::bail!("no SMTP transport configured")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(ServerConfig::from_env().context("loading configuration")?);
    info!(base_url = %config.base_url, "starting gin-auth");

    let registry = Arc::new(
        ClientRegistry::load(Path::new(&config.clients_file)).context("loading client registry")?,
    );

    // The in-process backend; a relational deployment plugs its own store
    // implementations in here.
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SystemClock);

    let tokens = Arc::new(TokenRegistry::new(
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
        config.token_lifetime(),
        config.session_lifetime(),
    ));
    let engine = Arc::new(GrantEngine::new(
        registry.clone(),
        store.clone(),
        store.clone(),
        tokens.clone(),
        clock.clone(),
        config.grant_req_lifetime(),
        config.base_url.clone(),
    ));

    let smtp_mode = if config.smtp.mode == SmtpMode::Live {
        warn!("live SMTP requested but no transport is wired in, falling back to print");
        SmtpMode::Print
    } else {
        config.smtp.mode
    };
    let notifier = Arc::new(Notifier::new(
        smtp_mode,
        config.smtp.from.clone(),
        config.base_url.clone(),
        Arc::new(UnconfiguredDispatcher),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
        tokens: tokens.clone(),
        admission: Admission::new(tokens),
        accounts: store.clone(),
        notifier,
        clock: clock.clone(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleaner = Cleaner::new(
        store.clone(),
        store.clone(),
        store.clone(),
        clock,
        config.grant_req_lifetime(),
        config.cleaner_interval(),
    );
    let cleaner_handle = tokio::spawn(cleaner.run(shutdown_rx));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serving HTTP")?;

    // Stop the cleaner after the listener drains
    let _ = shutdown_tx.send(true);
    let _ = cleaner_handle.await;
    info!("gin-auth stopped");
    Ok(())
}

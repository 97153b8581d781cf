// ABOUTME: Periodic background sweeper deleting expired authorization artifacts
// ABOUTME: One sweep per class per wake; observes a shutdown signal between classes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::models::auth_code_lifetime;
use crate::store::{GrantStore, SessionStore, TokenStore};

/// Background garbage collector for grants, codes, tokens, and sessions.
///
/// Refresh tokens carry no expiry and are never touched here.
pub struct Cleaner {
    grants: Arc<dyn GrantStore>,
    tokens: Arc<dyn TokenStore>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    grant_lifetime: Duration,
    interval: Duration,
}

impl Cleaner {
    pub fn new(
        grants: Arc<dyn GrantStore>,
        tokens: Arc<dyn TokenStore>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        grant_lifetime: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            grants,
            tokens,
            sessions,
            clock,
            grant_lifetime,
            interval,
        }
    }

    /// Run until the shutdown channel flips to `true`. Started once at
    /// process init on its own task.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self
            .interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(900));
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; skip it so a fresh boot does
        // not race the stores coming up.
        ticker.tick().await;

        info!(interval_min = self.interval.num_minutes(), "cleaner started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(&mut shutdown).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cleaner stopped");
                        return;
                    }
                }
            }
        }
    }

    /// One full sweep over all four artifact classes, in order. A class
    /// failure is logged and the sweep continues with the next class.
    pub async fn sweep(&self, shutdown: &mut watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        let now = self.clock.now();

        let grant_cutoff = now - self.grant_lifetime;
        match self.grants.delete_expired_grant_requests(grant_cutoff).await {
            Ok(n) if n > 0 => debug!(deleted = n, "swept expired grant requests"),
            Ok(_) => {}
            Err(e) => warn!("grant request sweep failed: {e:#}"),
        }
        if *shutdown.borrow() {
            return;
        }

        let code_cutoff = now - auth_code_lifetime();
        match self.grants.delete_expired_auth_codes(code_cutoff).await {
            Ok(n) if n > 0 => debug!(deleted = n, "swept expired authorization codes"),
            Ok(_) => {}
            Err(e) => warn!("authorization code sweep failed: {e:#}"),
        }
        if *shutdown.borrow() {
            return;
        }

        match self.tokens.delete_expired_access_tokens(now).await {
            Ok(n) if n > 0 => debug!(deleted = n, "swept expired access tokens"),
            Ok(_) => {}
            Err(e) => warn!("access token sweep failed: {e:#}"),
        }
        if *shutdown.borrow() {
            return;
        }

        match self.sessions.delete_expired_sessions(now).await {
            Ok(n) if n > 0 => debug!(deleted = n, "swept expired sessions"),
            Ok(_) => {}
            Err(e) => warn!("session sweep failed: {e:#}"),
        }
    }
}

// ABOUTME: Time source abstraction and opaque token generation
// ABOUTME: Provides SystemClock, a manual test clock, and URL-safe random tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::sync::Mutex;

use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::error;

/// Number of random bytes behind every opaque token and code
pub const TOKEN_BYTES: usize = 24;

/// Wall-clock abstraction.
///
/// All lifetime arithmetic in the core goes through this trait so the
/// test-suite can drive expiry deterministically.
pub trait Clock: Send + Sync {
    /// Current wall time, second precision or better
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a manual clock starting at the given instant
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned, which only happens after a
    /// panic in another test thread.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

/// Generate an opaque URL-safe token from the system CSPRNG.
///
/// # Errors
/// Returns an error if the system RNG fails. The service cannot mint
/// credentials without secure randomness, so callers treat this as fatal
/// for the request.
pub fn random_token() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes).map_err(|e| {
        error!("system RNG failure, cannot generate secure random bytes: {e}");
        anyhow::anyhow!("system RNG failure")
    })?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

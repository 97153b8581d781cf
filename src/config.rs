// ABOUTME: Frozen server configuration assembled once at startup
// ABOUTME: Environment-variable loading with defaults, passed by Arc into components
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

//! Configuration is constructed eagerly at process init and never mutated
//! afterwards. Components receive it behind an `Arc`; there is no lazy
//! loading and no locking on the read path.

use std::env;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

// All lifetimes and intervals are configured in minutes
const DEFAULT_SESSION_LIFETIME_MIN: i64 = 2880;
const DEFAULT_TOKEN_LIFETIME_MIN: i64 = 1440;
const DEFAULT_GRANT_REQ_LIFETIME_MIN: i64 = 15;
const DEFAULT_CLEANER_INTERVAL_MIN: i64 = 15;

/// E-mail dispatch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpMode {
    /// Hand messages to the SMTP dispatcher
    #[default]
    Live,
    /// Write the rendered message to the log instead of sending
    Print,
    /// Drop messages silently
    Skip,
}

impl SmtpMode {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "live" => Ok(Self::Live),
            "print" => Ok(Self::Print),
            "skip" => Ok(Self::Skip),
            other => anyhow::bail!("unsupported SMTP mode '{other}' (live | print | skip)"),
        }
    }
}

/// Credentials and mode for e-mail dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Sender address, also used as the SMTP user
    pub from: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub mode: SmtpMode,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            from: String::from("no-reply@g-node.org"),
            password: String::new(),
            host: String::from("localhost"),
            port: 587,
            mode: SmtpMode::Print,
        }
    }
}

/// General server configuration for gin-auth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// External base URL; defaulted from host/port when unset
    pub base_url: String,
    /// Browser session lifetime in minutes
    pub session_lifetime_min: i64,
    /// Access-token lifetime in minutes
    pub token_lifetime_min: i64,
    /// Grant-request lifetime in minutes
    pub grant_req_lifetime_min: i64,
    /// Cleaner wake interval in minutes
    pub cleaner_interval_min: i64,
    /// Path to the registered-clients YAML file
    pub clients_file: String,
    pub smtp: SmtpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 8081,
            base_url: default_base_url("localhost", 8081),
            session_lifetime_min: DEFAULT_SESSION_LIFETIME_MIN,
            token_lifetime_min: DEFAULT_TOKEN_LIFETIME_MIN,
            grant_req_lifetime_min: DEFAULT_GRANT_REQ_LIFETIME_MIN,
            cleaner_interval_min: DEFAULT_CLEANER_INTERVAL_MIN,
            clients_file: String::from("conf/clients.yml"),
            smtp: SmtpConfig::default(),
        }
    }
}

fn default_base_url(host: &str, port: u16) -> String {
    if port == 80 {
        format!("http://{host}")
    } else {
        format!("http://{host}:{port}")
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}")),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    /// Load the configuration from `GIN_AUTH_*` environment variables,
    /// falling back to the defaults above.
    ///
    /// # Errors
    /// Returns an error when a variable is present but unparsable. Config
    /// problems are fail-fast: the binary exits before serving anything.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let host: String = env_or("GIN_AUTH_HOST", defaults.host)?;
        let port: u16 = env_or("GIN_AUTH_PORT", defaults.port)?;
        let base_url = match env::var("GIN_AUTH_BASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => default_base_url(&host, port),
        };
        let smtp_mode = match env::var("GIN_AUTH_SMTP_MODE") {
            Ok(raw) => SmtpMode::parse(&raw)?,
            Err(_) => defaults.smtp.mode,
        };

        Ok(Self {
            base_url,
            session_lifetime_min: env_or(
                "GIN_AUTH_SESSION_LIFETIME",
                defaults.session_lifetime_min,
            )?,
            token_lifetime_min: env_or("GIN_AUTH_TOKEN_LIFETIME", defaults.token_lifetime_min)?,
            grant_req_lifetime_min: env_or(
                "GIN_AUTH_GRANT_LIFETIME",
                defaults.grant_req_lifetime_min,
            )?,
            cleaner_interval_min: env_or(
                "GIN_AUTH_CLEANER_INTERVAL",
                defaults.cleaner_interval_min,
            )?,
            clients_file: env_or("GIN_AUTH_CLIENTS_FILE", defaults.clients_file)?,
            smtp: SmtpConfig {
                from: env_or("GIN_AUTH_SMTP_FROM", defaults.smtp.from)?,
                password: env_or("GIN_AUTH_SMTP_PASSWORD", defaults.smtp.password)?,
                host: env_or("GIN_AUTH_SMTP_HOST", defaults.smtp.host)?,
                port: env_or("GIN_AUTH_SMTP_PORT", defaults.smtp.port)?,
                mode: smtp_mode,
            },
            host,
            port,
        })
    }

    /// Browser session lifetime
    #[must_use]
    pub fn session_lifetime(&self) -> Duration {
        Duration::minutes(self.session_lifetime_min)
    }

    /// Access-token lifetime
    #[must_use]
    pub fn token_lifetime(&self) -> Duration {
        Duration::minutes(self.token_lifetime_min)
    }

    /// Grant-request lifetime
    #[must_use]
    pub fn grant_req_lifetime(&self) -> Duration {
        Duration::minutes(self.grant_req_lifetime_min)
    }

    /// Cleaner wake interval
    #[must_use]
    pub fn cleaner_interval(&self) -> Duration {
        Duration::minutes(self.cleaner_interval_min)
    }
}

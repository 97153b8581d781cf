// ABOUTME: Read-only registry over the registered OAuth2 client applications
// ABOUTME: Loaded once from YAML at startup, immutable thereafter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::scope::Scope;

/// A registered OAuth2 client application.
///
/// Immutable at runtime; the whole set is published once behind an `Arc`
/// and read without locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub secret: String,
    pub name: String,
    /// Redirect URIs are validated by prefix match against these
    pub redirect_uri_prefixes: Vec<String>,
    pub allowed_scopes: Scope,
    /// Whether the implicit (`token`) response type is permitted
    #[serde(default)]
    pub implicit_flow: bool,
    /// Whether the resource-owner password grant is permitted
    #[serde(default)]
    pub trusted: bool,
}

/// Immutable view over all registered clients
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    /// Build a registry from an explicit client list (tests, dev mode)
    #[must_use]
    pub fn from_clients(clients: Vec<Client>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Load the registry from the YAML clients file.
    ///
    /// # Errors
    /// Fails fast on unreadable or unparsable files; the binary does not
    /// start without its client set.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read clients file {}", path.display()))?;
        let clients: Vec<Client> = serde_yaml::from_str(&raw)
            .with_context(|| format!("cannot parse clients file {}", path.display()))?;
        info!(count = clients.len(), "loaded client registry");
        Ok(Self::from_clients(clients))
    }

    /// Look up a client by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Constant-time secret comparison; false for unknown ids
    #[must_use]
    pub fn verify_secret(&self, id: &str, secret: &str) -> bool {
        self.clients.get(id).is_some_and(|client| {
            client
                .secret
                .as_bytes()
                .ct_eq(secret.as_bytes())
                .into()
        })
    }

    /// True iff the client exists and may hold every identifier in `scope`
    #[must_use]
    pub fn allows(&self, id: &str, scope: &Scope) -> bool {
        self.clients
            .get(id)
            .is_some_and(|client| client.allowed_scopes.is_superset(scope))
    }

    /// Longest-prefix match of `uri` against the client's registered
    /// prefixes; returns the matched prefix
    #[must_use]
    pub fn matches_redirect<'a>(&'a self, id: &str, uri: &str) -> Option<&'a str> {
        self.clients.get(id).and_then(|client| {
            client
                .redirect_uri_prefixes
                .iter()
                .filter(|prefix| uri.starts_with(prefix.as_str()))
                .max_by_key(|prefix| prefix.len())
                .map(String::as_str)
        })
    }
}

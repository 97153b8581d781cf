// ABOUTME: Main library entry point for the gin-auth authorization service
// ABOUTME: OAuth2-style grants, bearer tokens, browser sessions, and background cleaning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

#![deny(unsafe_code)]

//! # gin-auth
//!
//! Centralized authentication and authorization for the G-Node federation.
//! The service issues short-lived bearer tokens to registered client
//! applications on behalf of human account holders and exposes
//! introspection and account-management endpoints on top of them.
//!
//! ## Architecture
//!
//! - **Scope algebra** (`scope`): closed capability vocabulary with
//!   canonical rendering
//! - **Grant engine** (`grants`): the OAuth2 authorization state machine
//! - **Token registry** (`tokens`): access/refresh tokens and browser
//!   sessions with lifetime enforcement
//! - **Admission** (`admission`): maps inbound credentials to a principal
//! - **Cleaner** (`cleaner`): periodic garbage collection of expired
//!   artifacts
//! - **Client registry** (`clients`): immutable view over registered
//!   applications
//! - **Stores** (`store`): persistence traits plus the in-process backend
//!
//! ## Example
//!
//! ```rust,no_run
//! use gin_auth::config::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("gin-auth configured for {}", config.base_url);
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod cleaner;
pub mod clients;
pub mod clock;
pub mod config;
pub mod errors;
pub mod grants;
pub mod models;
pub mod notify;
pub mod routes;
pub mod scope;
pub mod store;
pub mod tokens;

pub use errors::{AuthError, AuthResult};

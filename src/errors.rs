// ABOUTME: Centralized error types for the gin-auth service
// ABOUTME: Maps every error kind to a fixed HTTP status and JSON body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

//! # Unified Error Handling
//!
//! Every failure surfaced by the authorization core is one of the variants
//! below. Each variant carries a human-readable message and maps to exactly
//! one HTTP status code, so handlers never pick status codes ad hoc.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Result type used throughout the authorization core
pub type AuthResult<T> = Result<T, AuthError>;

/// All error kinds surfaced by the core
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Request could not be parsed or failed basic validation
    #[error("malformed request: {0}")]
    Malformed(String),
    /// Credential missing, unknown, or expired
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Valid credential lacking the required scope
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// A concurrent mutation won the race
    #[error("conflict: {0}")]
    Conflict(String),
    /// Client id is not registered
    #[error("unknown client: {0}")]
    UnknownClient(String),
    /// Redirect URI does not match any registered prefix
    #[error("invalid redirect URI: {0}")]
    InvalidRedirect(String),
    /// Response type not permitted for this client
    #[error("unsupported response type: {0}")]
    UnsupportedResponseType(String),
    /// Requested scope exceeds what the client may ask for
    #[error("scope not allowed: {0}")]
    ScopeNotAllowed(String),
    /// Login/password verification failed
    #[error("bad credentials")]
    BadCredentials,
    /// Grant request outlived its lifetime
    #[error("grant request expired")]
    GrantExpired,
    /// Grant request token does not resolve
    #[error("unknown grant request")]
    UnknownGrant,
    /// Authorization code does not resolve (or was already consumed)
    #[error("unknown authorization code")]
    UnknownCode,
    /// Authorization code outlived its lifetime
    #[error("authorization code expired")]
    CodeExpired,
    /// Artifact was issued to a different client
    #[error("client mismatch")]
    ClientMismatch,
    /// Client secret comparison failed
    #[error("bad client secret")]
    BadSecret,
    /// Redirect URI differs from the one stored with the artifact
    #[error("redirect URI mismatch")]
    RedirectMismatch,
    /// Refresh token does not resolve or belongs to a different client
    #[error("unknown refresh token")]
    UnknownRefresh,
    /// The persistence layer failed; not recoverable within a request
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Serialized error body: `{"code": <http>, "error": <kind>, "message": <human>}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// HTTP status code, repeated in the body
    pub code: u16,
    /// Stable machine-readable error kind
    pub error: &'static str,
    /// Human-readable description
    pub message: String,
}

impl AuthError {
    /// Stable kind string used in JSON bodies and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::UnknownClient(_) => "unknown_client",
            Self::InvalidRedirect(_) => "invalid_redirect",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::ScopeNotAllowed(_) => "scope_not_allowed",
            Self::BadCredentials => "bad_credentials",
            Self::GrantExpired => "grant_expired",
            Self::UnknownGrant => "unknown_grant",
            Self::UnknownCode => "unknown_code",
            Self::CodeExpired => "code_expired",
            Self::ClientMismatch => "client_mismatch",
            Self::BadSecret => "bad_secret",
            Self::RedirectMismatch => "redirect_mismatch",
            Self::UnknownRefresh => "unknown_refresh",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Fixed HTTP status for this kind.
    ///
    /// `Forbidden` deliberately maps to 401 rather than 403: the service
    /// does not disclose the existence of foreign accounts through a
    /// distinct status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Malformed(_)
            | Self::UnknownClient(_)
            | Self::InvalidRedirect(_)
            | Self::UnsupportedResponseType(_)
            | Self::ScopeNotAllowed(_)
            | Self::UnknownCode
            | Self::CodeExpired
            | Self::ClientMismatch
            | Self::RedirectMismatch
            | Self::UnknownRefresh => StatusCode::BAD_REQUEST,

            Self::Unauthenticated(_)
            | Self::Forbidden(_)
            | Self::BadCredentials
            | Self::GrantExpired
            | Self::BadSecret => StatusCode::UNAUTHORIZED,

            Self::NotFound(_) | Self::UnknownGrant => StatusCode::NOT_FOUND,

            Self::Conflict(_) => StatusCode::CONFLICT,

            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Wrap a store failure, preserving the underlying cause in the message
    #[must_use]
    pub fn store(err: &anyhow::Error) -> Self {
        Self::StoreUnavailable(format!("{err:#}"))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(kind = self.kind(), "request failed: {}", self);
        }
        let body = ErrorBody {
            code: status.as_u16(),
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_401_by_convention() {
        assert_eq!(
            AuthError::Forbidden("not own account".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn status_mapping_is_fixed() {
        assert_eq!(
            AuthError::Malformed("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::UnknownCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::UnknownGrant.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::Conflict("stale".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::StoreUnavailable("down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

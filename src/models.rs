// ABOUTME: Core data model for accounts, grants, tokens, and sessions
// ABOUTME: Entities hold foreign keys only; joins are performed by the stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::Scope;

/// Authorization codes live for ten minutes, not configurable
#[must_use]
pub fn auth_code_lifetime() -> Duration {
    Duration::minutes(10)
}

/// A registered human account holder.
///
/// Accounts are never deleted; deactivation clears `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable opaque identifier
    pub uuid: Uuid,
    /// Unique login handle, compared case-insensitively
    pub login: String,
    /// bcrypt hash of the password
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Optional academic title
    pub title: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: String,
    /// Cleared instead of deleting the row
    pub is_active: bool,
    /// Outstanding password-reset code, if any
    #[serde(skip_serializing)]
    pub reset_code: Option<String>,
    /// Expiry of the outstanding reset code
    #[serde(skip_serializing)]
    pub reset_code_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Verify a plain-text password against the stored hash
    #[must_use]
    pub fn verify_password(&self, plain: &str) -> bool {
        bcrypt::verify(plain, &self.password_hash).unwrap_or(false)
    }
}

/// Response type requested by a client starting an authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Authorization-code flow
    Code,
    /// Implicit flow, token delivered in the redirect fragment
    Token,
}

impl ResponseType {
    /// Parse the wire form (`code` | `token`)
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "code" => Some(Self::Code),
            "token" => Some(Self::Token),
            _ => None,
        }
    }
}

/// Lifecycle state of a grant request.
///
/// Persisted with the request; every transition checks the stored state so
/// a racing second write aborts instead of regressing the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantState {
    /// Created, no user bound yet
    New,
    /// User signed in, approval outstanding
    Authenticated,
    /// Scope confirmed, code or token minted
    Approved,
    /// Redeemed into a token pair
    Consumed,
}

/// A browser in the middle of authorizing a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantRequest {
    /// Opaque URL-safe token identifying this request
    pub token: String,
    pub state: GrantState,
    pub client_id: String,
    /// Scope the client asked for; approval may narrow it
    pub scope_requested: Scope,
    pub redirect_uri: String,
    pub response_type: ResponseType,
    /// Client-supplied state string, echoed back verbatim
    pub client_state: String,
    /// Bound on login, absent until then
    pub account_uuid: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl GrantRequest {
    /// True once the request outlived the configured grant lifetime.
    /// The boundary instant itself counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, lifetime: Duration) -> bool {
        self.created_at + lifetime <= now
    }
}

/// One-shot artifact exchanged for a token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    /// Back-reference to the grant request this code finishes
    pub grant_token: String,
    pub client_id: String,
    pub account_uuid: Uuid,
    /// Scope as confirmed by the user
    pub scope: Scope,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Codes expire ten minutes after creation, boundary inclusive
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at + auth_code_lifetime() <= now
    }
}

/// Opaque bearer credential presented on API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    /// Absent for client-credentials tokens
    pub account_uuid: Option<Uuid>,
    pub client_id: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    /// Lifetime in seconds, at most the configured token lifetime
    pub lifetime_secs: i64,
}

impl AccessToken {
    /// `created_at + lifetime <= now` counts as expired
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at + Duration::seconds(self.lifetime_secs) <= now
    }

    /// Seconds until expiry, clamped at zero
    #[must_use]
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        let remaining = (self.created_at + Duration::seconds(self.lifetime_secs) - now).num_seconds();
        remaining.max(0)
    }
}

/// Long-lived credential exchanged for fresh access tokens.
///
/// Carries no expiry; it dies by revocation or rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
    pub client_id: String,
    pub account_uuid: Uuid,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
}

/// Cookie-valued browser login artifact, at most one per account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub account_uuid: Uuid,
    pub created_at: DateTime<Utc>,
    /// Lifetime in seconds
    pub lifetime_secs: i64,
}

impl Session {
    /// `created_at + lifetime <= now` counts as expired
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at + Duration::seconds(self.lifetime_secs) <= now
    }
}

/// The subject a validated credential resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A human account, identified by uuid and login
    Account {
        uuid: Uuid,
        login: String,
    },
    /// A registered client application acting for itself
    Client {
        client_id: String,
    },
    /// No credential presented
    Anonymous,
}

impl Principal {
    /// Stable subject string for logs and introspection bodies
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Account { login, .. } => login.clone(),
            Self::Client { client_id } => client_id.clone(),
            Self::Anonymous => String::from("anonymous"),
        }
    }

    /// Discriminator for the tagged variant
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Account { .. } => "account",
            Self::Client { .. } => "client",
            Self::Anonymous => "anonymous",
        }
    }

    /// Account uuid when the principal is an account
    #[must_use]
    pub const fn account_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Account { uuid, .. } => Some(*uuid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expiry_boundary_is_inclusive() {
        let created = Utc::now();
        let token = AccessToken {
            token: "t".into(),
            account_uuid: None,
            client_id: "c".into(),
            scope: Scope::empty(),
            created_at: created,
            lifetime_secs: 60,
        };
        assert!(!token.is_expired(created + Duration::seconds(59)));
        assert!(token.is_expired(created + Duration::seconds(60)));
        assert!(token.is_expired(created + Duration::seconds(61)));
    }

    #[test]
    fn grant_expiry_boundary_is_inclusive() {
        let created = Utc::now();
        let grant = GrantRequest {
            token: "g".into(),
            state: GrantState::New,
            client_id: "c".into(),
            scope_requested: Scope::empty(),
            redirect_uri: "https://ui.example/cb".into(),
            response_type: ResponseType::Code,
            client_state: "s".into(),
            account_uuid: None,
            created_at: created,
        };
        let lifetime = Duration::minutes(15);
        assert!(!grant.is_expired(created + Duration::minutes(14), lifetime));
        assert!(grant.is_expired(created + lifetime, lifetime));
    }

    #[test]
    fn principal_subject_and_kind() {
        let p = Principal::Account {
            uuid: Uuid::new_v4(),
            login: "alice".into(),
        };
        assert_eq!(p.subject(), "alice");
        assert_eq!(p.kind(), "account");
        assert_eq!(Principal::Anonymous.kind(), "anonymous");
    }
}

// ABOUTME: Scope algebra over the closed capability vocabulary
// ABOUTME: Parse, compare, intersect, and canonically render scope sets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

//! A scope is an unordered set of capability strings drawn from a closed
//! vocabulary. The canonical rendering (alphabetical, single-space
//! delimited) is what the stores persist, so string equality on rendered
//! scopes is sound.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, AuthResult};

/// The closed vocabulary of capability identifiers
pub const VOCABULARY: &[&str] = &[
    "account-admin",
    "account-read",
    "account-write",
    "email-read",
    "repo-read",
    "repo-write",
];

/// An unordered set of capability strings.
///
/// The `BTreeSet` representation keeps iteration alphabetical, which makes
/// `render` canonical without a separate sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(BTreeSet<String>);

impl Scope {
    /// The empty scope
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a whitespace-separated scope string.
    ///
    /// Identifiers are normalized to lower-case and duplicates collapse.
    ///
    /// # Errors
    /// Returns `Malformed` if any identifier is outside the vocabulary.
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let mut set = BTreeSet::new();
        for word in raw.split_ascii_whitespace() {
            let normalized = word.to_ascii_lowercase();
            if !VOCABULARY.contains(&normalized.as_str()) {
                return Err(AuthError::Malformed(format!(
                    "unknown scope identifier '{word}'"
                )));
            }
            set.insert(normalized);
        }
        Ok(Self(set))
    }

    /// Canonical rendering: alphabetical, single-space delimited
    #[must_use]
    pub fn render(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    /// True iff every identifier in `other` is also in `self`
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Set intersection
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    /// True iff the set contains the given identifier
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.0.contains(identifier)
    }

    /// Number of identifiers in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True iff the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl TryFrom<String> for Scope {
    type Error = AuthError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_and_collapses() {
        let scope = Scope::parse("repo-read  ACCOUNT-READ repo-read").unwrap();
        assert_eq!(scope.render(), "account-read repo-read");
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn parse_rejects_unknown_identifiers() {
        let err = Scope::parse("account-read launch-missiles").unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[test]
    fn parse_render_roundtrip_is_identity() {
        let canonical = "account-admin email-read repo-write";
        let scope = Scope::parse(canonical).unwrap();
        assert_eq!(scope.render(), canonical);
        assert_eq!(Scope::parse(&scope.render()).unwrap(), scope);
    }

    #[test]
    fn superset_and_intersect() {
        let wide = Scope::parse("account-read repo-read repo-write").unwrap();
        let narrow = Scope::parse("repo-read").unwrap();
        assert!(wide.is_superset(&narrow));
        assert!(!narrow.is_superset(&wide));
        assert!(wide.is_superset(&Scope::empty()));
        assert_eq!(wide.intersect(&narrow), narrow);
        let other = Scope::parse("account-read email-read").unwrap();
        assert_eq!(wide.intersect(&other).render(), "account-read");
    }

    #[test]
    fn empty_scope_renders_empty() {
        assert_eq!(Scope::empty().render(), "");
        assert!(Scope::parse("").unwrap().is_empty());
    }
}

// src/assertion/mod.rs

//! Assertions and the contracts of the collaborators that handle them
//!
//! Assertions are signed statements (model, store, snap declarations and
//! revisions, accounts and their keys). Their encoding and signature checks
//! belong to the assertion database and fetcher, which the seed writer only
//! sees through [`RoDatabase`] and [`AssertionFetcher`]. Here assertions are
//! plain header maps.

mod fetcher;

pub use fetcher::{AssertionFetcher, RefAssertsFetcher};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kinds of assertions the seed writer deals with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionType {
    Account,
    AccountKey,
    Model,
    Store,
    SnapDeclaration,
    SnapRevision,
}

impl AssertionType {
    pub const fn name(&self) -> &'static str {
        match self {
            AssertionType::Account => "account",
            AssertionType::AccountKey => "account-key",
            AssertionType::Model => "model",
            AssertionType::Store => "store",
            AssertionType::SnapDeclaration => "snap-declaration",
            AssertionType::SnapRevision => "snap-revision",
        }
    }

    /// Header names forming the primary key, in order
    pub const fn primary_key(&self) -> &'static [&'static str] {
        match self {
            AssertionType::Account => &["account-id"],
            AssertionType::AccountKey => &["public-key-sha3-384"],
            AssertionType::Model => &["series", "brand-id", "model"],
            AssertionType::Store => &["store"],
            AssertionType::SnapDeclaration => &["series", "snap-id"],
            AssertionType::SnapRevision => &["snap-sha3-384"],
        }
    }
}

impl fmt::Display for AssertionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference to an assertion by type and primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssertionRef {
    #[serde(rename = "type")]
    pub kind: AssertionType,
    #[serde(rename = "primary-key")]
    pub primary_key: Vec<String>,
}

impl AssertionRef {
    pub fn new(kind: AssertionType, primary_key: Vec<String>) -> Self {
        Self { kind, primary_key }
    }

    pub fn store(store: &str) -> Self {
        Self::new(AssertionType::Store, vec![store.to_string()])
    }

    pub fn snap_declaration(series: &str, snap_id: &str) -> Self {
        Self::new(
            AssertionType::SnapDeclaration,
            vec![series.to_string(), snap_id.to_string()],
        )
    }

    /// Stable string key, `type/key1/key2`
    pub fn unique(&self) -> String {
        let mut key = self.kind.name().to_string();
        for part in &self.primary_key {
            key.push('/');
            key.push_str(part);
        }
        key
    }
}

impl fmt::Display for AssertionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.primary_key)
    }
}

/// An assertion as a typed header map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(rename = "type")]
    pub kind: AssertionType,
    pub headers: BTreeMap<String, serde_json::Value>,
}

impl Assertion {
    pub fn new(kind: AssertionType) -> Self {
        Self {
            kind,
            headers: BTreeMap::new(),
        }
    }

    /// Builder-style header setter
    pub fn with_header(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    /// A string header, if present and a string
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.as_str())
    }

    /// The reference built from the primary key headers
    ///
    /// Missing primary key headers end up as empty components.
    pub fn reference(&self) -> AssertionRef {
        let primary_key = self
            .kind
            .primary_key()
            .iter()
            .map(|name| self.header_str(name).unwrap_or_default().to_string())
            .collect();
        AssertionRef::new(self.kind, primary_key)
    }

    /// Publisher of a snap declaration
    pub fn publisher_id(&self) -> Option<&str> {
        if self.kind != AssertionType::SnapDeclaration {
            return None;
        }
        self.header_str("publisher-id")
    }
}

/// An assertion could not be found
///
/// Database and fetcher implementations report missing assertions with this
/// error (inside their `anyhow::Error`) so callers can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reference} not found")]
pub struct NotFoundError {
    pub reference: AssertionRef,
}

/// Read-only view of the assertion database
///
/// The driving program adds fetched assertions to the database between
/// writer calls, so implementations are expected to use interior
/// mutability when shared.
pub trait RoDatabase {
    /// Find the assertion for a reference
    fn find(&self, reference: &AssertionRef) -> anyhow::Result<Assertion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_from_headers() {
        let decl = Assertion::new(AssertionType::SnapDeclaration)
            .with_header("series", "16")
            .with_header("snap-id", "pckernelidid")
            .with_header("publisher-id", "brand");

        let reference = decl.reference();
        assert_eq!(reference, AssertionRef::snap_declaration("16", "pckernelidid"));
        assert_eq!(reference.unique(), "snap-declaration/16/pckernelidid");
        assert_eq!(decl.publisher_id(), Some("brand"));
    }

    #[test]
    fn test_publisher_only_for_declarations() {
        let store = Assertion::new(AssertionType::Store)
            .with_header("store", "my-store")
            .with_header("publisher-id", "brand");
        assert_eq!(store.publisher_id(), None);
        assert_eq!(store.reference(), AssertionRef::store("my-store"));
    }
}

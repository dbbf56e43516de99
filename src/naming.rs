// src/naming.rs

//! Snap naming and identity
//!
//! A snap is identified by its name and, once known from the store, by its
//! snap-id. Everything that refers to a snap (model entries, option entries,
//! seed records, metadata) implements [`SnapRef`] so it can be matched
//! against the others through a [`SnapSet`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Anything that names a snap, optionally with its store identity
pub trait SnapRef {
    /// The snap name
    fn snap_name(&self) -> &str;

    /// The snap-id, empty when unknown (local snaps, name-only references)
    fn id(&self) -> &str;
}

/// Check whether two references denote the same snap
///
/// Identities win when both sides carry one, otherwise names are compared.
pub fn same_snap(a: &dyn SnapRef, b: &dyn SnapRef) -> bool {
    if !a.id().is_empty() && !b.id().is_empty() {
        return a.id() == b.id();
    }
    a.snap_name() == b.snap_name()
}

/// An owned name/identity reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Snap {
    pub name: String,
    pub id: String,
}

impl Snap {
    /// Reference a snap by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
        }
    }

    /// Reference a snap by name and snap-id
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl SnapRef for Snap {
    fn snap_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Errors from snap name validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("invalid snap name: {0:?}")]
    InvalidName(String),

    #[error("invalid instance key: {0:?}")]
    InvalidInstanceKey(String),
}

static SNAP_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[a-z0-9]+-?)*[a-z](?:-?[a-z0-9])*$").unwrap());

/// Validate a snap name
///
/// Names are 2 to 40 characters of lowercase letters, digits and
/// single dashes, with at least one letter and no leading or trailing dash.
pub fn validate_snap_name(name: &str) -> Result<(), NamingError> {
    if name.len() < 2 || name.len() > 40 || !SNAP_NAME_RE.is_match(name) {
        return Err(NamingError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Split `name_key` into the snap name and the parallel instance key
///
/// The key is empty for plain names.
pub fn split_instance_name(instance_name: &str) -> (&str, &str) {
    match instance_name.split_once('_') {
        Some((name, key)) => (name, key),
        None => (instance_name, ""),
    }
}

/// Index of snap references by name and by snap-id
///
/// Each entry carries a value of type `V`, typically a stable handle to the
/// record the reference came from.
#[derive(Debug, Clone)]
pub struct SnapSet<V = ()> {
    entries: Vec<(Snap, V)>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl<V> Default for SnapSet<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            by_id: HashMap::new(),
        }
    }
}

impl<V> SnapSet<V> {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, which: &dyn SnapRef) -> Option<usize> {
        if !which.id().is_empty() {
            if let Some(&idx) = self.by_id.get(which.id()) {
                return Some(idx);
            }
        }
        let idx = *self.by_name.get(which.snap_name())?;
        // a name hit with a different known identity is another snap
        let stored = &self.entries[idx].0;
        if !which.id().is_empty() && !stored.id.is_empty() && stored.id != which.id() {
            return None;
        }
        Some(idx)
    }

    /// Add a reference with its value
    ///
    /// Returns false, leaving the set untouched, if the snap is already
    /// present or another snap holds its name.
    pub fn add(&mut self, which: &dyn SnapRef, value: V) -> bool {
        if self.position(which).is_some() || self.contains_name(which.snap_name()) {
            return false;
        }
        let idx = self.entries.len();
        self.by_name.insert(which.snap_name().to_string(), idx);
        if !which.id().is_empty() {
            self.by_id.insert(which.id().to_string(), idx);
        }
        self.entries
            .push((Snap::with_id(which.snap_name(), which.id()), value));
        true
    }

    /// Look up the value stored for the snap
    pub fn lookup(&self, which: &dyn SnapRef) -> Option<&V> {
        self.position(which).map(|idx| &self.entries[idx].1)
    }

    /// Check whether the snap is present
    pub fn contains(&self, which: &dyn SnapRef) -> bool {
        self.position(which).is_some()
    }

    /// Check whether any snap in the set has this name, whatever its id
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of snaps in the set
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The references in insertion order
    pub fn snaps(&self) -> impl Iterator<Item = &Snap> {
        self.entries.iter().map(|(snap, _)| snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_snap_name() {
        for ok in ["core", "pc-kernel", "core18", "a2", "htop"] {
            assert!(validate_snap_name(ok).is_ok(), "{ok} should be valid");
        }
        for bad in ["", "a", "-foo", "foo-", "foo--bar", "Foo", "123", "foo_bar"] {
            assert!(validate_snap_name(bad).is_err(), "{bad} should be invalid");
        }
        assert!(validate_snap_name(&"a".repeat(41)).is_err());
    }

    #[test]
    fn test_split_instance_name() {
        assert_eq!(split_instance_name("foo"), ("foo", ""));
        assert_eq!(split_instance_name("foo_bar"), ("foo", "bar"));
    }

    #[test]
    fn test_snap_set_lookup_by_name_and_id() {
        let mut set = SnapSet::new();
        assert!(set.add(&Snap::named("htop"), 1));
        assert!(set.add(&Snap::with_id("pc", "pcididididid"), 2));

        assert_eq!(set.lookup(&Snap::named("htop")), Some(&1));
        // name-only entry still matches once the identity is known
        assert_eq!(set.lookup(&Snap::with_id("htop", "htopid")), Some(&1));
        assert_eq!(set.lookup(&Snap::with_id("renamed", "pcididididid")), Some(&2));
        assert_eq!(set.lookup(&Snap::with_id("pc", "otherid")), None);
        assert!(!set.contains(&Snap::named("core")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_snap_set_rejects_duplicates() {
        let mut set: SnapSet = SnapSet::new();
        assert!(set.add(&Snap::named("core"), ()));
        assert!(!set.add(&Snap::named("core"), ()));
        assert!(!set.add(&Snap::with_id("core", "coreid"), ()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_snap_set_rejects_name_with_other_id() {
        let mut set = SnapSet::new();
        assert!(set.add(&Snap::with_id("core18", "core18id"), 1));
        assert!(!set.contains(&Snap::with_id("core18", "otherid")));
        assert!(set.contains_name("core18"));
        assert!(!set.add(&Snap::with_id("core18", "otherid"), 2));
        assert_eq!(set.len(), 1);
        assert_eq!(set.lookup(&Snap::named("core18")), Some(&1));
    }

    #[test]
    fn test_same_snap() {
        assert!(same_snap(&Snap::named("core"), &Snap::with_id("core", "x")));
        assert!(!same_snap(&Snap::with_id("core", "x"), &Snap::with_id("core", "y")));
        assert!(same_snap(&Snap::with_id("a", "x"), &Snap::with_id("b", "x")));
    }
}

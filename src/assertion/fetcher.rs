// src/assertion/fetcher.rs

//! Assertion fetching with reference tracking

use std::collections::HashSet;

use tracing::debug;

use super::{Assertion, AssertionRef};

/// Fetches assertions with their prerequisites into the writing database
///
/// Implementations check signatures and retrieve prerequisite assertions
/// (accounts, account keys) as needed. Both methods return the references
/// of everything they stored, prerequisites first.
pub trait AssertionFetcher {
    /// Check an assertion already at hand, fetch its prerequisites, store it
    fn save(&mut self, assertion: &Assertion) -> anyhow::Result<Vec<AssertionRef>>;

    /// Fetch the referenced assertion and its prerequisites, store them
    fn fetch(&mut self, reference: &AssertionRef) -> anyhow::Result<Vec<AssertionRef>>;
}

/// A fetcher wrapper remembering the references of what got fetched
///
/// The writer hands it back from `Writer::start` so the driving program can
/// keep using it for snap assertions.
pub struct RefAssertsFetcher<F> {
    inner: F,
    refs: Vec<AssertionRef>,
    seen: HashSet<AssertionRef>,
}

impl<F: AssertionFetcher> RefAssertsFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            refs: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn record(&mut self, refs: Vec<AssertionRef>) -> Vec<AssertionRef> {
        for r in &refs {
            if self.seen.insert(r.clone()) {
                self.refs.push(r.clone());
            }
        }
        refs
    }

    /// Save an assertion, recording the references stored
    pub fn save(&mut self, assertion: &Assertion) -> anyhow::Result<Vec<AssertionRef>> {
        let refs = self.inner.save(assertion)?;
        debug!("Saved {} with {} reference(s)", assertion.reference(), refs.len());
        Ok(self.record(refs))
    }

    /// Fetch an assertion, recording the references stored
    pub fn fetch(&mut self, reference: &AssertionRef) -> anyhow::Result<Vec<AssertionRef>> {
        let refs = self.inner.fetch(reference)?;
        debug!("Fetched {} with {} reference(s)", reference, refs.len());
        Ok(self.record(refs))
    }

    /// Forget the references recorded so far
    pub fn reset_refs(&mut self) {
        self.refs.clear();
        self.seen.clear();
    }

    /// References recorded so far, in fetch order
    pub fn refs(&self) -> &[AssertionRef] {
        &self.refs
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut F {
        &mut self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

// src/seed/step.rs

//! Writer call protocol
//!
//! The writer methods must be invoked in this order:
//!
//! ```text
//!   SetOptionsSnaps -> Start -> LocalSnaps -> InfoDerived -> SnapsToDownload
//!                                                                 |    ^
//!                                                                 v    | not complete
//!                                                              Downloaded
//!                                                                 |
//!                                                                 v complete
//!                                                   SeedSnaps -> WriteMeta
//! ```
//!
//! with two skip edges: `Start` may come first, and without local snaps
//! `SnapsToDownload` may follow `Start` (or `LocalSnaps`) directly.

use std::fmt;

use crate::error::{Error, Result};

/// A writer method taking part in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    SetOptionsSnaps,
    Start,
    LocalSnaps,
    InfoDerived,
    SnapsToDownload,
    Downloaded,
    SeedSnaps,
    WriteMeta,
    /// Nothing left to invoke
    Done,
}

impl Step {
    pub const fn name(&self) -> &'static str {
        match self {
            Step::SetOptionsSnaps => "SetOptionsSnaps",
            Step::Start => "Start",
            Step::LocalSnaps => "LocalSnaps",
            Step::InfoDerived => "InfoDerived",
            Step::SnapsToDownload => "SnapsToDownload",
            Step::Downloaded => "Downloaded",
            Step::SeedSnaps => "SeedSnaps",
            Step::WriteMeta => "WriteMeta",
            Step::Done => "Done",
        }
    }

    /// The step expected after this one succeeded
    pub const fn next(&self) -> Step {
        match self {
            Step::SetOptionsSnaps => Step::Start,
            Step::Start => Step::LocalSnaps,
            Step::LocalSnaps => Step::InfoDerived,
            Step::InfoDerived => Step::SnapsToDownload,
            Step::SnapsToDownload => Step::Downloaded,
            Step::Downloaded => Step::SeedSnaps,
            Step::SeedSnaps => Step::WriteMeta,
            Step::WriteMeta | Step::Done => Step::Done,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When a skip edge may be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    Always,
    NoLocalSnaps,
}

/// Skip edges: (expected, invoked instead, guard)
const SKIP_EDGES: &[(Step, Step, Guard)] = &[
    (Step::SetOptionsSnaps, Step::Start, Guard::Always),
    (Step::LocalSnaps, Step::SnapsToDownload, Guard::NoLocalSnaps),
    (Step::InfoDerived, Step::SnapsToDownload, Guard::NoLocalSnaps),
];

/// The writer's step cursor
#[derive(Debug, Clone)]
pub(crate) struct StepMachine {
    expected: Step,
    failed: Option<Step>,
}

impl StepMachine {
    pub fn new() -> Self {
        Self {
            expected: Step::SetOptionsSnaps,
            failed: None,
        }
    }

    pub fn expected(&self) -> Step {
        self.expected
    }

    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }

    fn accepts(&self, step: Step, has_local_snaps: bool) -> bool {
        if step == self.expected {
            return true;
        }
        SKIP_EDGES.iter().any(|&(expected, instead, guard)| {
            expected == self.expected
                && instead == step
                && match guard {
                    Guard::Always => true,
                    Guard::NoLocalSnaps => !has_local_snaps,
                }
        })
    }

    fn expected_names(&self, has_local_snaps: bool) -> String {
        let mut names: Vec<&str> = SKIP_EDGES
            .iter()
            .filter(|&&(expected, _, guard)| {
                expected == self.expected && (guard == Guard::Always || !has_local_snaps)
            })
            .map(|&(_, instead, _)| instead.name())
            .collect();
        names.push(self.expected.name());
        names.join("|")
    }

    /// Enter `step`, advancing the cursor past it
    ///
    /// A refused step leaves the cursor untouched.
    pub fn enter(&mut self, step: Step, has_local_snaps: bool) -> Result<()> {
        if let Some(failed) = self.failed {
            return Err(Error::Protocol(format!(
                "seed writer cannot be used after {} failed, not even for {}",
                failed, step
            )));
        }
        if !self.accepts(step, has_local_snaps) {
            return Err(Error::Protocol(format!(
                "seed writer expected {} to be invoked on it at this point, not {}",
                self.expected_names(has_local_snaps),
                step
            )));
        }
        self.expected = step.next();
        Ok(())
    }

    /// Go back for another download round
    pub fn loop_back(&mut self) {
        self.expected = Step::SnapsToDownload;
    }

    /// Mark the writer unusable after `step` failed
    pub fn fail(&mut self, step: Step) {
        self.failed = Some(step);
    }
}

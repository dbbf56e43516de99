// src/seed/mod.rs

//! Seed writing
//!
//! A seed is the set of snaps, their assertions and metadata an image boots
//! from the first time. [`Writer`] works out and validates the snaps,
//! a [`SeedTree`] lays them out on disk.

mod options;
pub mod policy;
mod seed_snap;
pub mod step;
mod tree;
mod warnings;
mod writer;

pub use options::{OptionsSnap, SeedConfig, WriterOptions};
pub use policy::{GradedPolicy, LegacyPolicy, Policy};
pub use seed_snap::{OptionId, SeedId, SeedSnap};
pub use step::Step;
pub use tree::{DirTree, SeedTree};
pub use warnings::Warnings;
pub use writer::{Writer, TRUSTED_PUBLISHER};

// src/lib.rs

//! Conary Seed
//!
//! Builds the seed of an installable or bootable image: the validated set
//! of snaps, with pinned channels, verifying assertions and an on-disk
//! layout, assembled before first boot.
//!
//! # Architecture
//!
//! - Model-driven: a verified model names every snap the image needs
//! - Multi-round resolution: model snaps, implicit snaps, extra snaps
//! - Caller-driven I/O: the writer decides what to fetch, the caller fetches
//! - Generation policies: legacy and graded models differ only in policy

pub mod assertion;
pub mod channel;
mod error;
pub mod model;
pub mod naming;
pub mod seed;
pub mod snap;

pub use assertion::{
    Assertion, AssertionFetcher, AssertionRef, AssertionType, NotFoundError, RefAssertsFetcher,
    RoDatabase,
};
pub use channel::{Channel, ChannelError, Risk};
pub use error::{Error, ErrorClass, Result};
pub use model::{parse_model_file, Generation, Grade, Model, ModelError, ModelSnap};
pub use naming::{SnapRef, SnapSet};
pub use seed::{OptionsSnap, SeedConfig, SeedId, SeedSnap, Writer, WriterOptions};
pub use snap::{Confinement, Revision, SnapInfo, SnapType};

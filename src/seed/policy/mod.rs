// src/seed/policy/mod.rs

//! Seed policies
//!
//! Everything that differs between image generations is confined to a
//! [`Policy`]: which channels are acceptable, the system snap, default
//! channels, base rules and implicitly required snaps. The writer picks
//! the policy once from the model's generation and never branches on it.

mod graded;
mod legacy;

pub use graded::GradedPolicy;
pub use legacy::LegacyPolicy;

use crate::channel::Channel;
use crate::error::Result;
use crate::model::{Generation, Model, ModelSnap};
use crate::naming::SnapSet;
use crate::snap::{SnapInfo, SnapType};

use super::options::OptionsSnap;
use super::seed_snap::SeedId;
use super::warnings::Warnings;

/// Image generation specific rules for seed writing
pub trait Policy {
    /// Policy name for logging
    fn name(&self) -> &'static str;

    /// Check the global default channel before accepting it
    fn check_default_channel(&self, channel: &Channel) -> Result<()>;

    /// Check an option channel for `which_snap` before accepting it
    fn check_snap_channel(&self, channel: &Channel, which_snap: &str) -> Result<()>;

    /// Check that local snaps, extra snaps and devmode snaps can be used
    fn allows_dangerous_features(&self) -> Result<()>;

    /// The system snap, if the image has one even when the model omits it
    fn system_snap(&self) -> Option<ModelSnap>;

    fn model_snap_default_channel(&self) -> &'static str;

    fn extra_snap_default_channel(&self) -> &'static str;

    /// Check the snap's base against the snaps available so far
    fn check_base(&mut self, info: &SnapInfo, available: &SnapSet<SeedId>) -> Result<()>;

    /// Whether snaps the image requires are still missing
    ///
    /// Compatibility additions the caller should make explicit are reported
    /// through `warnings`.
    fn needs_implicit_snaps(
        &self,
        available: &SnapSet<SeedId>,
        warnings: &mut Warnings,
    ) -> Result<bool>;

    /// Missing required snaps, to be added as model snaps
    fn implicit_snaps(&self, available: &SnapSet<SeedId>) -> Vec<ModelSnap>;

    /// Missing required snaps, to be added as extra snaps
    fn implicit_extra_snaps(&self, available: &SnapSet<SeedId>) -> Vec<OptionsSnap>;
}

/// The policy for a model's generation
pub fn for_model(model: &Model) -> Box<dyn Policy> {
    match model.generation() {
        Generation::Legacy => Box::new(LegacyPolicy::new(model)),
        Generation::Graded => Box::new(GradedPolicy::new(model)),
    }
}

/// A required model snap for a system snap name
pub(crate) fn make_system_snap(name: &str, modes: &[&str]) -> ModelSnap {
    let snap_type = match name {
        "snapd" => SnapType::Snapd,
        "core" => SnapType::Os,
        _ => SnapType::App,
    };
    ModelSnap::new(name, snap_type).with_modes(modes)
}

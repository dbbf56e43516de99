// src/seed/policy/graded.rs

//! Policy for models with a grade
//!
//! Graded models always boot a base with snapd and list every snap they
//! need. Channel overrides, local snaps and extra snaps are only allowed
//! for grade `dangerous`.

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::model::{Grade, Model, ModelSnap};
use crate::naming::{Snap, SnapSet};
use crate::seed::options::OptionsSnap;
use crate::seed::seed_snap::SeedId;
use crate::seed::warnings::Warnings;
use crate::snap::{SnapInfo, SnapType};

use super::{make_system_snap, Policy};

pub struct GradedPolicy {
    grade: Grade,
}

impl GradedPolicy {
    pub fn new(model: &Model) -> Self {
        Self {
            grade: model.grade().unwrap_or(Grade::Signed),
        }
    }
}

impl Policy for GradedPolicy {
    fn name(&self) -> &'static str {
        "graded"
    }

    fn check_default_channel(&self, _channel: &Channel) -> Result<()> {
        self.allows_dangerous_features()
    }

    fn check_snap_channel(&self, _channel: &Channel, _which_snap: &str) -> Result<()> {
        self.allows_dangerous_features()
    }

    fn allows_dangerous_features(&self) -> Result<()> {
        if self.grade == Grade::Dangerous {
            return Ok(());
        }
        Err(Error::Policy(
            "cannot override channels, add local snaps or extra snaps with a model of grade higher than dangerous"
                .to_string(),
        ))
    }

    fn system_snap(&self) -> Option<ModelSnap> {
        Some(make_system_snap("snapd", &["run", "ephemeral"]))
    }

    fn model_snap_default_channel(&self) -> &'static str {
        "latest/stable"
    }

    fn extra_snap_default_channel(&self) -> &'static str {
        "latest/stable"
    }

    fn check_base(&mut self, info: &SnapInfo, available: &SnapSet<SeedId>) -> Result<()> {
        let base = if !info.base.is_empty() {
            info.base.as_str()
        } else if matches!(info.snap_type, SnapType::App | SnapType::Gadget) {
            "core"
        } else {
            return Ok(());
        };

        if available.contains(&Snap::named(base)) {
            return Ok(());
        }
        Err(Error::MissingBase {
            snap: info.name.clone(),
            base: base.to_string(),
        })
    }

    fn needs_implicit_snaps(
        &self,
        _available: &SnapSet<SeedId>,
        _warnings: &mut Warnings,
    ) -> Result<bool> {
        Ok(false)
    }

    fn implicit_snaps(&self, _available: &SnapSet<SeedId>) -> Vec<ModelSnap> {
        Vec::new()
    }

    fn implicit_extra_snaps(&self, _available: &SnapSet<SeedId>) -> Vec<OptionsSnap> {
        Vec::new()
    }
}

// src/seed/policy/legacy.rs

//! Policy for models without a grade
//!
//! These images run either on the `core` snap (no boot base in the model)
//! or on a boot base plus `snapd`. Classic models may have no snaps at all,
//! but once they have some, snapd (or core) must come along.

use tracing::debug;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::model::{Model, ModelSnap};
use crate::naming::{Snap, SnapSet};
use crate::seed::options::OptionsSnap;
use crate::seed::seed_snap::SeedId;
use crate::seed::warnings::Warnings;
use crate::snap::{SnapInfo, SnapType};

use super::{make_system_snap, Policy};

pub struct LegacyPolicy {
    classic: bool,
    /// Boot base named by the model
    base: Option<String>,
    /// Snaps without a base, which run on `core`
    needs_core: Vec<String>,
    /// Snaps on `core16` that could run on `core` instead
    needs_core16: Vec<String>,
}

impl LegacyPolicy {
    pub fn new(model: &Model) -> Self {
        Self {
            classic: model.classic(),
            base: model.base().map(|b| b.name.clone()),
            needs_core: Vec::new(),
            needs_core16: Vec::new(),
        }
    }

    fn missing_core(&self, available: &SnapSet<SeedId>) -> bool {
        !self.needs_core.is_empty() && !available.contains(&Snap::named("core"))
    }

    fn missing_system(&self, available: &SnapSet<SeedId>) -> bool {
        !available.contains(&Snap::named("snapd")) && !available.contains(&Snap::named("core"))
    }

    fn implicit_names(&self, available: &SnapSet<SeedId>) -> Vec<&'static str> {
        if self.missing_core(available) {
            vec!["core"]
        } else if self.missing_system(available) {
            vec!["snapd"]
        } else {
            Vec::new()
        }
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("{:?}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Policy for LegacyPolicy {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn check_default_channel(&self, _channel: &Channel) -> Result<()> {
        Ok(())
    }

    fn check_snap_channel(&self, _channel: &Channel, _which_snap: &str) -> Result<()> {
        Ok(())
    }

    fn allows_dangerous_features(&self) -> Result<()> {
        Ok(())
    }

    fn system_snap(&self) -> Option<ModelSnap> {
        if self.classic {
            // decided later from what gets added
            return None;
        }
        if self.base.is_some() {
            Some(make_system_snap("snapd", &["run"]))
        } else {
            Some(make_system_snap("core", &["run"]))
        }
    }

    fn model_snap_default_channel(&self) -> &'static str {
        "stable"
    }

    fn extra_snap_default_channel(&self) -> &'static str {
        "stable"
    }

    fn check_base(&mut self, info: &SnapInfo, available: &SnapSet<SeedId>) -> Result<()> {
        if info.base.is_empty() {
            if matches!(info.snap_type, SnapType::App | SnapType::Gadget)
                && !available.contains(&Snap::named("core"))
            {
                debug!("Snap {} runs on core, remembering", info.name);
                self.needs_core.push(info.name.clone());
            }
            return Ok(());
        }

        if available.contains(&Snap::named(&info.base)) {
            return Ok(());
        }

        if info.base == "core16" {
            if available.contains(&Snap::named("core")) {
                return Ok(());
            }
            self.needs_core16.push(info.name.clone());
            return Ok(());
        }

        Err(Error::MissingBase {
            snap: info.name.clone(),
            base: info.base.clone(),
        })
    }

    fn needs_implicit_snaps(
        &self,
        available: &SnapSet<SeedId>,
        warnings: &mut Warnings,
    ) -> Result<bool> {
        let has_core = available.contains(&Snap::named("core"));

        if self.missing_core(available) {
            if let Some(base) = &self.base {
                warnings.push(format!(
                    "model has base {:?} but some snaps ({}) require \"core\" as base as well, \
                     for compatibility it was added implicitly, adding \"core\" explicitly is recommended",
                    base,
                    quoted(&self.needs_core)
                ));
            }
            return Ok(true);
        }

        if !self.needs_core16.is_empty()
            && !has_core
            && !available.contains(&Snap::named("core16"))
        {
            return Err(Error::Policy(format!(
                "cannot use {} requiring base \"core16\" without adding \"core16\" (or \"core\") explicitly",
                quoted(&self.needs_core16)
            )));
        }

        Ok(self.classic && !available.is_empty() && self.missing_system(available))
    }

    fn implicit_snaps(&self, available: &SnapSet<SeedId>) -> Vec<ModelSnap> {
        self.implicit_names(available)
            .into_iter()
            .map(|name| make_system_snap(name, &["run"]))
            .collect()
    }

    fn implicit_extra_snaps(&self, available: &SnapSet<SeedId>) -> Vec<OptionsSnap> {
        self.implicit_names(available)
            .into_iter()
            .map(OptionsSnap::named)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::policy::testutil::{available, model};

    fn info(name: &str, snap_type: SnapType, base: &str) -> SnapInfo {
        let mut info = SnapInfo::new(name, snap_type);
        info.base = base.to_string();
        info
    }

    #[test]
    fn test_system_snap() {
        let core_based = LegacyPolicy::new(&model(false, None, None));
        assert_eq!(core_based.system_snap().unwrap().name, "core");

        let base_based = LegacyPolicy::new(&model(false, Some("core18"), None));
        assert_eq!(base_based.system_snap().unwrap().name, "snapd");

        let classic = LegacyPolicy::new(&model(true, None, None));
        assert!(classic.system_snap().is_none());
    }

    #[test]
    fn test_check_base() {
        let mut pol = LegacyPolicy::new(&model(false, Some("core18"), None));
        let avail = available(&["snapd", "pc-kernel", "core18", "pc"]);

        assert!(pol.check_base(&info("pc", SnapType::Gadget, "core18"), &avail).is_ok());
        let err = pol
            .check_base(&info("foo", SnapType::App, "core20"), &avail)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot add snap \"foo\" without also adding its base \"core20\" explicitly"
        );
    }

    #[test]
    fn test_needs_core_with_base_model_adds_core() {
        let mut pol = LegacyPolicy::new(&model(false, Some("core18"), None));
        let avail = available(&["snapd", "pc-kernel", "core18", "pc", "old-app"]);
        pol.check_base(&info("old-app", SnapType::App, ""), &avail).unwrap();

        let mut warnings = Warnings::default();
        assert!(pol.needs_implicit_snaps(&avail, &mut warnings).unwrap());
        assert_eq!(
            warnings.messages(),
            ["model has base \"core18\" but some snaps (\"old-app\") require \"core\" as base as well, for compatibility it was added implicitly, adding \"core\" explicitly is recommended"]
        );
        let implicit: Vec<String> = pol.implicit_snaps(&avail).into_iter().map(|s| s.name).collect();
        assert_eq!(implicit, vec!["core"]);

        let done = available(&["snapd", "pc-kernel", "core18", "pc", "old-app", "core"]);
        assert!(!pol.needs_implicit_snaps(&done, &mut warnings).unwrap());
        assert_eq!(warnings.messages().len(), 1);
    }

    #[test]
    fn test_core16_satisfied_by_core() {
        let mut pol = LegacyPolicy::new(&model(false, None, None));
        let avail = available(&["core", "pc-kernel", "pc", "app16"]);
        pol.check_base(&info("app16", SnapType::App, "core16"), &avail).unwrap();
        assert!(!pol.needs_implicit_snaps(&avail, &mut Warnings::default()).unwrap());
    }

    #[test]
    fn test_core16_missing() {
        let mut pol = LegacyPolicy::new(&model(false, Some("core18"), None));
        let avail = available(&["snapd", "pc-kernel", "core18", "pc", "app16"]);
        pol.check_base(&info("app16", SnapType::App, "core16"), &avail).unwrap();
        let err = pol.needs_implicit_snaps(&avail, &mut Warnings::default()).unwrap_err();
        assert!(err.to_string().contains("\"core16\""), "{err}");
    }

    #[test]
    fn test_classic_implicit_snapd() {
        let mut pol = LegacyPolicy::new(&model(true, None, None));
        assert!(!pol.needs_implicit_snaps(&available(&[]), &mut Warnings::default()).unwrap());

        let avail = available(&["core18", "app18"]);
        pol.check_base(&info("app18", SnapType::App, "core18"), &avail).unwrap();
        assert!(pol.needs_implicit_snaps(&avail, &mut Warnings::default()).unwrap());
        let implicit: Vec<String> = pol.implicit_snaps(&avail).into_iter().map(|s| s.name).collect();
        assert_eq!(implicit, vec!["snapd"]);
        assert_eq!(pol.implicit_extra_snaps(&avail), vec![OptionsSnap::named("snapd")]);

        let done = available(&["core18", "app18", "snapd"]);
        assert!(!pol.needs_implicit_snaps(&done, &mut Warnings::default()).unwrap());
        assert!(pol.implicit_snaps(&done).is_empty());
    }

    #[test]
    fn test_classic_implicit_core() {
        let mut pol = LegacyPolicy::new(&model(true, None, None));
        let avail = available(&["old-app"]);
        pol.check_base(&info("old-app", SnapType::App, ""), &avail).unwrap();
        assert!(pol.needs_implicit_snaps(&avail, &mut Warnings::default()).unwrap());
        let implicit: Vec<String> = pol.implicit_snaps(&avail).into_iter().map(|s| s.name).collect();
        assert_eq!(implicit, vec!["core"]);
    }
}

// src/model/mod.rs

//! Image models
//!
//! A model is the verified manifest an image is built for. It names the
//! brand, the device store and every snap belonging to the image, including
//! the essential ones (kernel, gadget, boot base) that participate in boot.
//!
//! # Example model.toml
//!
//! ```toml
//! [model]
//! brand-id = "my-brand"
//! model = "my-pc"
//! store = "my-store"
//!
//! [[snaps]]
//! name = "pc"
//! type = "gadget"
//! default-channel = "18/stable"
//!
//! [[snaps]]
//! name = "pc-kernel"
//! type = "kernel"
//! track = "18"            # pinned track
//!
//! [[snaps]]
//! name = "core18"
//! type = "base"
//! ```
//!
//! Models with a `grade` belong to the graded generation, the others to the
//! legacy one. The generation selects the seed policy.

pub mod parser;

pub use parser::{parse_model_file, Grade, Model, ModelHeader, ModelSnap, Presence};

use std::collections::HashSet;

use thiserror::Error;

use crate::assertion::{Assertion, AssertionRef, AssertionType};
use crate::channel::Channel;
use crate::naming::validate_snap_name;
use crate::snap::SnapType;

/// Errors that can occur when working with models
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse model file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Model header {0:?} cannot be empty")]
    MissingHeader(&'static str),

    #[error("Invalid model snap: {0}")]
    InvalidSnap(String),

    #[error("Conflicting model specifications: {0}")]
    ConflictingSpecs(String),

    #[error("Invalid model {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("Failed to encode model assertion: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Model generation, deciding which seed policy applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Models without a grade
    Legacy,
    /// Models with a grade
    Graded,
}

/// Position of a snap in the essential boot order
fn essential_rank(snap_type: SnapType) -> u8 {
    match snap_type {
        SnapType::Snapd => 0,
        SnapType::Kernel => 1,
        SnapType::Base | SnapType::Os => 2,
        SnapType::Gadget => 3,
        SnapType::App => 4,
    }
}

impl Model {
    pub fn brand_id(&self) -> &str {
        &self.header.brand_id
    }

    pub fn model_name(&self) -> &str {
        &self.header.model
    }

    pub fn series(&self) -> &str {
        &self.header.series
    }

    pub fn store(&self) -> Option<&str> {
        self.header.store.as_deref().filter(|s| !s.is_empty())
    }

    pub fn grade(&self) -> Option<Grade> {
        self.header.grade
    }

    pub fn classic(&self) -> bool {
        self.header.classic
    }

    pub fn generation(&self) -> Generation {
        match self.header.grade {
            Some(_) => Generation::Graded,
            None => Generation::Legacy,
        }
    }

    fn snap_of_type(&self, snap_type: SnapType) -> Option<&ModelSnap> {
        self.snaps.iter().find(|s| s.snap_type == snap_type)
    }

    pub fn kernel(&self) -> Option<&ModelSnap> {
        self.snap_of_type(SnapType::Kernel)
    }

    pub fn gadget(&self) -> Option<&ModelSnap> {
        self.snap_of_type(SnapType::Gadget)
    }

    /// The boot base, `None` for models running on `core`
    pub fn base(&self) -> Option<&ModelSnap> {
        self.snap_of_type(SnapType::Base)
    }

    /// All model snaps, essential ones first in boot order
    ///
    /// The order is snapd, kernel, boot base, gadget, then the remaining
    /// snaps as declared.
    pub fn all_snaps(&self) -> Vec<&ModelSnap> {
        let mut snaps: Vec<&ModelSnap> = self.snaps.iter().collect();
        // stable: non-essential snaps keep declaration order
        snaps.sort_by_key(|s| {
            if self.base().is_none() && s.snap_type == SnapType::Os {
                2
            } else if s.snap_type == SnapType::Os {
                4
            } else {
                essential_rank(s.snap_type)
            }
        });
        snaps
    }

    /// Describe a model snap by its role, for error messages
    pub fn describe_snap(&self, snap: &ModelSnap) -> String {
        match snap.snap_type {
            SnapType::Kernel => format!("kernel {:?}", snap.name),
            SnapType::Gadget => format!("gadget {:?}", snap.name),
            SnapType::Base => format!("boot base {:?}", snap.name),
            _ => format!("snap {:?}", snap.name),
        }
    }

    /// Reference to this model's assertion
    pub fn assertion_ref(&self) -> AssertionRef {
        AssertionRef::new(
            AssertionType::Model,
            vec![
                self.header.series.clone(),
                self.header.brand_id.clone(),
                self.header.model.clone(),
            ],
        )
    }

    /// The model as an assertion header map
    pub fn assertion(&self) -> ModelResult<Assertion> {
        let mut assertion = Assertion::new(AssertionType::Model)
            .with_header("series", self.header.series.as_str())
            .with_header("brand-id", self.header.brand_id.as_str())
            .with_header("model", self.header.model.as_str())
            .with_header("classic", self.header.classic);
        if let Some(store) = self.store() {
            assertion = assertion.with_header("store", store);
        }
        if let Some(grade) = self.header.grade {
            assertion = assertion.with_header("grade", grade.as_str());
        }
        if let Some(arch) = &self.header.architecture {
            assertion = assertion.with_header("architecture", arch.as_str());
        }
        Ok(assertion.with_header("snaps", serde_json::to_value(&self.snaps)?))
    }

    /// Validate the model for consistency
    pub fn validate(&self) -> ModelResult<()> {
        if self.header.brand_id.is_empty() {
            return Err(ModelError::MissingHeader("brand-id"));
        }
        if self.header.model.is_empty() {
            return Err(ModelError::MissingHeader("model"));
        }
        if self.header.series.is_empty() {
            return Err(ModelError::MissingHeader("series"));
        }

        let mut names = HashSet::new();
        for snap in &self.snaps {
            validate_snap_name(&snap.name)
                .map_err(|e| ModelError::InvalidSnap(e.to_string()))?;
            if !names.insert(snap.name.as_str()) {
                return Err(ModelError::InvalidSnap(format!(
                    "snap {:?} is listed more than once",
                    snap.name
                )));
            }
            if !snap.default_channel.is_empty() {
                Channel::parse_verbatim(&snap.default_channel).map_err(|e| {
                    ModelError::InvalidSnap(format!(
                        "default channel for snap {:?}: {}",
                        snap.name, e
                    ))
                })?;
            }
            if !snap.pinned_track.is_empty() {
                let track = Channel::parse_verbatim(&snap.pinned_track).ok();
                if track.is_none_or(|ch| ch.track != snap.pinned_track) {
                    return Err(ModelError::InvalidSnap(format!(
                        "invalid pinned track {:?} for snap {:?}",
                        snap.pinned_track, snap.name
                    )));
                }
                if !snap.default_channel.is_empty() {
                    return Err(ModelError::ConflictingSpecs(format!(
                        "snap {:?} has both a pinned track and a default channel",
                        snap.name
                    )));
                }
            }
        }

        for essential in [SnapType::Kernel, SnapType::Gadget, SnapType::Base, SnapType::Snapd] {
            let count = self.snaps.iter().filter(|s| s.snap_type == essential).count();
            if count > 1 {
                return Err(ModelError::ConflictingSpecs(format!(
                    "more than one {} snap",
                    essential
                )));
            }
        }

        if self.header.classic {
            if self.kernel().is_some() {
                return Err(ModelError::ConflictingSpecs(
                    "classic models cannot have a kernel".to_string(),
                ));
            }
        } else {
            if self.kernel().is_none() {
                return Err(ModelError::InvalidSnap("model has no kernel".to_string()));
            }
            if self.gadget().is_none() {
                return Err(ModelError::InvalidSnap("model has no gadget".to_string()));
            }
        }

        if self.generation() == Generation::Graded && self.base().is_none() {
            return Err(ModelError::InvalidSnap(
                "graded models need a boot base".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(snaps: Vec<ModelSnap>) -> Model {
        Model {
            header: ModelHeader {
                series: "16".to_string(),
                brand_id: "my-brand".to_string(),
                model: "my-model".to_string(),
                store: None,
                grade: None,
                classic: false,
                architecture: None,
            },
            snaps,
        }
    }

    #[test]
    fn test_all_snaps_essential_order() {
        let m = model(vec![
            ModelSnap::new("htop", SnapType::App),
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("core18", SnapType::Base),
            ModelSnap::new("pc-kernel", SnapType::Kernel),
            ModelSnap::new("core", SnapType::Os),
        ]);
        let names: Vec<&str> = m.all_snaps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["pc-kernel", "core18", "pc", "htop", "core"]);
    }

    #[test]
    fn test_all_snaps_core_as_base() {
        let m = model(vec![
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("pc-kernel", SnapType::Kernel),
            ModelSnap::new("core", SnapType::Os),
        ]);
        let names: Vec<&str> = m.all_snaps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["pc-kernel", "core", "pc"]);
        assert!(m.base().is_none());
    }

    #[test]
    fn test_validate() {
        let ok = model(vec![
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("pc-kernel", SnapType::Kernel).with_pinned_track("18"),
        ]);
        assert!(ok.validate().is_ok());

        let dup = model(vec![
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("pc-kernel", SnapType::Kernel),
            ModelSnap::new("pc", SnapType::App),
        ]);
        assert!(matches!(dup.validate(), Err(ModelError::InvalidSnap(_))));

        let no_kernel = model(vec![ModelSnap::new("pc", SnapType::Gadget)]);
        assert!(no_kernel.validate().is_err());

        let both = model(vec![
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("pc-kernel", SnapType::Kernel)
                .with_pinned_track("18")
                .with_default_channel("18/edge"),
        ]);
        assert!(matches!(both.validate(), Err(ModelError::ConflictingSpecs(_))));

        let bad_track = model(vec![
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("pc-kernel", SnapType::Kernel).with_pinned_track("18/edge"),
        ]);
        assert!(bad_track.validate().is_err());
    }

    #[test]
    fn test_graded_needs_base() {
        let mut m = model(vec![
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("pc-kernel", SnapType::Kernel),
        ]);
        m.header.grade = Some(Grade::Signed);
        assert_eq!(m.generation(), Generation::Graded);
        assert!(m.validate().is_err());

        m.snaps.push(ModelSnap::new("core20", SnapType::Base));
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_describe_snap_and_assertion() {
        let m = model(vec![
            ModelSnap::new("pc", SnapType::Gadget),
            ModelSnap::new("pc-kernel", SnapType::Kernel),
        ]);
        assert_eq!(m.describe_snap(&m.snaps[1]), "kernel \"pc-kernel\"");
        assert_eq!(
            m.describe_snap(&ModelSnap::new("htop", SnapType::App)),
            "snap \"htop\""
        );

        let a = m.assertion().unwrap();
        assert_eq!(a.reference(), m.assertion_ref());
        assert!(a.headers.contains_key("snaps"));
        assert_eq!(a.header_str("architecture"), None);

        let mut amd64 = m.clone();
        amd64.header.architecture = Some("amd64".to_string());
        let a = amd64.assertion().unwrap();
        assert_eq!(a.header_str("architecture"), Some("amd64"));
    }
}

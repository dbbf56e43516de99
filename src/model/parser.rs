// src/model/parser.rs

//! Parser for model TOML files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::naming::SnapRef;
use crate::snap::SnapType;

use super::{ModelError, ModelResult};

/// Model header section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModelHeader {
    #[serde(default = "default_series")]
    pub series: String,

    pub brand_id: String,

    pub model: String,

    /// Device store, if any
    #[serde(default)]
    pub store: Option<String>,

    /// Grade, present only for models of the graded generation
    #[serde(default)]
    pub grade: Option<Grade>,

    /// Classic (non-core) image
    #[serde(default)]
    pub classic: bool,

    #[serde(default)]
    pub architecture: Option<String>,
}

fn default_series() -> String {
    "16".to_string()
}

/// Model grade, from least to most restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    /// Development images: local snaps, extra snaps and channel overrides allowed
    Dangerous,
    Signed,
    Secured,
}

impl Grade {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Grade::Dangerous => "dangerous",
            Grade::Signed => "signed",
            Grade::Secured => "secured",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a model snap must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Required,
    Optional,
}

/// A snap declared by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModelSnap {
    pub name: String,

    /// Store snap-id, empty when not known
    #[serde(default, rename = "id")]
    pub snap_id: String,

    #[serde(default, rename = "type")]
    pub snap_type: SnapType,

    #[serde(default)]
    pub default_channel: String,

    /// Pinned track, empty when not pinned
    #[serde(default, rename = "track")]
    pub pinned_track: String,

    #[serde(default)]
    pub modes: Vec<String>,

    #[serde(default)]
    pub presence: Presence,
}

impl ModelSnap {
    /// A required model snap with no channel preferences
    pub fn new(name: impl Into<String>, snap_type: SnapType) -> Self {
        Self {
            name: name.into(),
            snap_id: String::new(),
            snap_type,
            default_channel: String::new(),
            pinned_track: String::new(),
            modes: Vec::new(),
            presence: Presence::Required,
        }
    }

    pub fn with_id(mut self, snap_id: impl Into<String>) -> Self {
        self.snap_id = snap_id.into();
        self
    }

    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = channel.into();
        self
    }

    pub fn with_pinned_track(mut self, track: impl Into<String>) -> Self {
        self.pinned_track = track.into();
        self
    }

    pub fn with_modes(mut self, modes: &[&str]) -> Self {
        self.modes = modes.iter().map(|m| m.to_string()).collect();
        self
    }
}

impl SnapRef for ModelSnap {
    fn snap_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.snap_id
    }
}

/// A model: the manifest declaring an image's brand, store and snaps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "model")]
    pub header: ModelHeader,

    #[serde(default)]
    pub snaps: Vec<ModelSnap>,
}

impl Model {
    /// Parse and validate a model from TOML text
    pub fn from_toml_str(content: &str) -> ModelResult<Self> {
        let model: Model = toml::from_str(content)?;
        model.validate()?;
        Ok(model)
    }
}

/// Parse and validate a model file
pub fn parse_model_file(path: &Path) -> ModelResult<Model> {
    let content = std::fs::read_to_string(path)?;
    Model::from_toml_str(&content).map_err(|e| match e {
        ModelError::ParseError(_) | ModelError::ReadError(_) => e,
        other => ModelError::Invalid {
            path: path.display().to_string(),
            reason: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PC_MODEL: &str = r#"
[model]
brand-id = "my-brand"
model = "my-model"
store = "my-store"

[[snaps]]
name = "pc"
id = "pcididididididididididididididid"
type = "gadget"
default-channel = "18/stable"

[[snaps]]
name = "pc-kernel"
id = "pckernelidididididididididididid"
type = "kernel"
track = "18"

[[snaps]]
name = "core18"
type = "base"

[[snaps]]
name = "htop"
presence = "optional"
"#;

    #[test]
    fn test_parse_model() {
        let model = Model::from_toml_str(PC_MODEL).unwrap();
        assert_eq!(model.header.series, "16");
        assert_eq!(model.header.brand_id, "my-brand");
        assert_eq!(model.header.store.as_deref(), Some("my-store"));
        assert_eq!(model.snaps.len(), 4);

        let kernel = &model.snaps[1];
        assert_eq!(kernel.snap_type, SnapType::Kernel);
        assert_eq!(kernel.pinned_track, "18");
        assert_eq!(model.snaps[3].snap_type, SnapType::App);
        assert_eq!(model.snaps[3].presence, Presence::Optional);
    }

    #[test]
    fn test_parse_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(&path, PC_MODEL).unwrap();
        let model = parse_model_file(&path).unwrap();
        assert_eq!(model.header.model, "my-model");

        std::fs::write(&path, "[model]\nbrand-id = \"b\"\nmodel = \"m\"\n").unwrap();
        let err = parse_model_file(&path).unwrap_err();
        assert!(matches!(err, ModelError::Invalid { .. }), "{err}");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Model::from_toml_str("[model]\nmodel = \"m\"\n"),
            Err(ModelError::ParseError(_))
        ));
    }
}

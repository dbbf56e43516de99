// src/seed/options.rs

//! Writer options and option snaps
//!
//! Options can be built in code or loaded from a TOML file:
//!
//! ```toml
//! [seed]
//! seed-dir = "/tmp/image/var/lib/snapd/seed"
//! default-channel = "candidate"
//!
//! [[snaps]]
//! name = "htop"
//! channel = "stable"
//!
//! [[snaps]]
//! path = "local/hello_1.snap"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::naming::SnapRef;

/// Options for a seed writer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WriterOptions {
    /// Root directory of the seed
    pub seed_dir: PathBuf,

    /// Channel used for snaps with no option channel of their own
    #[serde(default)]
    pub default_channel: String,

    /// Accept a model whose assertion cannot be verified
    ///
    /// Only meant for naive tests, the resulting image is broken.
    #[serde(default)]
    pub test_skip_copy_unverified_model: bool,
}

impl WriterOptions {
    pub fn new(seed_dir: impl Into<PathBuf>) -> Self {
        Self {
            seed_dir: seed_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = channel.into();
        self
    }
}

/// A snap referred to by the options, e.g. passed on the command line
///
/// With a name the snap comes from the store, with a path it is a local
/// snap file. Exactly one of them is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsSnap {
    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "id")]
    pub snap_id: String,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub channel: String,
}

impl OptionsSnap {
    /// A store snap by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A local snap file
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Name or path, for messages
    pub fn describe(&self) -> String {
        match (&self.path, self.name.is_empty()) {
            (Some(path), true) => path.display().to_string(),
            _ => self.name.clone(),
        }
    }
}

impl SnapRef for OptionsSnap {
    fn snap_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.snap_id
    }
}

/// Seed configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub seed: WriterOptions,

    /// Option snaps, in order
    #[serde(default)]
    pub snaps: Vec<OptionsSnap>,
}

impl SeedConfig {
    /// Parse a seed configuration from TOML text
    ///
    /// Relative local snap paths are kept as written.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a seed configuration file
    ///
    /// Relative local snap paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            for snap in &mut config.snaps {
                if let Some(p) = &snap.path {
                    if p.is_relative() {
                        snap.path = Some(base.join(p));
                    }
                }
            }
        }
        Ok(config)
    }
}

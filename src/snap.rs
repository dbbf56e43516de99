// src/snap.rs

//! Snap metadata as seen by the seed writer
//!
//! [`SnapInfo`] is filled by the driving program from store metadata or
//! from a local snap file. The writer only reads it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming::SnapRef;

/// Role of a snap in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapType {
    #[default]
    App,
    Gadget,
    Kernel,
    Base,
    /// The legacy `core` snap, system base and snapd in one
    #[serde(alias = "core")]
    Os,
    Snapd,
}

impl SnapType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SnapType::App => "app",
            SnapType::Gadget => "gadget",
            SnapType::Kernel => "kernel",
            SnapType::Base => "base",
            SnapType::Os => "os",
            SnapType::Snapd => "snapd",
        }
    }
}

impl fmt::Display for SnapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confinement requested by a snap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confinement {
    #[default]
    Strict,
    Devmode,
    Classic,
}

/// Snap revision
///
/// Store revisions are positive, local revisions negative (`x1` for -1).
/// Zero means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Revision(pub i32);

impl Revision {
    pub const UNSET: Revision = Revision(0);

    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }

    pub fn is_local(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "x{}", -(self.0 as i64))
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A content interface plug, possibly naming a default provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentPlug {
    pub name: String,
    /// `snap` or `snap:slot`
    #[serde(default, rename = "default-provider")]
    pub default_provider: Option<String>,
}

/// Metadata of a snap about to be seeded
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapInfo {
    pub name: String,
    #[serde(default, rename = "snap-id")]
    pub snap_id: String,
    #[serde(default)]
    pub revision: Revision,
    #[serde(default, rename = "type")]
    pub snap_type: SnapType,
    /// Base snap, empty for snaps running on `core`
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub confinement: Confinement,
    #[serde(default, rename = "content-plugs")]
    pub content_plugs: Vec<ContentPlug>,
}

impl SnapInfo {
    pub fn new(name: impl Into<String>, snap_type: SnapType) -> Self {
        Self {
            name: name.into(),
            snap_type,
            ..Default::default()
        }
    }

    /// File name of the snap when mounted from the seed, `name_rev.snap`
    pub fn mount_file(&self) -> String {
        format!("{}_{}.snap", self.name, self.revision)
    }

    pub fn needs_classic(&self) -> bool {
        self.confinement == Confinement::Classic
    }

    pub fn needs_devmode(&self) -> bool {
        self.confinement == Confinement::Devmode
    }

    /// Snaps named as default providers of this snap's content plugs
    ///
    /// Deduplicated, in plug order.
    pub fn needed_default_providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = Vec::new();
        for plug in &self.content_plugs {
            let Some(provider) = plug.default_provider.as_deref() else {
                continue;
            };
            let name = provider.split_once(':').map_or(provider, |(name, _)| name);
            if !name.is_empty() && !providers.contains(&name) {
                providers.push(name);
            }
        }
        providers
    }
}

impl SnapRef for SnapInfo {
    fn snap_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.snap_id
    }
}

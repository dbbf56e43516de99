// src/seed/seed_snap.rs

//! Seed snap records

use std::path::{Path, PathBuf};

use crate::assertion::AssertionRef;
use crate::model::ModelSnap;
use crate::naming::SnapRef;
use crate::snap::SnapInfo;

/// Handle to a seed snap owned by a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeedId(pub(crate) usize);

impl SeedId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to an option snap, its position in the registered list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId(pub(crate) usize);

impl OptionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A snap being added to a seed
///
/// Created by the writer while resolving, filled by the driving program
/// through `Writer::set_info` and `Writer::set_assertion_refs`.
#[derive(Debug, Clone)]
pub struct SeedSnap {
    /// Reference used until info is known
    pub(crate) name: String,
    pub(crate) snap_id: String,

    pub(crate) channel: String,
    pub(crate) path: PathBuf,

    pub(crate) info: Option<SnapInfo>,
    pub(crate) arefs: Option<Vec<AssertionRef>>,

    pub(crate) local: bool,
    pub(crate) model_snap: Option<ModelSnap>,
    pub(crate) option_snap: Option<OptionId>,
    /// Channel requested through options, merged across option entries
    pub(crate) option_channel: String,
}

impl SeedSnap {
    pub(crate) fn from_store(name: &str, snap_id: &str) -> Self {
        Self {
            name: name.to_string(),
            snap_id: snap_id.to_string(),
            channel: String::new(),
            path: PathBuf::new(),
            info: None,
            arefs: None,
            local: false,
            model_snap: None,
            option_snap: None,
            option_channel: String::new(),
        }
    }

    pub(crate) fn from_local(path: &Path, option: OptionId, option_channel: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            local: true,
            option_snap: Some(option),
            option_channel: option_channel.to_string(),
            ..Self::from_store("", "")
        }
    }

    /// Resolved channel, empty until the snap's round computed it
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Source path for local snaps, download destination for store snaps,
    /// seed location once seeded
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> Option<&SnapInfo> {
        self.info.as_ref()
    }

    pub fn assertion_refs(&self) -> &[AssertionRef] {
        self.arefs.as_deref().unwrap_or_default()
    }

    pub(crate) fn has_assertion_refs(&self) -> bool {
        self.arefs.as_ref().is_some_and(|refs| !refs.is_empty())
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    /// The model entry this snap resolves, if any
    pub fn model_snap(&self) -> Option<&ModelSnap> {
        self.model_snap.as_ref()
    }

    /// The option entry this snap came from, if any
    pub fn option_snap(&self) -> Option<OptionId> {
        self.option_snap
    }

    /// Whether the snap carries no store identity
    pub fn is_unasserted(&self) -> bool {
        self.info.as_ref().is_none_or(|info| info.snap_id.is_empty())
    }
}

impl SnapRef for SeedSnap {
    fn snap_name(&self) -> &str {
        match &self.info {
            Some(info) => &info.name,
            None => &self.name,
        }
    }

    fn id(&self) -> &str {
        match &self.info {
            Some(info) => &info.snap_id,
            None => &self.snap_id,
        }
    }
}

// src/seed/tree.rs

//! Seed directory layout
//!
//! The writer decides what goes into a seed; a [`SeedTree`] decides where it
//! goes on disk. [`DirTree`] lays a seed out as:
//!
//! ```text
//! <seed>/
//!   snaps/<name>_<revision>.snap
//!   assertions/model.json
//!   assertions/snaps.json
//!   seed.toml
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{debug, info};

use crate::assertion::{Assertion, AssertionRef, RoDatabase};
use crate::model::Presence;
use crate::naming::SnapRef;

use super::seed_snap::SeedSnap;

/// Disk layout of a seed
pub trait SeedTree {
    /// Create the fixed directories, succeeding if they already exist
    fn mk_fixed_dirs(&self) -> anyhow::Result<()>;

    /// Directory store snaps are downloaded to
    fn snaps_dir(&self) -> PathBuf;

    /// Destination of a local snap copied into the seed
    fn local_snap_path(&self, snap: &SeedSnap) -> PathBuf;

    /// Persist the assertions of the model and of all seed snaps
    fn write_assertions(
        &self,
        db: &dyn RoDatabase,
        model_refs: &[AssertionRef],
        from_model: &[&SeedSnap],
        extra: &[&SeedSnap],
    ) -> anyhow::Result<()>;

    /// Persist the seed metadata
    fn write_meta(&self, from_model: &[&SeedSnap], extra: &[&SeedSnap]) -> anyhow::Result<()>;
}

/// A seed laid out under a root directory
#[derive(Debug, Clone)]
pub struct DirTree {
    root: PathBuf,
}

/// One `[[snaps]]` entry of `seed.toml`
#[derive(Debug, Serialize)]
struct MetaSnap<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    id: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    channel: &'a str,
    file: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    classic: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    unasserted: bool,
    /// Model snap with `presence = "optional"`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    optional: bool,
}

fn is_empty(s: &&str) -> bool {
    s.is_empty()
}

#[derive(Debug, Serialize)]
struct Meta<'a> {
    snaps: Vec<MetaSnap<'a>>,
}

impl DirTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn assertions_dir(&self) -> PathBuf {
        self.root.join("assertions")
    }

    fn meta_entry<'a>(&self, snap: &'a SeedSnap) -> anyhow::Result<MetaSnap<'a>> {
        let Some(info) = snap.info() else {
            bail!("snap {:?} has no info", snap.snap_name());
        };
        let snaps_dir = self.snaps_dir();
        let file = match (snap.path().parent(), snap.path().file_name()) {
            (Some(dir), Some(file)) if dir == snaps_dir => file.to_string_lossy().into_owned(),
            _ => bail!(
                "snap {:?} path {} is not in {}",
                info.name,
                snap.path().display(),
                snaps_dir.display()
            ),
        };
        let unasserted = snap.is_unasserted();
        Ok(MetaSnap {
            name: &info.name,
            id: &info.snap_id,
            channel: if unasserted { "" } else { snap.channel() },
            file,
            classic: info.needs_classic(),
            unasserted,
            optional: snap
                .model_snap()
                .is_some_and(|m| m.presence == Presence::Optional),
        })
    }
}

fn write_json(path: &Path, assertions: &[Assertion]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(assertions)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

impl SeedTree for DirTree {
    fn mk_fixed_dirs(&self) -> anyhow::Result<()> {
        for dir in [self.snaps_dir(), self.assertions_dir()] {
            if dir.exists() && !dir.is_dir() {
                bail!("{} exists but is not a directory", dir.display());
            }
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        debug!("Seed directories ready under {}", self.root.display());
        Ok(())
    }

    fn snaps_dir(&self) -> PathBuf {
        self.root.join("snaps")
    }

    fn local_snap_path(&self, snap: &SeedSnap) -> PathBuf {
        match snap.info() {
            Some(info) => self.snaps_dir().join(info.mount_file()),
            None => self.snaps_dir().join(format!("{}.snap", snap.snap_name())),
        }
    }

    fn write_assertions(
        &self,
        db: &dyn RoDatabase,
        model_refs: &[AssertionRef],
        from_model: &[&SeedSnap],
        extra: &[&SeedSnap],
    ) -> anyhow::Result<()> {
        let mut seen = HashSet::new();

        let mut model_assertions = Vec::new();
        for r in model_refs {
            if seen.insert(r.unique()) {
                model_assertions.push(db.find(r).with_context(|| format!("Failed to find {}", r))?);
            }
        }

        let mut snap_assertions = Vec::new();
        for snap in from_model.iter().chain(extra) {
            for r in snap.assertion_refs() {
                if seen.insert(r.unique()) {
                    snap_assertions
                        .push(db.find(r).with_context(|| format!("Failed to find {}", r))?);
                }
            }
        }

        let dir = self.assertions_dir();
        write_json(&dir.join("model.json"), &model_assertions)?;
        write_json(&dir.join("snaps.json"), &snap_assertions)?;
        info!(
            "Wrote {} model and {} snap assertion(s)",
            model_assertions.len(),
            snap_assertions.len()
        );
        Ok(())
    }

    fn write_meta(&self, from_model: &[&SeedSnap], extra: &[&SeedSnap]) -> anyhow::Result<()> {
        let snaps = from_model
            .iter()
            .chain(extra)
            .map(|snap| self.meta_entry(snap))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let path = self.root.join("seed.toml");
        let content = toml::to_string_pretty(&Meta { snaps }).context("Failed to encode seed metadata")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote seed metadata to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::assertion::{AssertionType, NotFoundError};
    use crate::model::ModelSnap;
    use crate::seed::seed_snap::OptionId;
    use crate::snap::{Revision, SnapInfo, SnapType};

    struct MapDb(HashMap<AssertionRef, Assertion>);

    impl RoDatabase for MapDb {
        fn find(&self, reference: &AssertionRef) -> anyhow::Result<Assertion> {
            self.0.get(reference).cloned().ok_or_else(|| {
                NotFoundError {
                    reference: reference.clone(),
                }
                .into()
            })
        }
    }

    fn store_snap(tree: &DirTree, name: &str, id: &str, rev: i32) -> SeedSnap {
        let mut info = SnapInfo::new(name, SnapType::App);
        info.snap_id = id.to_string();
        info.revision = Revision(rev);
        let mut sn = SeedSnap::from_store(name, id);
        sn.path = tree.snaps_dir().join(info.mount_file());
        sn.channel = "stable".to_string();
        sn.info = Some(info);
        sn
    }

    #[test]
    fn test_mk_fixed_dirs_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tree = DirTree::new(dir.path().join("seed"));
        tree.mk_fixed_dirs().unwrap();
        tree.mk_fixed_dirs().unwrap();
        assert!(tree.snaps_dir().is_dir());
        assert!(dir.path().join("seed/assertions").is_dir());
    }

    #[test]
    fn test_mk_fixed_dirs_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let tree = DirTree::new(dir.path());
        fs::write(dir.path().join("snaps"), "not a dir").unwrap();
        let err = tree.mk_fixed_dirs().unwrap_err();
        assert!(err.to_string().contains("is not a directory"), "{err}");
    }

    #[test]
    fn test_write_meta() {
        let dir = tempfile::tempdir().unwrap();
        let tree = DirTree::new(dir.path());
        tree.mk_fixed_dirs().unwrap();

        let core = store_snap(&tree, "core", "coreidididid", 3);
        let mut htop = store_snap(&tree, "htop", "htopidididid", 7);
        htop.model_snap = Some(ModelSnap {
            presence: Presence::Optional,
            ..ModelSnap::new("htop", SnapType::App)
        });
        let mut local = SeedSnap::from_local(Path::new("/src/hello_1.snap"), OptionId(0), "");
        local.info = Some(SnapInfo {
            revision: Revision(-1),
            ..SnapInfo::new("hello", SnapType::App)
        });
        local.path = tree.local_snap_path(&local);
        assert_eq!(local.path, tree.snaps_dir().join("hello_x1.snap"));

        tree.write_meta(&[&core, &htop], &[&local]).unwrap();
        let meta: toml::Value =
            toml::from_str(&fs::read_to_string(dir.path().join("seed.toml")).unwrap()).unwrap();
        let snaps = meta["snaps"].as_array().unwrap();
        assert_eq!(snaps.len(), 3);
        assert!(snaps[0].get("optional").is_none());
        assert_eq!(snaps[1]["optional"].as_bool(), Some(true));
        let snaps = [&snaps[0], &snaps[2]];
        assert_eq!(snaps[0]["file"].as_str(), Some("core_3.snap"));
        assert_eq!(snaps[0]["channel"].as_str(), Some("stable"));
        assert!(snaps[0].get("unasserted").is_none());
        assert_eq!(snaps[1]["unasserted"].as_bool(), Some(true));
        assert!(snaps[1].get("id").is_none());
    }

    #[test]
    fn test_write_meta_rejects_outside_path() {
        let dir = tempfile::tempdir().unwrap();
        let tree = DirTree::new(dir.path());
        let mut core = store_snap(&tree, "core", "coreidididid", 3);
        core.path = PathBuf::from("/elsewhere/core_3.snap");
        assert!(tree.write_meta(&[&core], &[]).is_err());
    }

    #[test]
    fn test_write_assertions_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let tree = DirTree::new(dir.path());
        tree.mk_fixed_dirs().unwrap();

        let account = Assertion::new(AssertionType::Account).with_header("account-id", "canonical");
        let decl = Assertion::new(AssertionType::SnapDeclaration)
            .with_header("series", "16")
            .with_header("snap-id", "coreidididid")
            .with_header("publisher-id", "canonical");
        let db = MapDb(
            [account.clone(), decl.clone()]
                .into_iter()
                .map(|a| (a.reference(), a))
                .collect(),
        );

        let mut core = store_snap(&tree, "core", "coreidididid", 3);
        core.arefs = Some(vec![account.reference(), decl.reference()]);

        tree.write_assertions(&db, &[account.reference()], &[&core], &[])
            .unwrap();

        let model: Vec<Assertion> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("assertions/model.json")).unwrap())
                .unwrap();
        let snaps: Vec<Assertion> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("assertions/snaps.json")).unwrap())
                .unwrap();
        assert_eq!(model, vec![account]);
        assert_eq!(snaps, vec![decl]);
    }

    #[test]
    fn test_write_assertions_missing() {
        let dir = tempfile::tempdir().unwrap();
        let tree = DirTree::new(dir.path());
        tree.mk_fixed_dirs().unwrap();
        let db = MapDb(HashMap::new());
        let err = tree
            .write_assertions(&db, &[AssertionRef::store("my-store")], &[], &[])
            .unwrap_err();
        assert!(err.root_cause().to_string().contains("not found"), "{err:#}");
    }
}

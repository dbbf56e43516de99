// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use conary_seed::naming::SnapRef;
use conary_seed::snap::ContentPlug;
use conary_seed::{
    Assertion, AssertionFetcher, AssertionRef, AssertionType, Confinement, Grade, Model,
    ModelSnap, NotFoundError, Revision, RoDatabase, SnapInfo, SnapType, Writer, WriterOptions,
};
use conary_seed::model::ModelHeader;
use tempfile::TempDir;

/// In-memory assertion database shared between fetcher and writer
#[derive(Default)]
pub struct MemDb {
    assertions: RwLock<HashMap<AssertionRef, Assertion>>,
}

impl MemDb {
    pub fn add(&self, assertion: Assertion) -> AssertionRef {
        let reference = assertion.reference();
        self.assertions
            .write()
            .unwrap()
            .insert(reference.clone(), assertion);
        reference
    }

    pub fn contains(&self, reference: &AssertionRef) -> bool {
        self.assertions.read().unwrap().contains_key(reference)
    }
}

impl RoDatabase for MemDb {
    fn find(&self, reference: &AssertionRef) -> anyhow::Result<Assertion> {
        self.assertions
            .read()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| {
                NotFoundError {
                    reference: reference.clone(),
                }
                .into()
            })
    }
}

/// Fetcher storing into a [`MemDb`] from a fake remote store
pub struct FakeFetcher {
    db: Arc<MemDb>,
    pub remote: HashMap<AssertionRef, Assertion>,
    pub fail_save: bool,
}

impl AssertionFetcher for FakeFetcher {
    fn save(&mut self, assertion: &Assertion) -> anyhow::Result<Vec<AssertionRef>> {
        if self.fail_save {
            anyhow::bail!("no matching public key found");
        }
        let brand = assertion.header_str("brand-id").unwrap_or("canonical");
        let account = Assertion::new(AssertionType::Account).with_header("account-id", brand);
        Ok(vec![self.db.add(account), self.db.add(assertion.clone())])
    }

    fn fetch(&mut self, reference: &AssertionRef) -> anyhow::Result<Vec<AssertionRef>> {
        let Some(assertion) = self.remote.get(reference) else {
            return Err(NotFoundError {
                reference: reference.clone(),
            }
            .into());
        };
        Ok(vec![self.db.add(assertion.clone())])
    }
}

/// A seed directory, an assertion database and a snap catalog
pub struct Fixture {
    pub dir: TempDir,
    pub db: Arc<MemDb>,
    catalog: HashMap<String, SnapInfo>,
    /// Snap declaration publishers, `canonical` when absent
    pub publishers: HashMap<String, String>,
}

fn info(name: &str, snap_type: SnapType, base: &str) -> SnapInfo {
    SnapInfo {
        snap_id: format!("{}ididididid", name.replace('-', "")),
        revision: Revision(1),
        base: base.to_string(),
        ..SnapInfo::new(name, snap_type)
    }
}

impl Fixture {
    pub fn new() -> Self {
        let mut catalog = HashMap::new();
        for snap in [
            info("snapd", SnapType::Snapd, ""),
            info("core", SnapType::Os, ""),
            info("core18", SnapType::Base, ""),
            info("core20", SnapType::Base, ""),
            info("pc", SnapType::Gadget, "core18"),
            info("pc-kernel", SnapType::Kernel, ""),
            info("htop", SnapType::App, "core18"),
            info("hello", SnapType::App, "core18"),
            info("provider", SnapType::App, "core18"),
            SnapInfo {
                confinement: Confinement::Classic,
                ..info("classic-tool", SnapType::App, "core18")
            },
            SnapInfo {
                confinement: Confinement::Devmode,
                ..info("dev-tool", SnapType::App, "core18")
            },
            SnapInfo {
                content_plugs: vec![ContentPlug {
                    name: "themes".to_string(),
                    default_provider: Some("provider:themes".to_string()),
                }],
                ..info("consumer", SnapType::App, "core18")
            },
        ] {
            catalog.insert(snap.name.clone(), snap);
        }

        Self {
            dir: tempfile::tempdir().unwrap(),
            db: Arc::new(MemDb::default()),
            catalog,
            publishers: HashMap::new(),
        }
    }

    /// Replace a catalog entry
    pub fn set_snap(&mut self, name: &str, snap_type: SnapType, base: &str) {
        self.catalog
            .insert(name.to_string(), info(name, snap_type, base));
    }

    pub fn info(&self, name: &str) -> SnapInfo {
        self.catalog
            .get(name)
            .cloned()
            .unwrap_or_else(|| info(name, SnapType::App, "core18"))
    }

    pub fn seed_dir(&self) -> PathBuf {
        self.dir.path().join("seed")
    }

    pub fn opts(&self) -> WriterOptions {
        WriterOptions::new(self.seed_dir())
    }

    pub fn fetcher(&self) -> FakeFetcher {
        FakeFetcher {
            db: self.db.clone(),
            remote: HashMap::new(),
            fail_save: false,
        }
    }

    /// Write a fake snap file outside the seed
    pub fn local_snap_file(&self, file_name: &str) -> PathBuf {
        let dir = self.dir.path().join("local");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        fs::write(&path, b"local snap").unwrap();
        path
    }

    /// Add the snap declaration of a snap to the database
    pub fn add_decl(&self, info: &SnapInfo) -> AssertionRef {
        let publisher = self
            .publishers
            .get(&info.name)
            .map(String::as_str)
            .unwrap_or("canonical");
        self.db.add(
            Assertion::new(AssertionType::SnapDeclaration)
                .with_header("series", "16")
                .with_header("snap-id", info.snap_id.as_str())
                .with_header("snap-name", info.name.as_str())
                .with_header("publisher-id", publisher),
        )
    }

    /// Play one download round, returning the names downloaded
    pub fn download_round(
        &self,
        w: &mut Writer,
        with_assertions: bool,
    ) -> conary_seed::Result<Vec<String>> {
        let mut names = Vec::new();
        for id in w.snaps_to_download()? {
            let name = w.seed_snap(id).unwrap().snap_name().to_string();
            let info = self.info(&name);
            if with_assertions {
                w.set_assertion_refs(id, vec![self.add_decl(&info)])?;
            }
            w.set_info(id, info)?;
            fs::write(w.seed_snap(id).unwrap().path(), b"store snap")?;
            names.push(name);
        }
        Ok(names)
    }

    /// Play download rounds until the writer reports completion
    pub fn download_all(&self, w: &mut Writer) -> conary_seed::Result<Vec<Vec<String>>> {
        let mut rounds = Vec::new();
        loop {
            rounds.push(self.download_round(w, true)?);
            if w.downloaded()? {
                return Ok(rounds);
            }
        }
    }
}

pub fn model(snaps: Vec<ModelSnap>) -> Model {
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

/// pc on core18, with a pinned kernel track
pub fn core18_model() -> Model {
    model(vec![
        ModelSnap::new("pc", SnapType::Gadget).with_default_channel("18"),
        ModelSnap::new("pc-kernel", SnapType::Kernel).with_pinned_track("18"),
        ModelSnap::new("core18", SnapType::Base),
    ])
}

/// pc on core20 with a grade
pub fn core20_model(grade: Grade) -> Model {
    let mut m = model(vec![
        ModelSnap::new("pc", SnapType::Gadget),
        ModelSnap::new("pc-kernel", SnapType::Kernel),
        ModelSnap::new("core20", SnapType::Base),
    ]);
    m.header.grade = Some(grade);
    m
}

pub fn classic_model() -> Model {
    let mut m = model(Vec::new());
    m.header.classic = true;
    m
}

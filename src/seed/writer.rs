// src/seed/writer.rs

//! The seed writer
//!
//! A [`Writer`] resolves which snaps make up a seed and validates what the
//! driving program obtained for them. It never downloads or copies anything
//! itself: the driving program calls it in the order described in
//! [`crate::seed::step`], doing the slow work between calls.
//!
//! ```text
//! let mut w = Writer::new(model, opts)?;
//! w.set_options_snaps(option_snaps)?;
//! let mut fetcher = w.start(db, fetcher)?;
//! for id in w.local_snaps()? {
//!     // read the info from the snap file at the seed snap's path
//!     w.set_info(id, info)?;
//! }
//! w.info_derived()?;
//! loop {
//!     for id in w.snaps_to_download()? {
//!         // fetch info, set_info, download to the seed snap's path,
//!         // fetch assertions, set_assertion_refs
//!     }
//!     if w.downloaded()? {
//!         break;
//!     }
//! }
//! w.seed_snaps(copy)?;
//! w.write_meta()?;
//! ```
//!
//! Snaps are resolved in up to four rounds: the model's snaps, snaps the
//! policy requires on top of them, extra snaps from the options, and snaps
//! the policy requires on top of the extra ones.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::assertion::{
    AssertionFetcher, AssertionRef, AssertionType, NotFoundError, RefAssertsFetcher, RoDatabase,
};
use crate::channel::{self, Channel, ChannelError};
use crate::error::{Error, Result};
use crate::model::{Model, ModelSnap};
use crate::naming::{same_snap, split_instance_name, validate_snap_name, Snap, SnapRef, SnapSet};
use crate::snap::{Revision, SnapInfo, SnapType};

use super::options::{OptionsSnap, WriterOptions};
use super::policy::{self, Policy};
use super::seed_snap::{OptionId, SeedId, SeedSnap};
use super::step::{Step, StepMachine};
use super::tree::{DirTree, SeedTree};
use super::warnings::Warnings;

/// Publisher trusted for kernel and gadget snaps of any brand
pub const TRUSTED_PUBLISHER: &str = "canonical";

/// Which snaps the next `snaps_to_download` computes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownloadSet {
    Model,
    Implicit,
    Extra,
    ExtraImplicit,
}

/// Where an extra snap comes from
enum ExtraSource {
    FromOption(OptionId),
    Implicit(OptionsSnap),
}

/// Writes seeds for a model
pub struct Writer {
    model: Model,
    opts: WriterOptions,
    policy: Box<dyn Policy>,
    tree: Box<dyn SeedTree>,

    warnings: Warnings,

    db: Option<Arc<dyn RoDatabase>>,

    steps: StepMachine,

    model_refs: Vec<AssertionRef>,

    options_snaps: Vec<OptionsSnap>,
    /// Options matched to a model snap or merged into a local snap
    consumed: BTreeSet<OptionId>,
    /// Named options that turned out to name a local snap
    merged_into_local: BTreeSet<OptionId>,
    extra_snaps_guess: usize,

    by_name_opt_snaps: SnapSet<OptionId>,

    local_snaps: BTreeMap<OptionId, SeedId>,
    by_ref_local_snaps: SnapSet<SeedId>,

    available: SnapSet<SeedId>,

    to_download: DownloadSet,
    /// Snaps of the current round
    considered: Vec<SeedId>,

    seeds: Vec<SeedSnap>,
    snaps_from_model: Vec<SeedId>,
    extra_snaps: Vec<SeedId>,
}

impl Writer {
    /// Create a writer laying the seed out under `opts.seed_dir`
    pub fn new(model: Model, opts: WriterOptions) -> Result<Self> {
        let tree = Box::new(DirTree::new(&opts.seed_dir));
        Self::with_tree(model, opts, tree)
    }

    /// Create a writer with a custom seed layout
    pub fn with_tree(model: Model, opts: WriterOptions, tree: Box<dyn SeedTree>) -> Result<Self> {
        model.validate()?;
        let policy = policy::for_model(&model);

        if !opts.default_channel.is_empty() {
            let channel = Channel::parse_verbatim(&opts.default_channel).map_err(|source| {
                Error::InvalidChannel {
                    what: "global default option channel".to_string(),
                    source,
                }
            })?;
            policy.check_default_channel(&channel)?;
        }

        info!(
            "Seed writer for model {}/{} using {} policy",
            model.brand_id(),
            model.model_name(),
            policy.name()
        );

        Ok(Self {
            model,
            opts,
            policy,
            tree,
            warnings: Warnings::default(),
            db: None,
            steps: StepMachine::new(),
            model_refs: Vec::new(),
            options_snaps: Vec::new(),
            consumed: BTreeSet::new(),
            merged_into_local: BTreeSet::new(),
            extra_snaps_guess: 0,
            by_name_opt_snaps: SnapSet::new(),
            local_snaps: BTreeMap::new(),
            by_ref_local_snaps: SnapSet::new(),
            available: SnapSet::new(),
            to_download: DownloadSet::Model,
            considered: Vec::new(),
            seeds: Vec::new(),
            snaps_from_model: Vec::new(),
            extra_snaps: Vec::new(),
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Warnings produced so far
    ///
    /// No warnings are produced after `downloaded` signaled completion.
    pub fn warnings(&self) -> &[String] {
        self.warnings.messages()
    }

    /// The seed snap behind a handle
    pub fn seed_snap(&self, id: SeedId) -> Option<&SeedSnap> {
        self.seeds.get(id.0)
    }

    /// Run a protocol step, poisoning the writer if it fails after being
    /// accepted
    fn step<T>(&mut self, step: Step, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let has_local_snaps = !self.local_snaps.is_empty();
        self.steps.enter(step, has_local_snaps)?;
        let res = f(self);
        if res.is_err() {
            debug!("Seed writer step {} failed", step);
            self.steps.fail(step);
        }
        res
    }

    fn push_seed(&mut self, snap: SeedSnap) -> SeedId {
        self.seeds.push(snap);
        SeedId(self.seeds.len() - 1)
    }

    fn seed_mut(&mut self, id: SeedId) -> Result<&mut SeedSnap> {
        if self.steps.expected() >= Step::SeedSnaps {
            return Err(Error::Protocol(
                "seed snaps cannot be modified after Downloaded signaled complete".to_string(),
            ));
        }
        self.seeds
            .get_mut(id.0)
            .ok_or_else(|| Error::Internal(format!("unknown seed snap {}", id.0)))
    }

    /// Register the option snaps
    ///
    /// Options are validated eagerly; local snap files must exist.
    pub fn set_options_snaps(&mut self, snaps: Vec<OptionsSnap>) -> Result<()> {
        self.step(Step::SetOptionsSnaps, |w| w.register_options(snaps))
    }

    fn register_options(&mut self, snaps: Vec<OptionsSnap>) -> Result<()> {
        for (idx, sn) in snaps.iter().enumerate() {
            let id = OptionId(idx);
            let which_snap = sn.describe();
            let mut local_path = None;

            if !sn.name.is_empty() {
                if sn.path.is_some() {
                    return Err(Error::InvalidOption(format!(
                        "cannot specify both name and path for option snap {:?}",
                        sn.name
                    )));
                }
                let (_, instance_key) = split_instance_name(&sn.name);
                if !instance_key.is_empty() {
                    return Err(Error::InvalidOption(format!(
                        "cannot use snap {:?}, parallel snap instances are unsupported",
                        sn.name
                    )));
                }
                validate_snap_name(&sn.name).map_err(|e| Error::InvalidOption(e.to_string()))?;
                if !self.by_name_opt_snaps.add(sn, id) {
                    return Err(Error::InvalidOption(format!(
                        "snap {:?} is repeated in options",
                        sn.name
                    )));
                }
            } else {
                let Some(path) = &sn.path else {
                    return Err(Error::InvalidOption(
                        "option snap has neither name nor path".to_string(),
                    ));
                };
                if !path.to_string_lossy().ends_with(".snap") {
                    return Err(Error::InvalidOption(format!(
                        "local option snap {:?} does not end in .snap",
                        which_snap
                    )));
                }
                if !path.exists() {
                    return Err(Error::InvalidOption(format!(
                        "local option snap {:?} does not exist",
                        which_snap
                    )));
                }
                local_path = Some(path);
            }

            if !sn.channel.is_empty() {
                let channel = Channel::parse_verbatim(&sn.channel).map_err(|source| {
                    Error::InvalidChannel {
                        what: format!("option channel for snap {:?}", which_snap),
                        source,
                    }
                })?;
                self.policy.check_snap_channel(&channel, &which_snap)?;
            }

            if let Some(path) = local_path {
                self.policy.allows_dangerous_features()?;
                let seed = self.push_seed(SeedSnap::from_local(path, id, &sn.channel));
                self.local_snaps.insert(id, seed);
            }
        }

        debug!(
            "Registered {} option snap(s), {} local",
            snaps.len(),
            self.local_snaps.len()
        );
        self.options_snaps = snaps;
        Ok(())
    }

    /// Start writing the seed
    ///
    /// Saves the model assertion and fetches the device store assertion
    /// through `fetcher`, then creates the seed directories. The assertions
    /// end up in `db`, which the writer later reads snap declarations from.
    /// The wrapping fetcher is returned for fetching snap assertions.
    pub fn start<F: AssertionFetcher>(
        &mut self,
        db: Arc<dyn RoDatabase>,
        fetcher: F,
    ) -> Result<RefAssertsFetcher<F>> {
        self.step(Step::Start, |w| w.start_fetching(db, fetcher))
    }

    fn start_fetching<F: AssertionFetcher>(
        &mut self,
        db: Arc<dyn RoDatabase>,
        fetcher: F,
    ) -> Result<RefAssertsFetcher<F>> {
        self.db = Some(db);
        let mut f = RefAssertsFetcher::new(fetcher);

        const MSG: &str = "cannot fetch and check prerequisites for the model assertion";
        let model_assertion = self.model.assertion()?;
        if let Err(e) = f.save(&model_assertion) {
            if !self.opts.test_skip_copy_unverified_model {
                return Err(Error::collaborator(MSG, e));
            }
            self.warnings.push(format!("{}: {:#}", MSG, e));
            f.reset_refs();
        }

        if let Some(store) = self.model.store() {
            if let Err(e) = f.fetch(&AssertionRef::store(store)) {
                let store_missing = e
                    .downcast_ref::<NotFoundError>()
                    .is_some_and(|nf| nf.reference.kind == AssertionType::Store);
                if !store_missing {
                    return Err(Error::collaborator("cannot fetch store assertion", e));
                }
                debug!("No store assertion for {}, continuing", store);
            }
        }

        self.model_refs = f.refs().to_vec();

        self.tree
            .mk_fixed_dirs()
            .map_err(|e| Error::collaborator("cannot create seed directories", e))?;

        info!(
            "Started seed with {} model assertion reference(s)",
            self.model_refs.len()
        );
        Ok(f)
    }

    /// The local snaps, in option order
    ///
    /// Their info must be set, derived from the files at their paths,
    /// before calling `info_derived`.
    pub fn local_snaps(&mut self) -> Result<Vec<SeedId>> {
        self.step(Step::LocalSnaps, |w| Ok(w.local_snaps.values().copied().collect()))
    }

    /// Check the local snaps' info, matching them with named options
    pub fn info_derived(&mut self) -> Result<()> {
        self.step(Step::InfoDerived, |w| w.derive_local_snaps())
    }

    fn derive_local_snaps(&mut self) -> Result<()> {
        let locals: Vec<(OptionId, SeedId)> =
            self.local_snaps.iter().map(|(&o, &s)| (o, s)).collect();

        for (option, id) in locals {
            let sn = &mut self.seeds[id.0];
            let Some(info) = sn.info.as_mut() else {
                return Err(Error::Internal(format!(
                    "before InfoDerived snap {:?} info should have been set",
                    sn.path.display().to_string()
                )));
            };
            if info.revision.is_unset() {
                info.revision = Revision(-1);
            }

            let sn = &self.seeds[id.0];
            if self.by_ref_local_snaps.contains(sn) {
                return Err(Error::InvalidOption(format!(
                    "local snap {:?} is repeated in options",
                    sn.snap_name()
                )));
            }

            if let Some(&named) = self.by_name_opt_snaps.lookup(sn) {
                self.consumed.insert(named);
                self.merged_into_local.insert(named);

                let named_channel = &self.options_snaps[named.0].channel;
                if !named_channel.is_empty() {
                    if sn.option_channel.is_empty() {
                        let named_channel = named_channel.clone();
                        self.seeds[id.0].option_channel = named_channel;
                    } else if &sn.option_channel != named_channel {
                        return Err(Error::InvalidOption(format!(
                            "option snap has different channels specified: {:?}={:?} vs {:?}={:?}",
                            sn.path.display().to_string(),
                            sn.option_channel,
                            self.options_snaps[named.0].name,
                            named_channel
                        )));
                    }
                }
            }

            let sn = &self.seeds[id.0];
            self.by_ref_local_snaps.add(sn, id);
            debug!(
                "Local snap {} from option {}",
                sn.snap_name(),
                option.index()
            );
        }
        Ok(())
    }

    /// Set the info of a seed snap
    ///
    /// For store snaps this also sets the download destination.
    pub fn set_info(&mut self, id: SeedId, info: SnapInfo) -> Result<()> {
        let snaps_dir = self.tree.snaps_dir();
        let sn = self.seed_mut(id)?;
        if !sn.local {
            sn.path = snaps_dir.join(info.mount_file());
        }
        sn.info = Some(info);
        Ok(())
    }

    /// Set the references of a seed snap's assertions
    ///
    /// The assertions must be in the database given to `start`.
    pub fn set_assertion_refs(&mut self, id: SeedId, refs: Vec<AssertionRef>) -> Result<()> {
        self.seed_mut(id)?.arefs = Some(refs);
        Ok(())
    }

    /// Override where a seed snap is
    pub fn set_path(&mut self, id: SeedId, path: impl Into<PathBuf>) -> Result<()> {
        self.seed_mut(id)?.path = path.into();
        Ok(())
    }

    /// The snaps to download for the current round
    ///
    /// Local snaps of the round are not included.
    pub fn snaps_to_download(&mut self) -> Result<Vec<SeedId>> {
        self.step(Step::SnapsToDownload, |w| {
            let to_download = match w.to_download {
                DownloadSet::Model => {
                    let snaps = w.mod_snaps();
                    w.model_snaps_to_download(snaps)?
                }
                DownloadSet::Implicit => {
                    let snaps = w.policy.implicit_snaps(&w.available);
                    w.model_snaps_to_download(snaps)?
                }
                DownloadSet::Extra => {
                    let extra = w.opt_extra_snaps();
                    if !extra.is_empty() {
                        w.policy.allows_dangerous_features()?;
                    }
                    w.extra_snaps_to_download(extra.into_iter().map(ExtraSource::FromOption).collect())?
                }
                DownloadSet::ExtraImplicit => {
                    let extra = w.policy.implicit_extra_snaps(&w.available);
                    w.extra_snaps_to_download(extra.into_iter().map(ExtraSource::Implicit).collect())?
                }
            };
            info!(
                "Round {:?}: {} snap(s) considered, {} to download",
                w.to_download,
                w.considered.len(),
                to_download.len()
            );
            Ok(to_download)
        })
    }

    /// Model snaps with the system snap first if the model omits it
    fn mod_snaps(&self) -> Vec<ModelSnap> {
        let mut snaps: Vec<ModelSnap> = self.model.all_snaps().into_iter().cloned().collect();
        if let Some(system) = self.policy.system_snap() {
            if !snaps.iter().any(|s| same_snap(s, &system)) {
                snaps.insert(0, system);
            }
        }
        snaps
    }

    fn model_snaps_to_download(&mut self, snaps: Vec<ModelSnap>) -> Result<Vec<SeedId>> {
        self.considered.clear();
        let mut to_download = Vec::with_capacity(snaps.len());
        for model_snap in snaps {
            let id = self.model_snap_to_seed(model_snap)?;
            let sn = &self.seeds[id.0];
            if !sn.local {
                to_download.push(id);
            }
            if let Some(option) = sn.option_snap {
                self.consumed.insert(option);
            }
            self.snaps_from_model.push(id);
            self.considered.push(id);
        }
        self.extra_snaps_guess = self.options_snaps.len().saturating_sub(self.consumed.len());
        Ok(to_download)
    }

    fn model_snap_to_seed(&mut self, model_snap: ModelSnap) -> Result<SeedId> {
        let (id, option_channel) = match self.by_ref_local_snaps.lookup(&model_snap) {
            Some(&id) => (id, self.seeds[id.0].option_channel.clone()),
            None => {
                let option = self.by_name_opt_snaps.lookup(&model_snap).copied();
                let option_channel = option
                    .map(|o| self.options_snaps[o.0].channel.clone())
                    .unwrap_or_default();
                let mut sn = SeedSnap::from_store(&model_snap.name, &model_snap.snap_id);
                sn.option_snap = option;
                (self.push_seed(sn), option_channel)
            }
        };

        let channel = self.resolve_channel(&model_snap.name, Some(&model_snap), &option_channel)?;
        debug!("Model snap {} resolved to channel {:?}", model_snap.name, channel);
        let sn = &mut self.seeds[id.0];
        sn.channel = channel;
        sn.model_snap = Some(model_snap);
        Ok(id)
    }

    /// Options not yet resolved by the model rounds
    fn opt_extra_snaps(&self) -> Vec<OptionId> {
        (0..self.options_snaps.len())
            .map(OptionId)
            .filter(|option| !self.merged_into_local.contains(option))
            .filter(|option| {
                let available = match self.local_snaps.get(option) {
                    Some(id) => self.available.contains(&self.seeds[id.0]),
                    None => self.available.contains(&self.options_snaps[option.0]),
                };
                !available
            })
            .collect()
    }

    fn extra_snaps_to_download(&mut self, extra: Vec<ExtraSource>) -> Result<Vec<SeedId>> {
        self.considered.clear();
        let mut to_download = Vec::with_capacity(extra.len());
        for source in extra {
            let id = self.extra_snap_to_seed(source)?;
            if !self.seeds[id.0].local {
                to_download.push(id);
            }
            self.extra_snaps.push(id);
            self.considered.push(id);
        }
        Ok(to_download)
    }

    fn extra_snap_to_seed(&mut self, source: ExtraSource) -> Result<SeedId> {
        let (id, option_channel) = match source {
            ExtraSource::FromOption(option) => match self.local_snaps.get(&option) {
                Some(&id) => (id, self.seeds[id.0].option_channel.clone()),
                None => {
                    let opt = &self.options_snaps[option.0];
                    let option_channel = opt.channel.clone();
                    let mut sn = SeedSnap::from_store(&opt.name, &opt.snap_id);
                    sn.option_snap = Some(option);
                    (self.push_seed(sn), option_channel)
                }
            },
            ExtraSource::Implicit(opt) => {
                let sn = SeedSnap::from_store(&opt.name, &opt.snap_id);
                (self.push_seed(sn), opt.channel)
            }
        };

        let name = self.seeds[id.0].snap_name().to_string();
        if name.is_empty() {
            return Err(Error::Internal(format!(
                "extra snap {} has no associated name",
                id.0
            )));
        }
        let channel = self.resolve_channel(&name, None, &option_channel)?;
        debug!("Extra snap {} resolved to channel {:?}", name, channel);
        self.seeds[id.0].channel = channel;
        Ok(id)
    }

    fn resolve_channel(
        &self,
        which_snap: &str,
        model_snap: Option<&ModelSnap>,
        option_channel: &str,
    ) -> Result<String> {
        let option_channel = if option_channel.is_empty() {
            self.opts.default_channel.as_str()
        } else {
            option_channel
        };

        if let Some(model_snap) = model_snap.filter(|m| !m.pinned_track.is_empty()) {
            let track = &model_snap.pinned_track;
            return match channel::resolve_pinned(track, option_channel) {
                Ok(resolved) => Ok(resolved),
                Err(ChannelError::PinnedTrackSwitch { .. }) => Err(Error::PinnedTrackMismatch {
                    channel: option_channel.to_string(),
                    snap: self.model.describe_snap(model_snap),
                    track: track.clone(),
                }),
                Err(e) => Err(Error::Internal(format!(
                    "cannot resolve pinned track {:?} and option channel {:?} for snap {:?}: {}",
                    track, option_channel, which_snap, e
                ))),
            };
        }

        let default_channel = match model_snap {
            Some(m) if !m.default_channel.is_empty() => m.default_channel.as_str(),
            Some(_) => self.policy.model_snap_default_channel(),
            None => self.policy.extra_snap_default_channel(),
        };

        channel::resolve(default_channel, option_channel).map_err(|e| {
            Error::Internal(format!(
                "cannot resolve default channel {:?} and option channel {:?} for snap {:?}: {}",
                default_channel, option_channel, which_snap, e
            ))
        })
    }

    /// Check the snaps of the current round
    ///
    /// Returns whether the seed snap set is complete; otherwise
    /// `snaps_to_download` must be called again for the next round.
    pub fn downloaded(&mut self) -> Result<bool> {
        self.step(Step::Downloaded, |w| {
            let batch = std::mem::take(&mut w.considered);
            w.check_batch(&batch)?;

            let next = match w.to_download {
                DownloadSet::Model => {
                    if w.policy.needs_implicit_snaps(&w.available, &mut w.warnings)? {
                        Some(DownloadSet::Implicit)
                    } else if w.extra_snaps_guess > 0 {
                        Some(DownloadSet::Extra)
                    } else {
                        None
                    }
                }
                DownloadSet::Implicit => (w.extra_snaps_guess > 0).then_some(DownloadSet::Extra),
                DownloadSet::Extra => w
                    .policy
                    .needs_implicit_snaps(&w.available, &mut w.warnings)?
                    .then_some(DownloadSet::ExtraImplicit),
                DownloadSet::ExtraImplicit => None,
            };

            match next {
                Some(set) => {
                    debug!("Round {:?} done, next {:?}", w.to_download, set);
                    w.to_download = set;
                    w.steps.loop_back();
                    Ok(false)
                }
                None => {
                    w.warnings.seal();
                    info!(
                        "Seed snap set complete: {} from model, {} extra",
                        w.snaps_from_model.len(),
                        w.extra_snaps.len()
                    );
                    Ok(true)
                }
            }
        })
    }

    fn check_batch(&mut self, batch: &[SeedId]) -> Result<()> {
        for &id in batch {
            let sn = &self.seeds[id.0];
            if sn.info.is_none() {
                return Err(Error::Internal(format!(
                    "before Downloaded snap {:?} info should have been set",
                    sn.snap_name()
                )));
            }
            if !self.available.add(sn, id) {
                return Err(Error::DuplicateSnap(sn.snap_name().to_string()));
            }
        }

        for &id in batch {
            self.check_snap(id)?;
            self.check_publisher(id)?;
        }
        Ok(())
    }

    fn check_snap(&mut self, id: SeedId) -> Result<()> {
        let sn = &self.seeds[id.0];
        let Some(info) = &sn.info else {
            return Err(Error::Internal(format!(
                "snap {:?} lost its info",
                sn.snap_name()
            )));
        };
        let name = info.name.as_str();

        if !sn.local && info.snap_id.is_empty() {
            return Err(Error::Internal(format!(
                "before Downloaded snap {:?} snap-id should have been set",
                name
            )));
        }
        if !info.snap_id.is_empty()
            && !sn.has_assertion_refs()
            && !self.opts.test_skip_copy_unverified_model
        {
            return Err(Error::Internal(format!(
                "before Downloaded snap {:?} assertion references should have been set",
                name
            )));
        }

        if let Some(model_snap) = &sn.model_snap {
            let expected = match model_snap.snap_type {
                SnapType::App => matches!(info.snap_type, SnapType::App | SnapType::Base),
                declared => info.snap_type == declared,
            };
            if !expected {
                return Err(Error::UnexpectedType {
                    snap: self.model.describe_snap(model_snap),
                    actual: info.snap_type,
                });
            }
        }

        if info.needs_classic() && !self.model.classic() {
            return Err(Error::Confinement(format!(
                "cannot use classic snap {:?} in a core system",
                name
            )));
        }
        if info.needs_devmode() && self.policy.allows_dangerous_features().is_err() {
            return Err(Error::Confinement(format!(
                "cannot use devmode snap {:?} with a model of grade higher than dangerous",
                name
            )));
        }

        self.policy.check_base(info, &self.available)?;

        for provider in info.needed_default_providers() {
            if !self.available.contains(&Snap::named(provider)) {
                return Err(Error::MissingDefaultProvider {
                    snap: name.to_string(),
                    provider: provider.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_publisher(&mut self, id: SeedId) -> Result<()> {
        let sn = &self.seeds[id.0];
        let Some(info) = &sn.info else {
            return Ok(());
        };
        let kind = info.snap_type;
        if !matches!(kind, SnapType::Kernel | SnapType::Gadget) {
            return Ok(());
        }
        if sn.local && sn.arefs.is_none() {
            return Ok(());
        }
        if !sn.has_assertion_refs() && self.opts.test_skip_copy_unverified_model {
            let msg = format!(
                "cannot check the publisher of {} {:?} without its assertions",
                kind, info.name
            );
            self.warnings.push(msg);
            return Ok(());
        }

        let Some(decl_ref) = sn
            .assertion_refs()
            .iter()
            .find(|r| r.kind == AssertionType::SnapDeclaration)
        else {
            return Err(Error::Internal(format!(
                "snap {:?} has no snap-declaration set",
                info.name
            )));
        };
        let db = self
            .db
            .as_ref()
            .ok_or_else(|| Error::Internal("assertion database not set".to_string()))?;
        let decl = db
            .find(decl_ref)
            .map_err(|e| Error::collaborator("cannot find saved snap declaration", e))?;
        let publisher = decl.publisher_id().ok_or_else(|| {
            Error::Internal(format!("snap declaration {} has no publisher", decl_ref))
        })?;

        let brand = self.model.brand_id();
        if publisher != brand && publisher != TRUSTED_PUBLISHER {
            return Err(Error::PublisherMismatch {
                kind,
                snap: info.name.clone(),
                publisher: publisher.to_string(),
                brand: brand.to_string(),
            });
        }
        Ok(())
    }

    /// Check the downloaded snaps and copy local snaps into the seed
    ///
    /// `copy` gets the snap name, source and destination path.
    pub fn seed_snaps<C>(&mut self, copy: C) -> Result<()>
    where
        C: FnMut(&str, &Path, &Path) -> anyhow::Result<()>,
    {
        self.step(Step::SeedSnaps, |w| w.copy_snaps(copy))
    }

    fn copy_snaps<C>(&mut self, mut copy: C) -> Result<()>
    where
        C: FnMut(&str, &Path, &Path) -> anyhow::Result<()>,
    {
        let snaps_dir = self.tree.snaps_dir();
        let ids: Vec<SeedId> = self
            .snaps_from_model
            .iter()
            .chain(&self.extra_snaps)
            .copied()
            .collect();

        for id in ids {
            let sn = &self.seeds[id.0];
            let Some(info) = &sn.info else {
                return Err(Error::Internal(format!(
                    "snap {:?} has no info",
                    sn.snap_name()
                )));
            };
            if !sn.local {
                let expected = snaps_dir.join(info.mount_file());
                if sn.path != expected {
                    return Err(Error::Internal(format!(
                        "before SeedSnaps snap {:?} path should have been set to {:?}",
                        info.name,
                        expected.display().to_string()
                    )));
                }
                if !expected.exists() {
                    return Err(Error::Internal(format!(
                        "before SeedSnaps snap file {:?} should exist",
                        expected.display().to_string()
                    )));
                }
            } else {
                let dst = self.tree.local_snap_path(sn);
                copy(&info.name, &sn.path, &dst)
                    .map_err(|e| Error::collaborator("cannot copy local snap", e))?;
                debug!("Copied local snap {} to {}", info.name, dst.display());
                self.seeds[id.0].path = dst;
            }
        }
        Ok(())
    }

    /// Write the seed assertions and metadata
    pub fn write_meta(&mut self) -> Result<()> {
        self.step(Step::WriteMeta, |w| {
            let db = w
                .db
                .clone()
                .ok_or_else(|| Error::Internal("assertion database not set".to_string()))?;
            let from_model = w.collect(&w.snaps_from_model);
            let extra = w.collect(&w.extra_snaps);

            w.tree
                .write_assertions(&*db, &w.model_refs, &from_model, &extra)
                .map_err(|e| Error::collaborator("cannot write seed assertions", e))?;
            w.tree
                .write_meta(&from_model, &extra)
                .map_err(|e| Error::collaborator("cannot write seed metadata", e))?;
            info!("Seed written to {}", w.opts.seed_dir.display());
            Ok(())
        })
    }

    fn collect(&self, ids: &[SeedId]) -> Vec<&SeedSnap> {
        ids.iter().map(|id| &self.seeds[id.0]).collect()
    }

    fn check_snaps_accessor(&self) -> Result<()> {
        if self.steps.expected() < Step::SeedSnaps || self.steps.is_failed() {
            return Err(Error::Protocol(
                "cannot query seed snaps before Downloaded signaled complete".to_string(),
            ));
        }
        Ok(())
    }

    /// Seed snaps from the model and the policy's model round, in order
    pub fn snaps_from_model(&self) -> Result<Vec<&SeedSnap>> {
        self.check_snaps_accessor()?;
        Ok(self.collect(&self.snaps_from_model))
    }

    /// Extra seed snaps, in order
    pub fn extra_snaps(&self) -> Result<Vec<&SeedSnap>> {
        self.check_snaps_accessor()?;
        Ok(self.collect(&self.extra_snaps))
    }

    /// The seed snaps participating in boot
    ///
    /// Model snaps up to and including the gadget. Classic models have none.
    pub fn boot_snaps(&self) -> Result<Vec<&SeedSnap>> {
        self.check_snaps_accessor()?;
        if self.model.classic() {
            return Err(Error::Unsupported(
                "no snaps participating in boot on classic".to_string(),
            ));
        }
        let mut boot = Vec::new();
        for sn in self.collect(&self.snaps_from_model) {
            boot.push(sn);
            if sn.info().is_some_and(|info| info.snap_type == SnapType::Gadget) {
                break;
            }
        }
        Ok(boot)
    }

    /// References to all seed snaps without store identity
    pub fn unasserted_snaps(&self) -> Result<Vec<Snap>> {
        self.check_snaps_accessor()?;
        Ok(self
            .snaps_from_model
            .iter()
            .chain(&self.extra_snaps)
            .map(|id| &self.seeds[id.0])
            .filter(|sn| sn.is_unasserted())
            .map(|sn| Snap::with_id(sn.snap_name(), sn.id()))
            .collect())
    }
}

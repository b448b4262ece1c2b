//! The build context: single source of truth for what exists across builds.
//!
//! The context owns the persistent registry of source units and artifacts,
//! classifies registered units as needing processing, deletes artifacts
//! whose owning unit vanished from the current build, and answers dependency
//! queries through the capability/requirement index. The scheduler drives it
//! through the per-unit registration steps; nothing else mutates persisted
//! capability or requirement state.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use kiln_common::{Fingerprint, NameTable};
use kiln_store::{ArtifactRecord, BuildManifest, OutputStore, StoreError, UnitRecord};

use crate::artifact::{Artifact, ArtifactState};
use crate::cap::Cap;
use crate::error::BuildError;
use crate::index::DepIndex;
use crate::options::BuildOptions;
use crate::report::BuildWarning;
use crate::unit::{SourceUnit, UnitOutcome, UnitState};

/// One source unit as seen by the external change detection: its identity
/// and its current modification fingerprint.
#[derive(Debug, Clone)]
pub struct UnitStamp {
    /// Identity path of the unit.
    pub unit: PathBuf,
    /// Fingerprint of the unit's current content.
    pub fingerprint: Fingerprint,
}

/// A configured set of source units presented to one build.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    /// Stamped units in this set.
    pub units: Vec<UnitStamp>,
}

impl SourceSet {
    /// Creates an empty source set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stamped unit to the set.
    pub fn push(&mut self, unit: impl Into<PathBuf>, fingerprint: Fingerprint) {
        self.units.push(UnitStamp {
            unit: unit.into(),
            fingerprint,
        });
    }
}

/// An artifact removed from the build, with the capabilities it held right
/// before deletion so the scheduler can enqueue its dependents.
#[derive(Debug)]
pub struct RetiredArtifact {
    /// Destination path of the removed artifact.
    pub artifact: PathBuf,
    /// Capabilities the artifact held as of its last registration.
    pub capabilities: Vec<Cap>,
}

/// Cross-build registry of source units and artifacts.
pub struct BuildContext {
    state_dir: PathBuf,
    outputs: OutputStore,
    names: NameTable,
    engine_version: String,
    units: HashMap<PathBuf, SourceUnit>,
    artifacts: HashMap<PathBuf, Artifact>,
    index: DepIndex,
    registered: HashSet<PathBuf>,
}

impl BuildContext {
    /// Loads persisted state from the options' state directory, or starts
    /// fresh if no compatible snapshot exists.
    ///
    /// A missing, corrupt, or version-incompatible snapshot yields fresh
    /// state (full rebuild). An I/O failure reading an existing snapshot is
    /// fatal: the build must not run on state it could not read.
    pub fn load_or_create(options: &BuildOptions, engine_version: &str) -> Result<Self, BuildError> {
        let manifest = BuildManifest::load(&options.state_dir)?
            .filter(|m| m.is_compatible(engine_version))
            .unwrap_or_else(|| BuildManifest::new(engine_version));

        let mut ctx = Self {
            state_dir: options.state_dir.clone(),
            outputs: OutputStore::new(&options.output_dir),
            names: NameTable::new(),
            engine_version: engine_version.to_string(),
            units: HashMap::new(),
            artifacts: HashMap::new(),
            index: DepIndex::new(),
            registered: HashSet::new(),
        };
        ctx.adopt(manifest);
        Ok(ctx)
    }

    /// Rebuilds the runtime tables and index from a persisted manifest.
    fn adopt(&mut self, manifest: BuildManifest) {
        for (path, record) in manifest.units {
            let mut unit = SourceUnit::carried(record.fingerprint);
            for (kind, value) in &record.requirements {
                let cap = Cap::intern(&self.names, kind, value);
                if unit.add_requirement(cap) {
                    self.index.declare_requirement(&path, cap);
                }
            }
            unit.artifacts = record.artifacts;
            self.units.insert(path, unit);
        }
        for (path, record) in manifest.artifacts {
            let mut capabilities = Vec::with_capacity(record.capabilities.len());
            for (kind, value) in &record.capabilities {
                let cap = Cap::intern(&self.names, kind, value);
                self.index.declare_capability(&path, cap);
                capabilities.push(cap);
            }
            self.artifacts.insert(
                path,
                Artifact {
                    owner: record.owner,
                    capabilities,
                    content: record.content,
                },
            );
        }
    }

    /// Registers every unit in the set as part of the current build and
    /// returns the ones that need processing (new or modified), sorted.
    ///
    /// Idempotent within a build: registering the same set twice returns
    /// the same classification and has no further side effects.
    pub fn register_units_for_processing(&mut self, set: &SourceSet) -> Vec<PathBuf> {
        let mut needs = Vec::new();
        for stamp in &set.units {
            self.registered.insert(stamp.unit.clone());
            let unit = self
                .units
                .entry(stamp.unit.clone())
                .or_insert_with(SourceUnit::discovered);
            unit.pending_fingerprint = Some(stamp.fingerprint);
            if unit.fingerprint() != Some(stamp.fingerprint) {
                needs.push(stamp.unit.clone());
            }
        }
        needs.sort();
        needs.dedup();
        needs
    }

    /// Deletes every artifact whose owning unit is not part of the current
    /// build, dropping the owning unit records as well.
    ///
    /// Must be called only after all source sets have been registered;
    /// calling it earlier would treat not-yet-seen units as removed.
    pub fn delete_stale_outputs(&mut self) -> Result<Vec<RetiredArtifact>, BuildError> {
        let mut stale: Vec<PathBuf> = self
            .units
            .keys()
            .filter(|unit| !self.registered.contains(*unit))
            .cloned()
            .collect();
        stale.sort();

        let mut retired = Vec::new();
        for unit_path in stale {
            self.index.remove_unit(&unit_path);
            if let Some(unit) = self.units.remove(&unit_path) {
                for artifact in unit.artifacts {
                    if let Some(r) = self.retire_artifact(&artifact)? {
                        retired.push(r);
                    }
                }
            }
        }
        Ok(retired)
    }

    /// Removes one artifact from the tables, the index, and disk.
    fn retire_artifact(&mut self, path: &Path) -> Result<Option<RetiredArtifact>, BuildError> {
        let artifact = match self.artifacts.remove(path) {
            Some(artifact) => artifact,
            None => return Ok(None),
        };
        self.index.remove_artifact(path);
        self.outputs.delete(path).map_err(BuildError::Storage)?;
        Ok(Some(RetiredArtifact {
            artifact: path.to_path_buf(),
            capabilities: artifact.capabilities,
        }))
    }

    /// Units whose requirements match any of the given capabilities,
    /// sorted and deduplicated.
    pub fn dependents_of(&self, capabilities: &[Cap]) -> Vec<PathBuf> {
        let mut dependents: Vec<PathBuf> = capabilities
            .iter()
            .flat_map(|cap| self.index.units_requiring(*cap))
            .cloned()
            .collect();
        dependents.sort();
        dependents.dedup();
        dependents
    }

    /// Marks a unit as waiting in the scheduler queue.
    pub fn mark_queued(&mut self, unit: &Path) {
        if let Some(u) = self.units.get_mut(unit) {
            u.state = UnitState::Queued;
        }
    }

    /// Starts processing a unit: marks it processed and clears its
    /// requirement set, returning the prior set so a failure can restore it.
    pub fn begin_unit(&mut self, unit: &Path) -> Vec<Cap> {
        self.index.remove_unit(unit);
        match self.units.get_mut(unit) {
            Some(u) => {
                u.state = UnitState::Processed;
                std::mem::take(&mut u.requirements)
            }
            None => Vec::new(),
        }
    }

    /// Accumulates requirements for a unit, in declaration order without
    /// duplicates, and mirrors them into the index.
    pub fn add_requirements(&mut self, unit: &Path, pairs: &[(String, String)]) {
        if let Some(u) = self.units.get_mut(unit) {
            for (kind, value) in pairs {
                let cap = Cap::intern(&self.names, kind, value);
                if u.add_requirement(cap) {
                    self.index.declare_requirement(unit, cap);
                }
            }
        }
    }

    /// The previously registered state of an artifact identity, if any.
    pub fn artifact_state(&self, artifact: &Path) -> Option<ArtifactState> {
        self.artifacts.get(artifact).map(|a| ArtifactState {
            capabilities: a
                .capabilities
                .iter()
                .map(|cap| cap.resolve(&self.names))
                .collect(),
            content: a.content,
        })
    }

    /// Replaces (or creates) the artifact record for `artifact`, registering
    /// its capabilities in the index.
    ///
    /// Returns the interned capability set and the displaced record, which
    /// the caller must hand back to [`rollback_artifact`](Self::rollback_artifact)
    /// if writing the artifact bytes fails. Ambiguous capabilities and
    /// ownership transfers are appended to `warnings`.
    pub fn replace_artifact(
        &mut self,
        owner: &Path,
        artifact: &Path,
        capability_pairs: &[(String, String)],
        content: Fingerprint,
        warnings: &mut Vec<BuildWarning>,
    ) -> (Vec<Cap>, Option<Artifact>) {
        let displaced = self.artifacts.remove(artifact);
        if let Some(prev) = &displaced {
            self.index.remove_artifact(artifact);
            if prev.owner != owner {
                if let Some(old_owner) = self.units.get_mut(&prev.owner) {
                    old_owner.artifacts.retain(|p| p != artifact);
                }
                warnings.push(BuildWarning::OwnershipTransfer {
                    artifact: artifact.to_path_buf(),
                    from: prev.owner.clone(),
                    to: owner.to_path_buf(),
                });
            }
        }

        let mut capabilities = Vec::with_capacity(capability_pairs.len());
        for (kind, value) in capability_pairs {
            let cap = Cap::intern(&self.names, kind, value);
            if capabilities.contains(&cap) {
                continue;
            }
            let mut others: Vec<PathBuf> = self.index.providers_of(cap).cloned().collect();
            if !others.is_empty() {
                others.push(artifact.to_path_buf());
                others.sort();
                warnings.push(BuildWarning::AmbiguousCapability {
                    kind: kind.clone(),
                    value: value.clone(),
                    providers: others,
                });
            }
            self.index.declare_capability(artifact, cap);
            capabilities.push(cap);
        }

        self.artifacts.insert(
            artifact.to_path_buf(),
            Artifact {
                owner: owner.to_path_buf(),
                capabilities: capabilities.clone(),
                content,
            },
        );
        if let Some(u) = self.units.get_mut(owner) {
            if !u.artifacts.iter().any(|p| p == artifact) {
                u.artifacts.push(artifact.to_path_buf());
            }
        }
        (capabilities, displaced)
    }

    /// Writes artifact bytes to the output root.
    pub fn write_output(&self, artifact: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        self.outputs.write(artifact, bytes)
    }

    /// Undoes a tentative artifact registration after a failed write,
    /// restoring the displaced record so the index is not left claiming
    /// capabilities for an artifact that does not exist on disk.
    pub fn rollback_artifact(&mut self, owner: &Path, artifact: &Path, displaced: Option<Artifact>) {
        self.index.remove_artifact(artifact);
        self.artifacts.remove(artifact);
        if let Some(u) = self.units.get_mut(owner) {
            u.artifacts.retain(|p| p != artifact);
        }
        if let Some(prev) = displaced {
            for cap in &prev.capabilities {
                self.index.declare_capability(artifact, *cap);
            }
            if let Some(u) = self.units.get_mut(&prev.owner) {
                if !u.artifacts.iter().any(|p| p == artifact) {
                    u.artifacts.push(artifact.to_path_buf());
                }
            }
            self.artifacts.insert(artifact.to_path_buf(), prev);
        }
    }

    /// Completes a successful unit processing: retires previously owned
    /// artifacts the unit no longer produces and commits the pending
    /// fingerprint.
    ///
    /// Retired artifacts flow back to the scheduler so their dependents are
    /// enqueued through the deletion path; a unit that stopped providing a
    /// capability has no new artifact to compare structurally.
    pub fn finish_unit(
        &mut self,
        unit: &Path,
        produced: &[PathBuf],
    ) -> Result<Vec<RetiredArtifact>, BuildError> {
        let previous: Vec<PathBuf> = self
            .units
            .get(unit)
            .map(|u| u.artifacts.clone())
            .unwrap_or_default();

        let mut retired = Vec::new();
        for artifact in previous {
            if !produced.contains(&artifact) {
                if let Some(r) = self.retire_artifact(&artifact)? {
                    retired.push(r);
                }
                if let Some(u) = self.units.get_mut(unit) {
                    u.artifacts.retain(|p| p != &artifact);
                }
            }
        }

        if let Some(u) = self.units.get_mut(unit) {
            u.outcome = UnitOutcome::Rebuilt;
            u.fingerprint = u.pending_fingerprint;
        }
        Ok(retired)
    }

    /// Records a failed unit processing: retires the artifacts the failed
    /// invocation registered, restores the prior requirement set (for
    /// persistence) and leaves the committed fingerprint untouched so the
    /// next build retries the unit.
    ///
    /// `produced` lists the outputs registered before the failure. They
    /// must not survive it: the unit's fingerprint is never committed, so
    /// a never-successful unit is omitted from the snapshot and an artifact
    /// it left behind would have no owner for stale-output deletion to
    /// find. Retired artifacts flow back to the scheduler like any other
    /// deletion.
    pub fn fail_unit(
        &mut self,
        unit: &Path,
        prior_requirements: Vec<Cap>,
        produced: &[PathBuf],
    ) -> Result<Vec<RetiredArtifact>, BuildError> {
        let mut retired = Vec::new();
        for artifact in produced {
            if let Some(r) = self.retire_artifact(artifact)? {
                retired.push(r);
            }
        }
        self.index.remove_unit(unit);
        if let Some(u) = self.units.get_mut(unit) {
            u.outcome = UnitOutcome::Failed;
            u.requirements.clear();
            u.artifacts.retain(|p| !produced.contains(p));
        }
        for cap in prior_requirements {
            if let Some(u) = self.units.get_mut(unit) {
                if u.add_requirement(cap) {
                    self.index.declare_requirement(unit, cap);
                }
            }
        }
        Ok(retired)
    }

    /// Persists the current state. Loading the result and saving it again
    /// without an intervening build reproduces the same build decisions.
    pub fn save(&self) -> Result<(), BuildError> {
        let mut manifest = BuildManifest::new(&self.engine_version);
        for (path, unit) in &self.units {
            // A unit with no committed fingerprint never processed
            // successfully; omitting it makes the next build treat it as new.
            let fingerprint = match unit.fingerprint() {
                Some(fp) => fp,
                None => continue,
            };
            manifest.units.insert(
                path.clone(),
                UnitRecord {
                    fingerprint,
                    requirements: unit
                        .requirements()
                        .iter()
                        .map(|cap| cap.resolve(&self.names))
                        .collect(),
                    artifacts: unit.artifacts().to_vec(),
                },
            );
        }
        for (path, artifact) in &self.artifacts {
            manifest.artifacts.insert(
                path.clone(),
                ArtifactRecord {
                    owner: artifact.owner.clone(),
                    capabilities: artifact
                        .capabilities
                        .iter()
                        .map(|cap| cap.resolve(&self.names))
                        .collect(),
                    content: artifact.content,
                },
            );
        }
        manifest.save(&self.state_dir)?;
        Ok(())
    }

    /// Looks up a unit record.
    pub fn unit(&self, unit: &Path) -> Option<&SourceUnit> {
        self.units.get(unit)
    }

    /// Looks up an artifact record.
    pub fn artifact(&self, artifact: &Path) -> Option<&Artifact> {
        self.artifacts.get(artifact)
    }

    /// The name table capability atoms are interned in.
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// The output store artifact bytes are written through.
    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ctx() -> (tempfile::TempDir, BuildContext) {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));
        let ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
        (dir, ctx)
    }

    fn stamped(unit: &str, content: &[u8]) -> UnitStamp {
        UnitStamp {
            unit: PathBuf::from(unit),
            fingerprint: Fingerprint::of(content),
        }
    }

    #[test]
    fn fresh_context_is_empty() {
        let (_dir, ctx) = make_ctx();
        assert!(ctx.unit(Path::new("src/A.java")).is_none());
        assert!(ctx.artifact(Path::new("A.class")).is_none());
    }

    #[test]
    fn register_classifies_new_units() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/B.java", b"b"));
        set.units.push(stamped("src/A.java", b"a"));

        let needs = ctx.register_units_for_processing(&set);
        assert_eq!(
            needs,
            vec![PathBuf::from("src/A.java"), PathBuf::from("src/B.java")]
        );
    }

    #[test]
    fn register_is_idempotent() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));

        let first = ctx.register_units_for_processing(&set);
        let second = ctx.register_units_for_processing(&set);
        assert_eq!(first, second);
    }

    #[test]
    fn replace_artifact_and_query_dependents() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));
        set.units.push(stamped("src/B.java", b"b"));
        ctx.register_units_for_processing(&set);

        ctx.add_requirements(
            Path::new("src/B.java"),
            &[("type".to_string(), "A".to_string())],
        );
        let mut warnings = Vec::new();
        let (caps, displaced) = ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("A.class"),
            &[("type".to_string(), "A".to_string())],
            Fingerprint::of(b"bytecode"),
            &mut warnings,
        );
        assert!(displaced.is_none());
        assert!(warnings.is_empty());

        assert_eq!(ctx.dependents_of(&caps), vec![PathBuf::from("src/B.java")]);
        assert_eq!(
            ctx.unit(Path::new("src/A.java")).unwrap().artifacts(),
            &[PathBuf::from("A.class")]
        );
    }

    #[test]
    fn duplicate_capability_is_flagged_ambiguous() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));
        set.units.push(stamped("src/B.java", b"b"));
        ctx.register_units_for_processing(&set);

        let mut warnings = Vec::new();
        let pair = vec![("type".to_string(), "Widget".to_string())];
        ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("A.class"),
            &pair,
            Fingerprint::of(b"a"),
            &mut warnings,
        );
        ctx.replace_artifact(
            Path::new("src/B.java"),
            Path::new("B.class"),
            &pair,
            Fingerprint::of(b"b"),
            &mut warnings,
        );

        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0],
            BuildWarning::AmbiguousCapability {
                kind: "type".to_string(),
                value: "Widget".to_string(),
                providers: vec![PathBuf::from("A.class"), PathBuf::from("B.class")],
            }
        );
    }

    #[test]
    fn claiming_anothers_artifact_transfers_ownership() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));
        set.units.push(stamped("src/B.java", b"b"));
        ctx.register_units_for_processing(&set);

        let mut warnings = Vec::new();
        ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("shared.bin"),
            &[],
            Fingerprint::of(b"from a"),
            &mut warnings,
        );
        ctx.replace_artifact(
            Path::new("src/B.java"),
            Path::new("shared.bin"),
            &[],
            Fingerprint::of(b"from b"),
            &mut warnings,
        );

        assert_eq!(
            warnings,
            vec![BuildWarning::OwnershipTransfer {
                artifact: PathBuf::from("shared.bin"),
                from: PathBuf::from("src/A.java"),
                to: PathBuf::from("src/B.java"),
            }]
        );
        assert_eq!(
            ctx.artifact(Path::new("shared.bin")).unwrap().owner(),
            &PathBuf::from("src/B.java")
        );
        assert!(ctx.unit(Path::new("src/A.java")).unwrap().artifacts().is_empty());
    }

    #[test]
    fn rollback_restores_displaced_record() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));
        ctx.register_units_for_processing(&set);

        let mut warnings = Vec::new();
        ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("A.class"),
            &[("type".to_string(), "A".to_string())],
            Fingerprint::of(b"v1"),
            &mut warnings,
        );

        // Tentative re-registration with different capabilities, then a
        // simulated failed write.
        let (_new_caps, displaced) = ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("A.class"),
            &[("type".to_string(), "Renamed".to_string())],
            Fingerprint::of(b"v2"),
            &mut warnings,
        );
        ctx.rollback_artifact(Path::new("src/A.java"), Path::new("A.class"), displaced);

        // The displaced record is live again; the tentative one is gone.
        let state = ctx.artifact_state(Path::new("A.class")).unwrap();
        assert_eq!(
            state.capabilities,
            vec![("type".to_string(), "A".to_string())]
        );
        assert_eq!(state.content, Fingerprint::of(b"v1"));
    }

    #[test]
    fn delete_stale_outputs_removes_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));

        // Build 1: register A, give it an artifact, save.
        {
            let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
            let mut set = SourceSet::new();
            set.units.push(stamped("src/A.java", b"a"));
            ctx.register_units_for_processing(&set);
            let mut warnings = Vec::new();
            ctx.replace_artifact(
                Path::new("src/A.java"),
                Path::new("A.class"),
                &[("type".to_string(), "A".to_string())],
                Fingerprint::of(b"bytecode"),
                &mut warnings,
            );
            ctx.write_output(Path::new("A.class"), b"bytecode").unwrap();
            ctx.finish_unit(Path::new("src/A.java"), &[PathBuf::from("A.class")])
                .unwrap();
            ctx.save().unwrap();
        }

        // Build 2: A is gone from the source set.
        let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
        ctx.register_units_for_processing(&SourceSet::new());
        let retired = ctx.delete_stale_outputs().unwrap();

        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].artifact, PathBuf::from("A.class"));
        assert!(!ctx.outputs().exists(Path::new("A.class")));
        assert!(ctx.unit(Path::new("src/A.java")).is_none());

        ctx.save().unwrap();
        let reloaded = BuildContext::load_or_create(&options, "0.1.0").unwrap();
        assert!(reloaded.unit(Path::new("src/A.java")).is_none());
    }

    #[test]
    fn finish_unit_retires_unproduced_artifacts() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));
        ctx.register_units_for_processing(&set);

        let mut warnings = Vec::new();
        ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("A.class"),
            &[("type".to_string(), "A".to_string())],
            Fingerprint::of(b"a"),
            &mut warnings,
        );
        ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("A$Inner.class"),
            &[("type".to_string(), "A$Inner".to_string())],
            Fingerprint::of(b"inner"),
            &mut warnings,
        );

        // Reprocessing produced only A.class this time.
        let retired = ctx
            .finish_unit(Path::new("src/A.java"), &[PathBuf::from("A.class")])
            .unwrap();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].artifact, PathBuf::from("A$Inner.class"));
        assert_eq!(
            ctx.unit(Path::new("src/A.java")).unwrap().artifacts(),
            &[PathBuf::from("A.class")]
        );
    }

    #[test]
    fn fail_unit_restores_prior_requirements() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/B.java", b"b"));
        ctx.register_units_for_processing(&set);

        ctx.add_requirements(
            Path::new("src/B.java"),
            &[("type".to_string(), "A".to_string())],
        );
        let prior = ctx.begin_unit(Path::new("src/B.java"));
        assert_eq!(prior.len(), 1);
        assert!(ctx
            .unit(Path::new("src/B.java"))
            .unwrap()
            .requirements()
            .is_empty());

        ctx.fail_unit(Path::new("src/B.java"), prior.clone(), &[])
            .unwrap();
        let unit = ctx.unit(Path::new("src/B.java")).unwrap();
        assert_eq!(unit.outcome, UnitOutcome::Failed);
        assert_eq!(unit.requirements(), prior.as_slice());
        assert_eq!(ctx.dependents_of(&prior), vec![PathBuf::from("src/B.java")]);
    }

    #[test]
    fn fail_unit_retires_artifacts_of_the_failed_invocation() {
        let (_dir, mut ctx) = make_ctx();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));
        ctx.register_units_for_processing(&set);

        let prior = ctx.begin_unit(Path::new("src/A.java"));
        let mut warnings = Vec::new();
        ctx.replace_artifact(
            Path::new("src/A.java"),
            Path::new("ok.bin"),
            &[("type".to_string(), "Ok".to_string())],
            Fingerprint::of(b"ok"),
            &mut warnings,
        );
        ctx.write_output(Path::new("ok.bin"), b"ok").unwrap();

        // A later output of the same invocation failed to write.
        let retired = ctx
            .fail_unit(Path::new("src/A.java"), prior, &[PathBuf::from("ok.bin")])
            .unwrap();

        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].artifact, PathBuf::from("ok.bin"));
        assert!(ctx.artifact(Path::new("ok.bin")).is_none());
        assert!(!ctx.outputs().exists(Path::new("ok.bin")));
        assert!(ctx
            .unit(Path::new("src/A.java"))
            .unwrap()
            .artifacts()
            .is_empty());
    }

    #[test]
    fn save_omits_never_successful_units() {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));

        {
            let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
            let mut set = SourceSet::new();
            set.units.push(stamped("src/A.java", b"a"));
            ctx.register_units_for_processing(&set);
            let prior = ctx.begin_unit(Path::new("src/A.java"));
            ctx.fail_unit(Path::new("src/A.java"), prior, &[]).unwrap();
            ctx.save().unwrap();
        }

        let ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
        assert!(ctx.unit(Path::new("src/A.java")).is_none());
    }

    #[test]
    fn version_change_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));

        {
            let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
            let mut set = SourceSet::new();
            set.units.push(stamped("src/A.java", b"a"));
            ctx.register_units_for_processing(&set);
            ctx.finish_unit(Path::new("src/A.java"), &[]).unwrap();
            ctx.save().unwrap();
        }

        let ctx = BuildContext::load_or_create(&options, "0.2.0").unwrap();
        assert!(ctx.unit(Path::new("src/A.java")).is_none());
    }

    #[test]
    fn load_save_roundtrip_preserves_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));

        {
            let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
            let mut set = SourceSet::new();
            set.units.push(stamped("src/A.java", b"a"));
            ctx.register_units_for_processing(&set);
            ctx.add_requirements(
                Path::new("src/A.java"),
                &[("type".to_string(), "B".to_string())],
            );
            ctx.finish_unit(Path::new("src/A.java"), &[]).unwrap();
            ctx.save().unwrap();
        }

        // Load and save with no build in between.
        {
            let ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
            ctx.save().unwrap();
        }

        // Same classification as before: A is unchanged.
        let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
        let mut set = SourceSet::new();
        set.units.push(stamped("src/A.java", b"a"));
        let needs = ctx.register_units_for_processing(&set);
        assert!(needs.is_empty());
    }
}

//! Bidirectional capability/requirement index.
//!
//! Maps every `(kind, value)` pair to the artifacts providing it and the
//! units requiring it. All lookups are O(1) amortized per bucket. The index
//! is transient per build context: it is rebuilt from persisted state on
//! load and updated by whole-set replacement as units are reprocessed, so
//! no stale partial entries leak across passes or builds.
//!
//! Returned sets carry no ordering guarantee; callers sort when they need
//! determinism.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::cap::Cap;

/// Bidirectional index between capabilities and the entities declaring them.
#[derive(Debug, Default)]
pub struct DepIndex {
    /// Artifacts providing each capability.
    providers: HashMap<Cap, HashSet<PathBuf>>,

    /// Units requiring each capability.
    requirers: HashMap<Cap, HashSet<PathBuf>>,

    /// Reverse map for whole-artifact removal.
    artifact_caps: HashMap<PathBuf, Vec<Cap>>,

    /// Reverse map for whole-unit removal.
    unit_reqs: HashMap<PathBuf, Vec<Cap>>,
}

impl DepIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `artifact` provides `cap`.
    pub fn declare_capability(&mut self, artifact: &Path, cap: Cap) {
        self.providers
            .entry(cap)
            .or_default()
            .insert(artifact.to_path_buf());
        self.artifact_caps
            .entry(artifact.to_path_buf())
            .or_default()
            .push(cap);
    }

    /// Records that `unit` requires `cap`.
    pub fn declare_requirement(&mut self, unit: &Path, cap: Cap) {
        self.requirers
            .entry(cap)
            .or_default()
            .insert(unit.to_path_buf());
        self.unit_reqs
            .entry(unit.to_path_buf())
            .or_default()
            .push(cap);
    }

    /// Units whose requirements match `cap`. Unordered.
    pub fn units_requiring(&self, cap: Cap) -> impl Iterator<Item = &PathBuf> {
        self.requirers.get(&cap).into_iter().flatten()
    }

    /// Artifacts currently providing `cap`. Unordered.
    pub fn providers_of(&self, cap: Cap) -> impl Iterator<Item = &PathBuf> {
        self.providers.get(&cap).into_iter().flatten()
    }

    /// Removes every capability entry held by `artifact`.
    pub fn remove_artifact(&mut self, artifact: &Path) {
        if let Some(caps) = self.artifact_caps.remove(artifact) {
            for cap in caps {
                if let Some(bucket) = self.providers.get_mut(&cap) {
                    bucket.remove(artifact);
                    if bucket.is_empty() {
                        self.providers.remove(&cap);
                    }
                }
            }
        }
    }

    /// Removes every requirement entry held by `unit`.
    pub fn remove_unit(&mut self, unit: &Path) {
        if let Some(caps) = self.unit_reqs.remove(unit) {
            for cap in caps {
                if let Some(bucket) = self.requirers.get_mut(&cap) {
                    bucket.remove(unit);
                    if bucket.is_empty() {
                        self.requirers.remove(&cap);
                    }
                }
            }
        }
    }
}

//! Cross-build manifest of source units and artifacts.
//!
//! The manifest is the persisted half of the build context: for every source
//! unit its modification fingerprint, requirement pairs, and owned artifact
//! ids; for every artifact its owner, capability pairs, and content
//! fingerprint. Loading a manifest and immediately saving it reproduces the
//! same build decisions, which is what makes no-change builds no-ops.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::snapshot;

/// Name of the state snapshot file within the state directory.
const STATE_FILE: &str = "state.kiln";

/// Persisted build state across invocations.
///
/// Maps are `BTreeMap` so snapshots are deterministic byte-for-byte for
/// identical state. All capability and requirement atoms are stored as
/// resolved strings; the engine re-interns them on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Engine version that produced this state. Invalidate on change.
    pub engine_version: String,

    /// Per-unit state, keyed by the unit's identity path.
    pub units: BTreeMap<PathBuf, UnitRecord>,

    /// Per-artifact state, keyed by the artifact's destination path.
    pub artifacts: BTreeMap<PathBuf, ArtifactRecord>,
}

/// Persisted state for a single source unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Modification fingerprint as of the unit's last successful processing.
    pub fingerprint: Fingerprint,

    /// `(kind, value)` requirement pairs declared by the unit's last
    /// successful processing, in declaration order.
    pub requirements: Vec<(String, String)>,

    /// Destination paths of the artifacts this unit owns.
    pub artifacts: Vec<PathBuf>,
}

/// Persisted state for a single artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Identity path of the unit that produced this artifact.
    pub owner: PathBuf,

    /// `(kind, value)` capability pairs the artifact declared when it was
    /// last registered.
    pub capabilities: Vec<(String, String)>,

    /// Fingerprint of the artifact bytes as last written.
    pub content: Fingerprint,
}

impl BuildManifest {
    /// Creates a new empty manifest for the given engine version.
    pub fn new(engine_version: &str) -> Self {
        Self {
            engine_version: engine_version.to_string(),
            units: BTreeMap::new(),
            artifacts: BTreeMap::new(),
        }
    }

    /// Loads the manifest from the state directory.
    ///
    /// Returns `Ok(None)` when there is no usable snapshot: the file is
    /// missing, fails framing validation, or cannot be decoded. Only an I/O
    /// failure on an existing file is an error, because a build must not
    /// proceed on state it could not read.
    pub fn load(state_dir: &Path) -> Result<Option<Self>, StoreError> {
        let path = state_dir.join(STATE_FILE);
        let payload = match snapshot::read_snapshot(&path)? {
            Some(payload) => payload,
            None => return Ok(None),
        };
        let decoded = bincode::serde::decode_from_slice(&payload, bincode::config::standard())
            .ok()
            .map(|(manifest, _)| manifest);
        Ok(decoded)
    }

    /// Saves the manifest to the state directory, creating it if needed.
    pub fn save(&self, state_dir: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(state_dir).map_err(|e| StoreError::Io {
            path: state_dir.to_path_buf(),
            source: e,
        })?;
        let payload = bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(
            |e| StoreError::Serialization {
                reason: e.to_string(),
            },
        )?;
        snapshot::write_snapshot(&state_dir.join(STATE_FILE), &payload)
    }

    /// Returns `true` if this manifest was produced by a compatible engine
    /// version.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.engine_version == current_version
    }
}

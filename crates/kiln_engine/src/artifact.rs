//! Artifact records.

use std::path::PathBuf;

use kiln_common::Fingerprint;

use crate::cap::Cap;

/// One output produced by processing exactly one source unit.
///
/// Replaced wholesale whenever its owning unit is reprocessed: a fresh
/// instance carries no memory of the previous build's capability set.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Identity path of the unit that produced this artifact.
    pub(crate) owner: PathBuf,

    /// Capabilities declared at the artifact's last registration.
    pub(crate) capabilities: Vec<Cap>,

    /// Fingerprint of the artifact bytes as last written.
    pub(crate) content: Fingerprint,
}

impl Artifact {
    /// Identity path of the owning unit.
    pub fn owner(&self) -> &PathBuf {
        &self.owner
    }

    /// The artifact's declared capabilities.
    pub fn capabilities(&self) -> &[Cap] {
        &self.capabilities
    }

    /// Fingerprint of the artifact bytes.
    pub fn content(&self) -> Fingerprint {
        self.content
    }
}

/// String-typed snapshot of a previously registered artifact, handed to
/// structural-change detectors for comparison against freshly produced
/// bytes.
#[derive(Debug, Clone)]
pub struct ArtifactState {
    /// `(kind, value)` capability pairs the artifact held.
    pub capabilities: Vec<(String, String)>,

    /// Fingerprint of the previously written bytes.
    pub content: Fingerprint,
}

impl ArtifactState {
    /// Returns `true` if the new bytes hash to the same content the
    /// artifact held before. A convenience for byte-equality detectors;
    /// structural detectors will usually look deeper.
    pub fn same_content(&self, new_bytes: &[u8]) -> bool {
        self.content == Fingerprint::of(new_bytes)
    }
}

//! Per-build outcome accumulator.
//!
//! The engine carries no logging surface; everything an invoker needs to
//! diagnose a build is accumulated here: which units were processed and in
//! how many passes, which artifacts were deleted, per-unit failures with
//! the pass they occurred in, and build-level warnings.

use std::path::PathBuf;

use kiln_store::StoreError;

use crate::error::TransformError;

/// Accumulated outcome of one build invocation.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Units submitted to the transformation this build, sorted.
    pub processed: Vec<PathBuf>,

    /// Number of scheduler passes executed.
    pub passes: usize,

    /// Artifacts deleted this build (orphaned or retired).
    pub deleted_artifacts: Vec<PathBuf>,

    /// Per-unit failures. The build continued past each of these.
    pub failures: Vec<UnitFailure>,

    /// Build-level warnings.
    pub warnings: Vec<BuildWarning>,
}

impl BuildReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no unit failed this build.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of units submitted to the transformation this build.
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}

/// A per-unit failure, with enough context to produce a diagnostic.
#[derive(Debug)]
pub struct UnitFailure {
    /// Identity of the failed unit.
    pub unit: PathBuf,

    /// Scheduler pass (1-based) in which the failure occurred.
    pub pass: usize,

    /// What went wrong.
    pub kind: FailureKind,
}

/// The ways processing a single unit can fail without aborting the build.
#[derive(Debug, thiserror::Error)]
pub enum FailureKind {
    /// The external transformation reported an error; the unit's result was
    /// discarded and no dependents were enqueued.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Writing the artifact bytes failed after its capabilities were
    /// tentatively registered; the registration was rolled back.
    #[error("failed to write artifact {artifact}: {source}")]
    ArtifactWrite {
        /// Destination path of the artifact that could not be written.
        artifact: PathBuf,
        /// The underlying store error.
        source: StoreError,
    },
}

/// Conditions worth surfacing that do not fail any unit.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildWarning {
    /// Two live artifacts declare the same `(kind, value)` capability.
    /// Both providers stay in the index; dependent resolution is
    /// requirement-side, so a change to either still reaches every
    /// requirer.
    #[error("ambiguous capability {kind}:{value} provided by {providers:?}")]
    AmbiguousCapability {
        /// Capability kind.
        kind: String,
        /// Capability value.
        value: String,
        /// Every artifact providing the pair, sorted.
        providers: Vec<PathBuf>,
    },

    /// A processing result claimed an artifact identity previously owned
    /// by a different unit. The new registration wins.
    #[error("artifact {artifact} changed owner from {from} to {to}")]
    OwnershipTransfer {
        /// Artifact whose ownership moved.
        artifact: PathBuf,
        /// Previous owning unit.
        from: PathBuf,
        /// New owning unit.
        to: PathBuf,
    },
}

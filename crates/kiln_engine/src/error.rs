//! Error types for the build engine.

use kiln_store::StoreError;

/// A failure that aborts the entire build.
///
/// Only storage failures are fatal: a build that cannot read or write its
/// persisted state must not commit anything, because partial state cannot
/// be trusted. Per-unit failures degrade gracefully and are reported in the
/// [`BuildReport`](crate::report::BuildReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Persisted build state could not be read or written.
    #[error("build state storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// A failure reported by the external transformation for one unit.
///
/// The unit's result is discarded, no dependents are enqueued, and the
/// unit's committed fingerprint is left untouched so the next build retries
/// it from scratch.
#[derive(Debug, thiserror::Error)]
#[error("transformation failed: {message}")]
pub struct TransformError {
    /// Description of the failure, produced by the transformation.
    pub message: String,
}

impl TransformError {
    /// Creates a new transformation error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

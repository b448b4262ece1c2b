//! Error types for store operations.

use std::path::PathBuf;

/// Errors that can occur while reading or writing persisted build state
/// or artifact output files.
///
/// A `StoreError` raised by the state snapshot or the output store is fatal
/// to the build: partial build state must not be trusted. The one exception
/// is an artifact write during processing, which the engine degrades to a
/// per-unit failure after rolling back the artifact's registration.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred while reading or writing a store file.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A state snapshot could not be encoded.
    #[error("state serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

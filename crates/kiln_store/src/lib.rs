//! Persisted build state and output file management for the Kiln engine.
//!
//! The build context keeps its cross-build memory here: a versioned binary
//! snapshot of every known source unit and artifact, and an output store
//! that writes and deletes the artifact files themselves. Snapshot reads are
//! fail-safe: corruption or a format change yields no state (and therefore a
//! full rebuild) instead of an error.

#![warn(missing_docs)]

pub mod error;
pub mod manifest;
pub mod output;
pub mod snapshot;

pub use error::StoreError;
pub use manifest::{ArtifactRecord, BuildManifest, UnitRecord};
pub use output::OutputStore;

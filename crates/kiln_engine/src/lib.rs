//! Dependency-driven incremental build-avoidance core.
//!
//! Given a set of source units that may change between invocations, the
//! engine reprocesses only the units whose outputs could have changed. Units
//! declare requirements and the artifacts they produce declare capabilities;
//! matching `(kind, value)` pairs form a dependency graph that is discovered
//! lazily as units are processed. The [`Scheduler`] drives a multi-pass
//! fixed-point loop over that graph, seeded by modified units and by the
//! deletion of orphaned artifacts, and is guaranteed to terminate because no
//! unit is submitted for processing more than once per build.
//!
//! The transformation itself (compiler, transpiler, codegen) and the
//! structural-change test for its outputs are external collaborators,
//! injected through the [`Transform`] and [`ChangeDetector`] traits.

#![warn(missing_docs)]

pub mod artifact;
pub mod cap;
pub mod context;
pub mod error;
pub mod index;
pub mod options;
pub mod report;
pub mod scheduler;
pub mod unit;

pub use artifact::{Artifact, ArtifactState};
pub use cap::Cap;
pub use context::{BuildContext, RetiredArtifact, SourceSet, UnitStamp};
pub use error::{BuildError, TransformError};
pub use options::{BuildOptions, OptionsError};
pub use report::{BuildReport, BuildWarning, FailureKind, UnitFailure};
pub use scheduler::{ChangeDetector, ContentChange, Scheduler, Transform, TransformOutput};
pub use unit::{SourceUnit, UnitOutcome, UnitState};

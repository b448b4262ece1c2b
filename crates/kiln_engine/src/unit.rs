//! Source unit records.

use std::path::PathBuf;

use kiln_common::Fingerprint;

use crate::cap::Cap;

/// Processing state of a unit within the current build.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnitState {
    /// Not yet touched by the scheduler this build.
    Unprocessed,
    /// Waiting in the scheduler queue for the next pass.
    Queued,
    /// Submitted to the transformation this build. Monotone: a processed
    /// unit is never resubmitted within the same build.
    Processed,
}

/// How the current build left a unit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnitOutcome {
    /// Carried over unchanged from the previous build.
    Carried,
    /// Reprocessed successfully this build.
    Rebuilt,
    /// Reprocessed and failed; last-successful state is kept so the next
    /// build retries it.
    Failed,
}

/// One compilable input, keyed by its identity path in the build context.
///
/// A unit's requirement set is cleared when the unit is reprocessed and
/// accumulated from the processing results, preserving declaration order
/// without duplicates. The committed fingerprint only advances on a
/// successful reprocess, so failed units are classified as modified again
/// by the next build.
#[derive(Debug)]
pub struct SourceUnit {
    /// Scheduler-visible processing state for the current build.
    pub state: UnitState,

    /// Build outcome, `Carried` until the scheduler says otherwise.
    pub outcome: UnitOutcome,

    /// Fingerprint as of the last successful processing, if any.
    pub(crate) fingerprint: Option<Fingerprint>,

    /// Fingerprint supplied by this build's registration.
    pub(crate) pending_fingerprint: Option<Fingerprint>,

    /// Ordered, deduplicated requirement set.
    pub(crate) requirements: Vec<Cap>,

    /// Destination paths of artifacts this unit exclusively owns.
    pub(crate) artifacts: Vec<PathBuf>,
}

impl SourceUnit {
    /// Creates a record for a unit never seen before.
    pub(crate) fn discovered() -> Self {
        Self {
            state: UnitState::Unprocessed,
            outcome: UnitOutcome::Carried,
            fingerprint: None,
            pending_fingerprint: None,
            requirements: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Creates a record carried over from persisted state.
    pub(crate) fn carried(fingerprint: Fingerprint) -> Self {
        Self {
            state: UnitState::Unprocessed,
            outcome: UnitOutcome::Carried,
            fingerprint: Some(fingerprint),
            pending_fingerprint: None,
            requirements: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Appends a requirement, keeping the set ordered and duplicate-free.
    /// Returns `true` if the requirement was newly added.
    pub(crate) fn add_requirement(&mut self, cap: Cap) -> bool {
        if self.requirements.contains(&cap) {
            return false;
        }
        self.requirements.push(cap);
        true
    }

    /// The unit's current requirement set, in declaration order.
    pub fn requirements(&self) -> &[Cap] {
        &self.requirements
    }

    /// Destination paths of the artifacts this unit owns.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Fingerprint as of the last successful processing.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }
}

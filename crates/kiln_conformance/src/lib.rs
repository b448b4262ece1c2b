//! Test harness for the Kiln conformance suite.
//!
//! Provides a scripted in-memory compiler standing in for the external
//! transformation, a scripted structural-change detector, and a workbench
//! that persists build state in a temporary directory across builds so
//! multi-build scenarios read naturally in the tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use kiln_common::Fingerprint;
use kiln_engine::{
    ArtifactState, BuildContext, BuildOptions, BuildReport, ChangeDetector, Scheduler, SourceSet,
    Transform, TransformError, TransformOutput,
};

/// Engine version used by the whole suite.
pub const ENGINE_VERSION: &str = "0.1.0";

/// A table-driven compiler: each unit maps to scripted outputs, and every
/// invocation is recorded so tests can assert exactly what was processed.
#[derive(Default)]
pub struct ScriptedCompiler {
    outputs: HashMap<PathBuf, Vec<TransformOutput>>,
    failures: HashSet<PathBuf>,
    /// Units in the order the scheduler submitted them.
    pub invocations: Vec<PathBuf>,
}

impl ScriptedCompiler {
    /// Creates a compiler with no scripted units.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a unit to produce one artifact with the given capabilities
    /// and requirements. The artifact bytes derive from the unit and a
    /// revision tag so tests can make content change or stay identical.
    pub fn script(
        &mut self,
        unit: &str,
        artifact: &str,
        provides: &[(&str, &str)],
        requires: &[(&str, &str)],
        revision: u32,
    ) -> &mut Self {
        self.outputs.insert(
            PathBuf::from(unit),
            vec![TransformOutput {
                artifact: PathBuf::from(artifact),
                bytes: format!("{artifact} r{revision}").into_bytes(),
                capabilities: pairs(provides),
                requirements: pairs(requires),
            }],
        );
        self
    }

    /// Scripts a unit to produce several outputs.
    pub fn script_outputs(&mut self, unit: &str, outputs: Vec<TransformOutput>) -> &mut Self {
        self.outputs.insert(PathBuf::from(unit), outputs);
        self
    }

    /// Scripts a unit to fail.
    pub fn fail(&mut self, unit: &str) -> &mut Self {
        self.failures.insert(PathBuf::from(unit));
        self
    }

    /// Number of times a unit was submitted.
    pub fn runs_of(&self, unit: &str) -> usize {
        let unit = PathBuf::from(unit);
        self.invocations.iter().filter(|u| **u == unit).count()
    }
}

impl Transform for ScriptedCompiler {
    fn process(&mut self, unit: &Path) -> Result<Vec<TransformOutput>, TransformError> {
        self.invocations.push(unit.to_path_buf());
        if self.failures.contains(unit) {
            return Err(TransformError::new(format!(
                "scripted failure for {}",
                unit.display()
            )));
        }
        Ok(self.outputs.get(unit).cloned().unwrap_or_default())
    }
}

/// Builds a `(kind, value)` output entry.
pub fn output(
    artifact: &str,
    bytes: &[u8],
    provides: &[(&str, &str)],
    requires: &[(&str, &str)],
) -> TransformOutput {
    TransformOutput {
        artifact: PathBuf::from(artifact),
        bytes: bytes.to_vec(),
        capabilities: pairs(provides),
        requirements: pairs(requires),
    }
}

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Scripted structural-change detection: a brand-new artifact is always a
/// change; for re-registered artifacts the scripted flag decides.
pub struct ScriptedDetector {
    /// Whether re-registered artifacts count as structurally changed.
    pub changed: bool,
}

impl ChangeDetector for ScriptedDetector {
    fn is_structural_change(&self, previous: Option<&ArtifactState>, _new_bytes: &[u8]) -> bool {
        previous.is_none() || self.changed
    }
}

/// A persistent build environment: state and output directories in a
/// tempdir that live across multiple builds within one test.
pub struct Workbench {
    _dir: tempfile::TempDir,
    options: BuildOptions,
}

impl Workbench {
    /// Creates a fresh workbench.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));
        Self { _dir: dir, options }
    }

    /// Runs one build: loads the context, schedules, saves, and returns
    /// the report together with the compiler for inspection.
    pub fn build(
        &self,
        sets: &[SourceSet],
        compiler: ScriptedCompiler,
        changed: bool,
    ) -> (BuildReport, ScriptedCompiler) {
        let mut ctx = self.load_context();
        let mut scheduler = Scheduler::new(compiler, ScriptedDetector { changed });
        let report = scheduler.run(&mut ctx, sets).unwrap();
        ctx.save().unwrap();
        (report, scheduler.into_transform())
    }

    /// Loads a context without building, for state inspection.
    pub fn load_context(&self) -> BuildContext {
        BuildContext::load_or_create(&self.options, ENGINE_VERSION).unwrap()
    }

    /// The workbench's build options.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a source set from `(unit, content)` pairs; fingerprints are
/// derived from the content bytes.
pub fn source_set(units: &[(&str, &str)]) -> SourceSet {
    let mut set = SourceSet::new();
    for (unit, content) in units {
        set.push(*unit, Fingerprint::of(content.as_bytes()));
    }
    set
}

//! The multi-pass fixed-point build loop.
//!
//! Incremental compilation is a multi-pass process. The first pass covers
//! all new or modified units plus the dependents of artifacts orphaned since
//! the previous build. Each later pass covers units that depend on outputs
//! that structurally changed or disappeared in the pass before it, until a
//! pass enqueues nothing new. Termination is guaranteed: the `processed` set
//! only grows, enqueueing is a no-op for anything in it, and the universe of
//! units is finite, so the worst case is every unit processed exactly once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use kiln_common::Fingerprint;

use crate::artifact::ArtifactState;
use crate::context::{BuildContext, SourceSet};
use crate::error::{BuildError, TransformError};
use crate::report::{BuildReport, FailureKind, UnitFailure};

/// The external transformation that turns one source unit into artifacts.
///
/// Internals are opaque to the engine; only the shape of the result matters.
/// A unit may legitimately produce zero results (side-effect-only units).
pub trait Transform {
    /// Processes one unit, returning its artifacts with their declared
    /// capabilities and the unit's requirements.
    fn process(&mut self, unit: &Path) -> Result<Vec<TransformOutput>, TransformError>;
}

/// One artifact produced by processing a unit.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Destination path of the artifact, relative to the output root.
    pub artifact: PathBuf,

    /// Raw artifact bytes to write.
    pub bytes: Vec<u8>,

    /// `(kind, value)` capabilities this artifact provides.
    pub capabilities: Vec<(String, String)>,

    /// `(kind, value)` requirements of the producing unit.
    pub requirements: Vec<(String, String)>,
}

/// Caller-supplied test for whether a freshly produced artifact differs
/// structurally from its previously registered state.
///
/// The engine never interprets artifact bytes; whether a change is
/// behaviorally relevant (and therefore worth cascading to dependents)
/// depends entirely on the artifact format. `previous` is `None` when no
/// artifact was ever registered under that identity, which callers normally
/// treat as changed.
pub trait ChangeDetector {
    /// Returns `true` if dependents of the artifact must be reprocessed.
    fn is_structural_change(&self, previous: Option<&ArtifactState>, new_bytes: &[u8]) -> bool;
}

/// Byte-equality change detection: any content difference is structural.
/// The conservative default when no format-aware detector exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentChange;

impl ChangeDetector for ContentChange {
    fn is_structural_change(&self, previous: Option<&ArtifactState>, new_bytes: &[u8]) -> bool {
        match previous {
            Some(state) => !state.same_content(new_bytes),
            None => true,
        }
    }
}

/// Drives the build-avoidance loop over a [`BuildContext`].
pub struct Scheduler<T, D> {
    transform: T,
    detector: D,
}

impl<T: Transform, D: ChangeDetector> Scheduler<T, D> {
    /// Creates a scheduler around a transformation and a change detector.
    pub fn new(transform: T, detector: D) -> Self {
        Self {
            transform,
            detector,
        }
    }

    /// Consumes the scheduler, handing back the transformation.
    pub fn into_transform(self) -> T {
        self.transform
    }

    /// Runs one build over the given source sets.
    ///
    /// Every source set is registered before orphan deletion, as required
    /// for correct stale-output classification. The returned report lists
    /// processed units, pass count, deletions, per-unit failures, and
    /// warnings; only a storage failure aborts the build.
    pub fn run(
        &mut self,
        ctx: &mut BuildContext,
        source_sets: &[SourceSet],
    ) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::new();
        let mut queue: HashSet<PathBuf> = HashSet::new();
        let mut processed: HashSet<PathBuf> = HashSet::new();

        for set in source_sets {
            for unit in ctx.register_units_for_processing(set) {
                if queue.insert(unit.clone()) {
                    ctx.mark_queued(&unit);
                }
            }
        }

        for retired in ctx.delete_stale_outputs()? {
            report.deleted_artifacts.push(retired.artifact);
            for dependent in ctx.dependents_of(&retired.capabilities) {
                enqueue(ctx, &mut queue, &processed, dependent);
            }
        }

        while !queue.is_empty() {
            report.passes += 1;
            let pass = report.passes;

            // The whole queue moves into `processed` before anything runs:
            // units enqueued during this pass wait for the next one, so
            // their requirements see a fully updated capability set.
            let mut batch: Vec<PathBuf> = queue.drain().collect();
            batch.sort();
            processed.extend(batch.iter().cloned());

            for unit in batch {
                report.processed.push(unit.clone());
                let prior_requirements = ctx.begin_unit(&unit);

                let outputs = match self.transform.process(&unit) {
                    Ok(outputs) => outputs,
                    Err(e) => {
                        ctx.fail_unit(&unit, prior_requirements, &[])?;
                        report.failures.push(UnitFailure {
                            unit,
                            pass,
                            kind: FailureKind::Transform(e),
                        });
                        continue;
                    }
                };

                let mut produced = Vec::with_capacity(outputs.len());
                let mut write_failed = false;
                for output in outputs {
                    match apply_output(
                        ctx,
                        &self.detector,
                        &unit,
                        output,
                        &mut queue,
                        &processed,
                        &mut report,
                    ) {
                        Ok(artifact) => produced.push(artifact),
                        Err(kind) => {
                            write_failed = true;
                            report.failures.push(UnitFailure {
                                unit: unit.clone(),
                                pass,
                                kind,
                            });
                        }
                    }
                }

                if write_failed {
                    // Sibling outputs registered before the failure go with
                    // it; a never-committed unit cannot keep artifacts.
                    for retired in ctx.fail_unit(&unit, prior_requirements, &produced)? {
                        report.deleted_artifacts.push(retired.artifact);
                        for dependent in ctx.dependents_of(&retired.capabilities) {
                            enqueue(ctx, &mut queue, &processed, dependent);
                        }
                    }
                    continue;
                }

                for retired in ctx.finish_unit(&unit, &produced)? {
                    report.deleted_artifacts.push(retired.artifact);
                    for dependent in ctx.dependents_of(&retired.capabilities) {
                        enqueue(ctx, &mut queue, &processed, dependent);
                    }
                }
            }
        }

        report.processed.sort();
        report.deleted_artifacts.sort();
        Ok(report)
    }
}

/// Registers one processing result: replaces the artifact, writes its
/// bytes (rolling back the registration on failure), accumulates the
/// unit's requirements, and propagates to dependents if the artifact
/// changed structurally.
fn apply_output<D: ChangeDetector>(
    ctx: &mut BuildContext,
    detector: &D,
    unit: &Path,
    output: TransformOutput,
    queue: &mut HashSet<PathBuf>,
    processed: &HashSet<PathBuf>,
    report: &mut BuildReport,
) -> Result<PathBuf, FailureKind> {
    // Structural comparison is against the previously persisted state, so
    // it must be captured before the record is replaced.
    let previous = ctx.artifact_state(&output.artifact);
    let changed = detector.is_structural_change(previous.as_ref(), &output.bytes);

    let content = Fingerprint::of(&output.bytes);
    let (capabilities, displaced) = ctx.replace_artifact(
        unit,
        &output.artifact,
        &output.capabilities,
        content,
        &mut report.warnings,
    );

    if let Err(source) = ctx.write_output(&output.artifact, &output.bytes) {
        ctx.rollback_artifact(unit, &output.artifact, displaced);
        return Err(FailureKind::ArtifactWrite {
            artifact: output.artifact,
            source,
        });
    }

    ctx.add_requirements(unit, &output.requirements);

    if changed {
        for dependent in ctx.dependents_of(&capabilities) {
            enqueue(ctx, queue, processed, dependent);
        }
    }
    Ok(output.artifact)
}

/// Adds a unit to the queue unless it was already submitted this build.
/// This is the sole de-duplication gate and the source of termination.
fn enqueue(
    ctx: &mut BuildContext,
    queue: &mut HashSet<PathBuf>,
    processed: &HashSet<PathBuf>,
    unit: PathBuf,
) {
    if processed.contains(&unit) || queue.contains(&unit) {
        return;
    }
    ctx.mark_queued(&unit);
    queue.insert(unit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::BuildOptions;
    use std::collections::HashMap;

    /// Table-driven transformation for tests: each unit maps to scripted
    /// outputs; processing order is recorded.
    #[derive(Default)]
    struct Scripted {
        outputs: HashMap<PathBuf, Vec<TransformOutput>>,
        failures: HashSet<PathBuf>,
        invocations: Vec<PathBuf>,
    }

    impl Scripted {
        fn script(
            &mut self,
            unit: &str,
            artifact: &str,
            provides: &[(&str, &str)],
            requires: &[(&str, &str)],
        ) {
            self.outputs.insert(
                PathBuf::from(unit),
                vec![TransformOutput {
                    artifact: PathBuf::from(artifact),
                    bytes: format!("bytes of {artifact}").into_bytes(),
                    capabilities: provides
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    requirements: requires
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }],
            );
        }
    }

    impl Transform for Scripted {
        fn process(&mut self, unit: &Path) -> Result<Vec<TransformOutput>, TransformError> {
            self.invocations.push(unit.to_path_buf());
            if self.failures.contains(unit) {
                return Err(TransformError::new("scripted failure"));
            }
            Ok(self.outputs.get(unit).cloned().unwrap_or_default())
        }
    }

    /// Detector that reports "changed" for every artifact.
    struct AlwaysChanged;
    impl ChangeDetector for AlwaysChanged {
        fn is_structural_change(&self, _: Option<&ArtifactState>, _: &[u8]) -> bool {
            true
        }
    }

    fn make_ctx() -> (tempfile::TempDir, BuildContext) {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));
        let ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
        (dir, ctx)
    }

    fn set_of(units: &[(&str, &[u8])]) -> SourceSet {
        let mut set = SourceSet::new();
        for (unit, content) in units {
            set.push(*unit, Fingerprint::of(content));
        }
        set
    }

    #[test]
    fn empty_build_runs_zero_passes() {
        let (_dir, mut ctx) = make_ctx();
        let mut scheduler = Scheduler::new(Scripted::default(), AlwaysChanged);
        let report = scheduler.run(&mut ctx, &[]).unwrap();
        assert_eq!(report.passes, 0);
        assert_eq!(report.processed_count(), 0);
        assert!(report.is_clean());
    }

    #[test]
    fn new_units_are_each_processed_once() {
        let (_dir, mut ctx) = make_ctx();
        let mut compiler = Scripted::default();
        compiler.script("src/A.java", "A.class", &[("type", "A")], &[]);
        compiler.script("src/B.java", "B.class", &[("type", "B")], &[("type", "A")]);

        let mut scheduler = Scheduler::new(compiler, AlwaysChanged);
        let sets = [set_of(&[("src/A.java", b"a"), ("src/B.java", b"b")])];
        let report = scheduler.run(&mut ctx, &sets).unwrap();

        assert_eq!(
            report.processed,
            vec![PathBuf::from("src/A.java"), PathBuf::from("src/B.java")]
        );
        let invocations = scheduler.into_transform().invocations;
        assert_eq!(invocations.len(), 2, "at most once per build");
    }

    #[test]
    fn transform_failure_degrades_to_unit_failure() {
        let (_dir, mut ctx) = make_ctx();
        let mut compiler = Scripted::default();
        compiler.script("src/A.java", "A.class", &[("type", "A")], &[]);
        compiler.failures.insert(PathBuf::from("src/B.java"));

        let mut scheduler = Scheduler::new(compiler, AlwaysChanged);
        let sets = [set_of(&[("src/A.java", b"a"), ("src/B.java", b"b")])];
        let report = scheduler.run(&mut ctx, &sets).unwrap();

        // Both were attempted; only B failed, the build completed.
        assert_eq!(report.processed_count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].unit, PathBuf::from("src/B.java"));
        assert_eq!(report.failures[0].pass, 1);
        assert!(ctx.artifact(Path::new("A.class")).is_some());
    }

    #[test]
    fn failed_unit_is_retried_by_the_next_build() {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path().join("state"), dir.path().join("out"));

        {
            let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
            let mut compiler = Scripted::default();
            compiler.failures.insert(PathBuf::from("src/A.java"));
            let mut scheduler = Scheduler::new(compiler, AlwaysChanged);
            let report = scheduler
                .run(&mut ctx, &[set_of(&[("src/A.java", b"a")])])
                .unwrap();
            assert_eq!(report.failures.len(), 1);
            ctx.save().unwrap();
        }

        // Same content, but the failure was not committed: A runs again.
        let mut ctx = BuildContext::load_or_create(&options, "0.1.0").unwrap();
        let mut compiler = Scripted::default();
        compiler.script("src/A.java", "A.class", &[("type", "A")], &[]);
        let mut scheduler = Scheduler::new(compiler, AlwaysChanged);
        let report = scheduler
            .run(&mut ctx, &[set_of(&[("src/A.java", b"a")])])
            .unwrap();
        assert_eq!(report.processed, vec![PathBuf::from("src/A.java")]);
        assert!(report.is_clean());
    }

    #[test]
    fn failed_unit_is_not_resubmitted_within_a_build() {
        let (_dir, mut ctx) = make_ctx();
        let mut compiler = Scripted::default();
        // A provides what B requires; B's processing fails. A's change
        // would re-enqueue B were it not already processed.
        compiler.script("src/A.java", "A.class", &[("type", "A")], &[]);
        compiler.failures.insert(PathBuf::from("src/B.java"));

        let mut scheduler = Scheduler::new(compiler, AlwaysChanged);
        let sets = [set_of(&[("src/A.java", b"a"), ("src/B.java", b"b")])];
        scheduler.run(&mut ctx, &sets).unwrap();

        let invocations = scheduler.into_transform().invocations;
        let b_runs = invocations
            .iter()
            .filter(|u| **u == PathBuf::from("src/B.java"))
            .count();
        assert_eq!(b_runs, 1);
    }

    #[test]
    fn unit_producing_no_artifact_still_counts_as_processed() {
        let (_dir, mut ctx) = make_ctx();
        let mut scheduler = Scheduler::new(Scripted::default(), AlwaysChanged);
        let report = scheduler
            .run(&mut ctx, &[set_of(&[("src/package-info.java", b"p")])])
            .unwrap();
        assert_eq!(
            report.processed,
            vec![PathBuf::from("src/package-info.java")]
        );
        assert!(report.is_clean());
    }

    #[test]
    fn content_change_detector_treats_new_artifact_as_changed() {
        let detector = ContentChange;
        assert!(detector.is_structural_change(None, b"fresh"));

        let state = ArtifactState {
            capabilities: vec![],
            content: Fingerprint::of(b"same"),
        };
        assert!(!detector.is_structural_change(Some(&state), b"same"));
        assert!(detector.is_structural_change(Some(&state), b"different"));
    }

    #[test]
    fn artifact_bytes_land_in_the_output_root() {
        let (_dir, mut ctx) = make_ctx();
        let mut compiler = Scripted::default();
        compiler.script("src/A.java", "classes/A.class", &[("type", "A")], &[]);
        let mut scheduler = Scheduler::new(compiler, AlwaysChanged);
        scheduler
            .run(&mut ctx, &[set_of(&[("src/A.java", b"a")])])
            .unwrap();

        let on_disk =
            std::fs::read(ctx.outputs().path_for(Path::new("classes/A.class"))).unwrap();
        assert_eq!(on_disk, b"bytes of classes/A.class");
    }
}

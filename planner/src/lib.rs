// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
// Arc<Mutex> can be more clear than needing to grok Orderings:
#![allow(clippy::mutex_atomic)]

mod changes;
mod jobs;
mod output_map;
mod remarks;
mod scheduler;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use build_record::{BuildRecord, InputInfo, InputStatus};
use concrete_time::ModTime;
use depgraph::{ChangedNodes, ModuleDepGraph, Provider, Summary};
use fnv::FnvHashSet as HashSet;
use itertools::Itertools;
use parking_lot::Mutex;

pub use crate::changes::InputChange;
pub use crate::jobs::{CompileJobGroup, Job, JobBatcher, JobId, JobKind};
pub use crate::output_map::{OutputFileMap, OutputKind};
pub use crate::remarks::{LogReporter, Reporter};
pub use crate::scheduler::AfterCompile;

use crate::remarks::{basename, compile_descriptor};

/// The planner's recognised options, as the driver passes them through.
#[derive(Clone, Debug, Default)]
pub struct PlannerOptions {
    /// Emit per-job lifecycle lines.
    pub show_job_lifecycle: bool,
    /// Emit queuing/skipping remarks per input.
    pub show_incremental: bool,
    /// Write a GraphViz snapshot of the graph after each integration.
    pub emit_dot_after_integration: bool,
    /// Run the graph's invariant checks after each integration.
    pub verify_after_integration: bool,
    /// Treat every changed input as cascading, not only those the record marks so.
    pub always_rebuild_dependents: bool,
    /// Where dot snapshots land; defaults to the working directory.
    pub dot_output_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Source,
    Other,
}

#[derive(Clone, Debug)]
pub struct InputFile {
    pub path: PathBuf,
    pub kind: InputKind,
}

impl InputFile {
    pub fn source<P: Into<PathBuf>>(path: P) -> InputFile {
        InputFile {
            path: path.into(),
            kind: InputKind::Source,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InputOutcome {
    Scheduled,
    Skipped,
    Succeeded,
    Failed,
}

struct State {
    incremental: bool,
    graph: ModuleDepGraph,
    skipped_groups: BTreeMap<PathBuf, CompileJobGroup>,
    unfinished_jobs: HashSet<JobId>,
    /// Input dates observed by change detection, reused when writing the next build record.
    observed_mtimes: BTreeMap<PathBuf, ModTime>,
    outcomes: BTreeMap<PathBuf, InputOutcome>,
    source_of_provider: BTreeMap<Provider, PathBuf>,
    provider_of_source: BTreeMap<PathBuf, Provider>,
    integrations: usize,
}

///
/// The incremental compilation planner. Construction selects the mandatory first wave of
/// compiles from the prior build record plus change detection; `job_finished` expands the work
/// set as each compile finishes.
///
/// All mutable state lives behind one Mutex, so job-finished events are processed one at a time
/// in arrival order, no matter how concurrently the driver runs the jobs themselves.
///
pub struct Planner {
    options: PlannerOptions,
    reporter: Arc<dyn Reporter>,
    inputs: Vec<InputFile>,
    output_map: Option<OutputFileMap>,
    post_compile_jobs: Vec<Job>,
    first_wave: Vec<Job>,
    state: Mutex<State>,
}

impl Planner {
    pub fn new(
        options: PlannerOptions,
        inputs: Vec<InputFile>,
        build_record: Option<BuildRecord>,
        output_map: Option<OutputFileMap>,
        post_compile_jobs: Vec<Job>,
        batcher: &dyn JobBatcher,
        reporter: Arc<dyn Reporter>,
    ) -> Planner {
        let sources: Vec<PathBuf> = inputs
            .iter()
            .filter(|input| input.kind == InputKind::Source)
            .map(|input| input.path.clone())
            .collect();
        let mut observed_mtimes = BTreeMap::new();
        for source in &sources {
            observed_mtimes.insert(source.clone(), current_mtime(source));
        }

        let planned = plan_incremental(
            &options,
            &sources,
            build_record,
            output_map.as_ref(),
            &observed_mtimes,
            reporter.as_ref(),
        )
        .unwrap_or_else(|reason| {
            reporter.remark(&format!(
                "Incremental compilation has been disabled, because {reason}"
            ));
            Planned {
                incremental: false,
                graph: ModuleDepGraph::new(),
                mandatory: sources.clone(),
                skipped: Vec::new(),
                source_of_provider: BTreeMap::new(),
                provider_of_source: BTreeMap::new(),
                integrations: 0,
            }
        });

        log::debug!(
            "First wave: {}",
            planned.mandatory.iter().map(|p| basename(p)).join(", ")
        );

        let mut state = State {
            incremental: planned.incremental,
            graph: planned.graph,
            skipped_groups: BTreeMap::new(),
            unfinished_jobs: HashSet::default(),
            observed_mtimes,
            outcomes: BTreeMap::new(),
            source_of_provider: planned.source_of_provider,
            provider_of_source: planned.provider_of_source,
            integrations: planned.integrations,
        };
        let mut first_wave = Vec::new();
        for input in &planned.mandatory {
            let group = batcher.compile_group(input);
            state.outcomes.insert(input.clone(), InputOutcome::Scheduled);
            for job in group.jobs {
                state.unfinished_jobs.insert(job.id);
                if options.show_job_lifecycle {
                    log::info!("Queuing {}", job.describe());
                }
                first_wave.push(job);
            }
        }
        for input in &planned.skipped {
            state.outcomes.insert(input.clone(), InputOutcome::Skipped);
            state
                .skipped_groups
                .insert(input.clone(), batcher.compile_group(input));
        }

        Planner {
            options,
            reporter,
            inputs,
            output_map,
            post_compile_jobs,
            first_wave,
            state: Mutex::new(state),
        }
    }

    /// The first-wave jobs, in input order.
    pub fn mandatory_jobs_in_order(&self) -> &[Job] {
        &self.first_wave
    }

    /// Link and other post-compile jobs, passed through untouched.
    pub fn jobs_after_compiles(&self) -> &[Job] {
        &self.post_compile_jobs
    }

    pub fn is_incremental(&self) -> bool {
        self.state.lock().incremental
    }

    /// The inputs not scheduled so far.
    pub fn skipped_inputs(&self) -> Vec<PathBuf> {
        self.state.lock().skipped_groups.keys().cloned().collect()
    }

    ///
    /// The record to persist for the next build. Inputs that compiled successfully or were
    /// skipped are up to date with the date this build observed for them; inputs that were
    /// scheduled but failed or never finished must rebuild (and cascade) next time.
    ///
    pub fn updated_build_record(&self, build_start: SystemTime) -> BuildRecord {
        let state = self.state.lock();
        let mut record = BuildRecord::new(ModTime::from(build_start));
        for input in self
            .inputs
            .iter()
            .filter(|input| input.kind == InputKind::Source)
        {
            let path = &input.path;
            let mod_time = state
                .observed_mtimes
                .get(path)
                .copied()
                .unwrap_or_else(ModTime::now);
            let status = match state.outcomes.get(path) {
                Some(InputOutcome::Skipped) | Some(InputOutcome::Succeeded) => {
                    InputStatus::UpToDate
                }
                Some(InputOutcome::Scheduled) | Some(InputOutcome::Failed) | None => {
                    InputStatus::NeedsCascadingBuild
                }
            };
            record.inputs.insert(path.clone(), InputInfo { status, mod_time });
        }
        record
    }
}

struct Planned {
    incremental: bool,
    graph: ModuleDepGraph,
    mandatory: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
    source_of_provider: BTreeMap<Provider, PathBuf>,
    provider_of_source: BTreeMap<PathBuf, Provider>,
    integrations: usize,
}

///
/// Computes the first wave. `Err` means a precondition for incremental compilation failed and
/// the whole input set must rebuild; the reason becomes the disabling remark.
///
fn plan_incremental(
    options: &PlannerOptions,
    sources: &[PathBuf],
    build_record: Option<BuildRecord>,
    output_map: Option<&OutputFileMap>,
    observed_mtimes: &BTreeMap<PathBuf, ModTime>,
    reporter: &dyn Reporter,
) -> Result<Planned, String> {
    let output_map = output_map.ok_or_else(|| "no output file map was provided".to_owned())?;
    let record = build_record
        .ok_or_else(|| "the prior build record is missing or unreadable".to_owned())?;

    let source_set: BTreeSet<&PathBuf> = sources.iter().collect();
    for prior in record.inputs.keys() {
        if !source_set.contains(prior) {
            return Err(format!("input {} was removed from the build", prior.display()));
        }
    }

    let mut provider_of_source: BTreeMap<PathBuf, Provider> = BTreeMap::new();
    let mut source_of_provider: BTreeMap<Provider, PathBuf> = BTreeMap::new();
    for source in sources {
        let summary_path = output_map.summary_path(source).ok_or_else(|| {
            format!(
                "input {} has no reserved summary file path",
                source.display()
            )
        })?;
        let provider = Provider::new(summary_path);
        if let Some(existing) = source_of_provider.insert(provider.clone(), source.clone()) {
            return Err(format!(
                "inputs {} and {} share the summary file {provider}",
                existing.display(),
                source.display()
            ));
        }
        provider_of_source.insert(source.clone(), provider);
    }

    // Build the initial graph from the summaries previous compiles left behind. An input with no
    // summary has never compiled cleanly and must run; a summary that exists but does not parse
    // poisons the whole graph, so incremental mode shuts off.
    let mut graph = ModuleDepGraph::new();
    let mut integrations = 0;
    let mut missing_summary: BTreeSet<PathBuf> = BTreeSet::new();
    for source in sources {
        let provider = &provider_of_source[source];
        if !provider.path().exists() {
            missing_summary.insert(source.clone());
            continue;
        }
        let summary = Summary::read(provider.path()).map_err(|e| {
            format!(
                "the dependency summary for {} could not be read: {e}",
                source.display()
            )
        })?;
        integrate_checked(options, &mut graph, &mut integrations, provider, source, &summary)?;
    }

    // Classify every input against the record.
    let mut classifications: BTreeMap<PathBuf, InputChange> = BTreeMap::new();
    for source in sources {
        let change = InputChange::classify(record.input(source), observed_mtimes[source]);
        classifications.insert(source.clone(), change);
    }

    let mut mandatory: BTreeSet<PathBuf> = BTreeSet::new();
    let queue = |mandatory: &mut BTreeSet<PathBuf>, input: &Path, message: &str| {
        if mandatory.insert(input.to_owned()) && options.show_incremental {
            reporter.remark(&format!(
                "{message}{}",
                compile_descriptor(input, Some(output_map))
            ));
        }
    };

    // Changed inputs.
    for (source, change) in &classifications {
        if change.requires_compile() {
            let message = match change {
                InputChange::NewlyAdded => "Queuing newly-added input",
                _ => "Queuing changed input",
            };
            queue(&mut mandatory, source, message);
        }
    }

    // Inputs whose external dependencies moved after the prior build began.
    let externals: Vec<PathBuf> = graph.external_dependencies().cloned().collect();
    for external in externals {
        let modified = match std::fs::metadata(&external).and_then(|meta| meta.modified()) {
            Ok(time) => ModTime::from(time),
            Err(e) => {
                log::debug!(
                    "Failed to stat external dependency {}: {e}",
                    external.display()
                );
                continue;
            }
        };
        if modified < record.build_start_time {
            continue;
        }
        let message = format!(
            "Queuing because of external dependency {}",
            basename(&external)
        );
        for provider in graph.find_users_of_external(&external) {
            if let Some(source) = source_of_provider.get(&provider) {
                queue(&mut mandatory, source, &message);
            }
        }
    }

    // Inputs with no summary to integrate.
    for source in &missing_summary {
        queue(&mut mandatory, source, "Queuing input with missing summary");
    }

    // Inputs missing a declared output. (A missing summary was already handled above.)
    for source in sources {
        let missing = output_map
            .outputs_for(source)
            .any(|(kind, output)| kind != OutputKind::Dependencies && !output.exists());
        if missing {
            queue(&mut mandatory, source, "Queuing input with missing output");
        }
    }

    // Speculative dependents of cascading changes: their summaries have not been re-read yet,
    // but starting their compiles alongside the first wave saves a round trip.
    let cascading: Vec<&PathBuf> = classifications
        .iter()
        .filter(|(_, change)| change.cascades(options.always_rebuild_dependents))
        .map(|(source, _)| source)
        .collect();
    for source in cascading {
        let message = format!("Queuing speculative dependent of {}", basename(source));
        let provider = provider_of_source[source].clone();
        for dependent_provider in graph.find_dependents_of(&provider) {
            if let Some(dependent) = source_of_provider.get(&dependent_provider) {
                if dependent != source {
                    queue(&mut mandatory, dependent, &message);
                }
            }
        }
    }

    let mandatory_in_order: Vec<PathBuf> = sources
        .iter()
        .filter(|source| mandatory.contains(*source))
        .cloned()
        .collect();
    let skipped: Vec<PathBuf> = sources
        .iter()
        .filter(|source| !mandatory.contains(*source))
        .cloned()
        .collect();
    if options.show_incremental {
        for source in &skipped {
            reporter.remark(&format!(
                "Skipping input{}",
                compile_descriptor(source, Some(output_map))
            ));
        }
    }

    Ok(Planned {
        incremental: true,
        graph,
        mandatory: mandatory_in_order,
        skipped,
        source_of_provider,
        provider_of_source,
        integrations,
    })
}

///
/// Integrates one summary, honouring the debug options: a dot snapshot after each integration,
/// and invariant verification that is fatal in debug builds but downgrades to an error (and so to
/// a full rebuild) in release builds.
///
fn integrate_checked(
    options: &PlannerOptions,
    graph: &mut ModuleDepGraph,
    integrations: &mut usize,
    provider: &Provider,
    source: &Path,
    summary: &Summary,
) -> Result<ChangedNodes, String> {
    let changed = graph.integrate(provider, source, summary)?;
    *integrations += 1;
    if options.emit_dot_after_integration {
        let ordinal = *integrations;
        let dir = options
            .dot_output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let path = dir.join(format!("deps-after-integration-{ordinal}.dot"));
        if let Err(e) = graph.write_dot(&path) {
            log::warn!("Failed to write graph snapshot {}: {e}", path.display());
        }
    }
    if options.verify_after_integration {
        if let Err(violation) = graph.verify() {
            debug_assert!(false, "Dependency graph invariant violated: {violation}");
            return Err(format!(
                "a dependency graph invariant was violated: {violation}"
            ));
        }
    }
    Ok(changed)
}

fn current_mtime(path: &Path) -> ModTime {
    match std::fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(time) => ModTime::from(time),
        Err(e) => {
            // Dated "now" so it can never match the record and be skipped.
            log::warn!("Failed to stat input {}: {e}", path.display());
            ModTime::now()
        }
    }
}

#[cfg(test)]
mod changes_tests;

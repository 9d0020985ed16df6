// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use depgraph::Summary;
use itertools::Itertools;

use crate::remarks::{basename, compile_descriptor};
use crate::{integrate_checked, InputOutcome, Job, Planner, State};

/// What one job completion released.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AfterCompile {
    /// Newly required jobs, possibly none.
    ReleasedJobs(Vec<Job>),
    /// Nothing released and nothing in flight: compilation is over.
    BuildComplete,
}

impl Planner {
    ///
    /// Handles one finished compile: re-integrates the summaries the compile wrote, traces the
    /// consequences, and releases previously skipped inputs that turned out to be needed.
    ///
    /// This is the planner's single serialising critical section. Events are processed one at a
    /// time in arrival order, no matter how concurrently the driver ran the jobs.
    ///
    pub fn job_finished(&self, job: &Job, exit_code: i32) -> AfterCompile {
        let mut state = self.state.lock();
        state.unfinished_jobs.remove(&job.id);
        if self.options.show_job_lifecycle {
            log::info!("Finished {}", job.describe());
        }

        if exit_code != 0 {
            for input in &job.primary_inputs {
                state.outcomes.insert(input.clone(), InputOutcome::Failed);
            }
            // The driver decides the build's fate; nothing new is released after a failure.
            return AfterCompile::ReleasedJobs(Vec::new());
        }
        for input in &job.primary_inputs {
            state.outcomes.insert(input.clone(), InputOutcome::Succeeded);
        }

        let mut discovered: BTreeSet<PathBuf> = BTreeSet::new();
        if state.incremental {
            for input in &job.primary_inputs {
                match self.sources_to_compile_after(&mut state, input) {
                    Ok(sources) => discovered.extend(sources),
                    Err(err) => {
                        // A summary we cannot re-read leaves us blind to what this compile
                        // changed: schedule everything still skipped.
                        log::warn!("{err}");
                        self.reporter.remark(
                            "failed to read some dependency summaries; compiling everything",
                        );
                        discovered.extend(state.skipped_groups.keys().cloned());
                        break;
                    }
                }
            }
            for input in &job.primary_inputs {
                discovered.remove(input);
            }
            if !discovered.is_empty() {
                log::debug!(
                    "Discovered dependents of {}: {}",
                    job.describe(),
                    discovered.iter().map(|p| basename(p)).join(", ")
                );
            }
        }

        let mut released = Vec::new();
        for input in discovered {
            // Entries already released by an earlier completion are simply gone.
            let Some(group) = state.skipped_groups.remove(&input) else {
                continue;
            };
            if self.options.show_incremental {
                self.reporter.remark(&format!(
                    "Queuing discovered dependent{}",
                    compile_descriptor(&input, self.output_map.as_ref())
                ));
            }
            state.outcomes.insert(input.clone(), InputOutcome::Scheduled);
            for job in group.jobs {
                state.unfinished_jobs.insert(job.id);
                if self.options.show_job_lifecycle {
                    log::info!("Queuing {}", job.describe());
                }
                released.push(job);
            }
        }

        if released.is_empty() && state.unfinished_jobs.is_empty() {
            return AfterCompile::BuildComplete;
        }
        AfterCompile::ReleasedJobs(released)
    }

    /// Re-reads the summary `input`'s compile just wrote, integrates it, and expands the changed
    /// defs into the set of sources that must now compile.
    fn sources_to_compile_after(
        &self,
        state: &mut State,
        input: &Path,
    ) -> Result<BTreeSet<PathBuf>, String> {
        let provider = state
            .provider_of_source
            .get(input)
            .cloned()
            .ok_or_else(|| format!("No summary file is reserved for {}", input.display()))?;
        let summary = Summary::read(provider.path())?;
        let changed = integrate_checked(
            &self.options,
            &mut state.graph,
            &mut state.integrations,
            &provider,
            input,
            &summary,
        )?;
        let providers = state.graph.find_sources_to_recompile(&changed);
        let mut sources = BTreeSet::new();
        for provider in providers {
            match state.source_of_provider.get(&provider) {
                Some(source) => {
                    sources.insert(source.clone());
                }
                None => log::debug!("No input claims the summary file {provider}"),
            }
        }
        Ok(sources)
    }
}

// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::remarks::basename;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobKind {
    Compile,
    AfterCompile,
}

/// One unit of work formed by the driver. The planner treats jobs as opaque apart from their
/// primary inputs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    /// The inputs this job compiles; empty for post-compile work.
    pub primary_inputs: Vec<PathBuf>,
}

impl Job {
    pub fn describe(&self) -> String {
        match self.kind {
            JobKind::Compile => format!(
                "Compiling {}",
                self.primary_inputs.iter().map(|p| basename(p)).join(" ")
            ),
            JobKind::AfterCompile => format!("After-compile job {}", self.id),
        }
    }
}

/// The jobs that compile one primary input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompileJobGroup {
    pub primary: PathBuf,
    pub jobs: Vec<Job>,
}

///
/// Forms the jobs that compile one primary input. The driver owns batching policy and argument
/// formation; the planner only decides which inputs need jobs at all.
///
pub trait JobBatcher {
    fn compile_group(&self, input: &Path) -> CompileJobGroup;
}

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

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use concrete_time::ModTime;
use serde_derive::{Deserialize, Serialize};

pub const BUILD_RECORD_VERSION: u32 = 1;

///
/// The state the previous build left an input in.
///
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputStatus {
    /// Compiled cleanly; skippable while its date still matches.
    UpToDate,
    /// First seen by a build that did not finish it.
    NewlyAdded,
    /// Must rebuild, and its dependents must be scheduled along with it.
    NeedsCascadingBuild,
    /// Must rebuild, by itself.
    NeedsNonCascadingBuild,
}

/// What the previous build recorded for one input.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InputInfo {
    pub status: InputStatus,
    pub mod_time: ModTime,
}

///
/// The persisted state of the previous build: when it started, and what it knew about each input
/// when it exited.
///
/// Dates are whole seconds, matching the on-disk schema; see `concrete_time::ModTime`.
///
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BuildRecord {
    pub version: u32,
    pub build_start_time: ModTime,
    #[serde(default)]
    pub inputs: BTreeMap<PathBuf, InputInfo>,
}

impl BuildRecord {
    pub fn new(build_start_time: ModTime) -> BuildRecord {
        BuildRecord {
            version: BUILD_RECORD_VERSION,
            build_start_time,
            inputs: BTreeMap::new(),
        }
    }

    pub fn read(path: &Path) -> Result<BuildRecord, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read build record {}: {e}", path.display()))?;
        BuildRecord::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<BuildRecord, String> {
        let record: BuildRecord =
            serde_yaml::from_str(contents).map_err(|e| format!("Malformed build record: {e}"))?;
        if record.version != BUILD_RECORD_VERSION {
            return Err(format!(
                "Unrecognized build record version {}",
                record.version
            ));
        }
        Ok(record)
    }

    pub fn write(&self, path: &Path) -> Result<(), String> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to render build record: {e}"))?;
        std::fs::write(path, contents)
            .map_err(|e| format!("Failed to write build record {}: {e}", path.display()))
    }

    pub fn input(&self, path: &Path) -> Option<InputInfo> {
        self.inputs.get(path).copied()
    }
}

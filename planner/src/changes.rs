// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use build_record::{InputInfo, InputStatus};
use concrete_time::ModTime;

///
/// How one input relates to the prior build record: the recorded status combined with a
/// whole-second date comparison.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputChange {
    /// The prior build completed this input and its date still matches: skippable unless
    /// something else drags it in.
    SkipCandidate,
    /// Its date moved since a clean prior build.
    Changed,
    /// Never seen before, or first seen by a build that did not finish.
    NewlyAdded,
    /// The prior build left it needing a rebuild that also schedules its dependents.
    ChangedCascading,
    /// The prior build left it needing a rebuild of itself only.
    ChangedNonCascading,
}

impl InputChange {
    pub fn classify(prior: Option<InputInfo>, current_mtime: ModTime) -> InputChange {
        let Some(prior) = prior else {
            return InputChange::NewlyAdded;
        };
        match prior.status {
            InputStatus::UpToDate if prior.mod_time == current_mtime => InputChange::SkipCandidate,
            InputStatus::UpToDate => InputChange::Changed,
            InputStatus::NewlyAdded => InputChange::NewlyAdded,
            InputStatus::NeedsCascadingBuild => InputChange::ChangedCascading,
            InputStatus::NeedsNonCascadingBuild => InputChange::ChangedNonCascading,
        }
    }

    pub fn requires_compile(self) -> bool {
        self != InputChange::SkipCandidate
    }

    /// Whether dependents are scheduled speculatively, before this input's fresh summary exists.
    pub fn cascades(self, always_rebuild_dependents: bool) -> bool {
        match self {
            InputChange::SkipCandidate => false,
            InputChange::ChangedCascading => true,
            _ => always_rebuild_dependents,
        }
    }
}

// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).
use build_record::{InputInfo, InputStatus};
use concrete_time::ModTime;

use crate::InputChange;

fn info(status: InputStatus, secs: u64) -> InputInfo {
    InputInfo {
        status,
        mod_time: ModTime::new(secs),
    }
}

#[test]
fn up_to_date_with_matching_date_is_skippable() {
    assert_eq!(
        InputChange::classify(Some(info(InputStatus::UpToDate, 100)), ModTime::new(100)),
        InputChange::SkipCandidate
    );
}

#[test]
fn up_to_date_with_moved_date_is_changed() {
    assert_eq!(
        InputChange::classify(Some(info(InputStatus::UpToDate, 100)), ModTime::new(101)),
        InputChange::Changed
    );
    // A date that moved backwards is just as changed.
    assert_eq!(
        InputChange::classify(Some(info(InputStatus::UpToDate, 100)), ModTime::new(99)),
        InputChange::Changed
    );
}

#[test]
fn absent_from_the_record_is_newly_added() {
    assert_eq!(
        InputChange::classify(None, ModTime::new(100)),
        InputChange::NewlyAdded
    );
}

#[test]
fn recorded_statuses_map_to_classifications() {
    // The date is irrelevant for anything but up-to-date.
    assert_eq!(
        InputChange::classify(Some(info(InputStatus::NewlyAdded, 100)), ModTime::new(100)),
        InputChange::NewlyAdded
    );
    assert_eq!(
        InputChange::classify(
            Some(info(InputStatus::NeedsCascadingBuild, 100)),
            ModTime::new(100)
        ),
        InputChange::ChangedCascading
    );
    assert_eq!(
        InputChange::classify(
            Some(info(InputStatus::NeedsNonCascadingBuild, 100)),
            ModTime::new(100)
        ),
        InputChange::ChangedNonCascading
    );
}

#[test]
fn only_cascading_changes_schedule_dependents() {
    assert!(InputChange::ChangedCascading.cascades(false));
    assert!(!InputChange::Changed.cascades(false));
    assert!(!InputChange::ChangedNonCascading.cascades(false));
    assert!(!InputChange::NewlyAdded.cascades(false));
    assert!(!InputChange::SkipCandidate.cascades(false));

    assert!(InputChange::Changed.cascades(true));
    assert!(InputChange::ChangedNonCascading.cascades(true));
    assert!(!InputChange::SkipCandidate.cascades(true));
}

#[test]
fn everything_but_skip_candidates_compiles() {
    assert!(!InputChange::SkipCandidate.requires_compile());
    assert!(InputChange::Changed.requires_compile());
    assert!(InputChange::NewlyAdded.requires_compile());
    assert!(InputChange::ChangedCascading.requires_compile());
    assert!(InputChange::ChangedNonCascading.requires_compile());
}

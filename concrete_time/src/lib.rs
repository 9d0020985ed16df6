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

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_derive::{Deserialize, Serialize};

/// A concrete data representation of a file modification time: whole seconds since the Unix
/// epoch.
///
/// The prior-build record stores dates with whole-second precision, so every comparison in the
/// planner happens on this type. Converting through sub-second or floating-point representations
/// would let filesystem timestamp granularity manufacture spurious rebuilds.
///
/// This type can be serialized with serde, as a bare integer.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ModTime {
    /// Seconds since the Unix epoch, truncated.
    pub secs: u64,
}

impl ModTime {
    pub fn new(secs: u64) -> Self {
        Self { secs }
    }

    /// The current wall-clock time, truncated to whole seconds.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }
}

impl From<SystemTime> for ModTime {
    fn from(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(since_epoch) => since_epoch.as_secs(),
            Err(e) => {
                log::debug!("Invalid ModTime: {:?} before the unix epoch", e.duration());
                0
            }
        };
        Self { secs }
    }
}

impl From<ModTime> for SystemTime {
    fn from(time: ModTime) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(time.secs)
    }
}

#[cfg(test)]
mod tests;

// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;

use hashing::Fingerprint;
use serde_derive::{Deserialize, Serialize};

use crate::key::DependencyKey;

/// One definition listed by a summary: the key the declaration is addressable by, and the content
/// hash of the declaration as of the compile that wrote the summary.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SummaryDef {
    pub key: DependencyKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
}

///
/// The parsed form of a per-source dependency summary: the declarations the source defines, and
/// the keys it uses.
///
/// Summaries are emitted by each compile and re-read by the next planner run (and by the second
/// wave as soon as the compile that wrote one finishes).
///
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Summary {
    #[serde(default)]
    pub defines: Vec<SummaryDef>,
    #[serde(default)]
    pub uses: Vec<DependencyKey>,
}

impl Summary {
    pub fn read(path: &Path) -> Result<Summary, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read dependency summary {}: {e}", path.display()))?;
        Summary::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Summary, String> {
        serde_yaml::from_str(contents).map_err(|e| format!("Malformed dependency summary: {e}"))
    }

    pub fn write(&self, path: &Path) -> Result<(), String> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to render dependency summary: {e}"))?;
        std::fs::write(path, contents)
            .map_err(|e| format!("Failed to write dependency summary {}: {e}", path.display()))
    }
}

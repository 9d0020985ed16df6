// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

/// One kind of artifact an input produces.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    /// The compiled artifact for an input.
    Object,
    /// The per-source dependency summary the next build reads.
    Dependencies,
}

///
/// The driver-supplied mapping from (input path, output kind) to output path. It reserves the
/// summary path for each input and names the artifacts the missing-output rule checks.
///
/// On disk this is JSON: `{"main.swift": {"object": "main.o", "dependencies": "main.deps.yaml"}}`.
///
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutputFileMap {
    entries: BTreeMap<PathBuf, BTreeMap<OutputKind, PathBuf>>,
}

impl OutputFileMap {
    pub fn read(path: &Path) -> Result<OutputFileMap, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read output file map {}: {e}", path.display()))?;
        OutputFileMap::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<OutputFileMap, String> {
        serde_json::from_str(contents).map_err(|e| format!("Malformed output file map: {e}"))
    }

    pub fn insert(&mut self, input: PathBuf, kind: OutputKind, output: PathBuf) {
        self.entries.entry(input).or_default().insert(kind, output);
    }

    pub fn output(&self, input: &Path, kind: OutputKind) -> Option<&Path> {
        self.entries
            .get(input)
            .and_then(|outputs| outputs.get(&kind))
            .map(PathBuf::as_path)
    }

    pub fn outputs_for<'a>(&'a self, input: &Path) -> impl Iterator<Item = (OutputKind, &'a Path)> + 'a {
        self.entries.get(input).into_iter().flat_map(|outputs| {
            outputs
                .iter()
                .map(|(kind, path)| (*kind, path.as_path()))
        })
    }

    /// The summary file reserved for `input`, when the map names one.
    pub fn summary_path(&self, input: &Path) -> Option<&Path> {
        self.output(input, OutputKind::Dependencies)
    }
}

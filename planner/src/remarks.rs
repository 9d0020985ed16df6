// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;

use crate::output_map::{OutputFileMap, OutputKind};

///
/// Sink for user-visible planner diagnostics. All planner output is remark-level; the driver
/// decides how to render it.
///
pub trait Reporter: Send + Sync {
    fn remark(&self, message: &str);
}

/// Forwards remarks to the `log` facade.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn remark(&self, message: &str) {
        log::info!("{message}");
    }
}

pub(crate) fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The trailing job descriptor for a per-input remark:
/// `{compile: <output-basename> <= <input-basename>}`. Omitted when no output-map entry names
/// the input's object file.
pub(crate) fn compile_descriptor(input: &Path, output_map: Option<&OutputFileMap>) -> String {
    match output_map.and_then(|map| map.output(input, OutputKind::Object)) {
        Some(object) => format!(
            " {{compile: {} <= {}}}",
            basename(object),
            basename(input)
        ),
        None => String::new(),
    }
}

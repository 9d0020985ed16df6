// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};

///
/// Whether a key names the externally visible interface of a declaration, or only its
/// implementation. Interface-aspect changes can affect other sources; implementation-aspect
/// changes affect only the defining source.
///
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DeclAspect {
    Interface,
    Implementation,
}

impl fmt::Display for DeclAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclAspect::Interface => write!(f, "interface"),
            DeclAspect::Implementation => write!(f, "implementation"),
        }
    }
}

///
/// The identity portion of a dependency key: which kind of entity is being depended upon, and how
/// it is named.
///
/// A plain tagged sum, deliberately: equality, hashing, and ordering must be total and
/// deterministic, and the derived impls compare the variant first and the content
/// lexicographically after it.
///
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Designator {
    /// A top-level name in the module.
    TopLevel { name: String },
    /// A nominal type, by mangled name.
    Nominal { context: String },
    /// Membership of any kind in a nominal type, for holes like extensions.
    PotentialMember { context: String },
    /// A named member of a nominal type.
    Member { context: String, name: String },
    /// A name looked up dynamically (`AnyObject` style).
    DynamicLookup { name: String },
    /// A module file outside the module being built.
    ExternalDepend { path: PathBuf },
    /// A source file belonging to the module being built.
    SourceFileProvide { path: PathBuf },
}

impl fmt::Display for Designator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Designator::TopLevel { name } => write!(f, "top-level {name}"),
            Designator::Nominal { context } => write!(f, "type {context}"),
            Designator::PotentialMember { context } => write!(f, "potential members of {context}"),
            Designator::Member { context, name } => write!(f, "member {context}.{name}"),
            Designator::DynamicLookup { name } => write!(f, "dynamic lookup {name}"),
            Designator::ExternalDepend { path } => write!(f, "external {}", path.display()),
            Designator::SourceFileProvide { path } => write!(f, "source file {}", path.display()),
        }
    }
}

/// An addressable identity for a declaration or external dependency: an aspect plus a
/// designator.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DependencyKey {
    pub aspect: DeclAspect,
    pub designator: Designator,
}

impl DependencyKey {
    pub fn new(aspect: DeclAspect, designator: Designator) -> DependencyKey {
        DependencyKey { aspect, designator }
    }

    /// The interface-aspect key for a module outside the one being built.
    pub fn external<P: Into<PathBuf>>(path: P) -> DependencyKey {
        DependencyKey {
            aspect: DeclAspect::Interface,
            designator: Designator::ExternalDepend { path: path.into() },
        }
    }

    /// The interface-aspect key under which a source file provides itself.
    pub fn source_file<P: Into<PathBuf>>(path: P) -> DependencyKey {
        DependencyKey {
            aspect: DeclAspect::Interface,
            designator: Designator::SourceFileProvide { path: path.into() },
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.aspect, self.designator)
    }
}

// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use hashing::Fingerprint;

use crate::key::DependencyKey;

/// Identifies the per-source summary file that contributed a node to the graph, by path.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Provider(PathBuf);

impl Provider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Provider {
        Provider(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

// 2^32 nodes is plenty for one module.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> NodeId {
        NodeId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

///
/// A node in the module dependency graph: a declaration addressed by its key, together with the
/// summary file that provided it.
///
/// A node with no provider is an expectation: a reference to a declaration that no known source
/// defines locally (most commonly an external module).
///
/// Two nodes are equal iff their keys and providers are equal. The fingerprint is mutable state
/// and takes no part in identity.
///
#[derive(Clone, Debug)]
pub struct Node {
    key: DependencyKey,
    fingerprint: Option<Fingerprint>,
    provider: Option<Provider>,
}

impl Node {
    pub fn new(
        key: DependencyKey,
        fingerprint: Option<Fingerprint>,
        provider: Option<Provider>,
    ) -> Node {
        Node {
            key,
            fingerprint,
            provider,
        }
    }

    pub fn expectation(key: DependencyKey) -> Node {
        Node {
            key,
            fingerprint: None,
            provider: None,
        }
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    pub fn provider(&self) -> Option<&Provider> {
        self.provider.as_ref()
    }

    pub fn is_expectation(&self) -> bool {
        self.provider.is_none()
    }

    pub(crate) fn set_fingerprint(&mut self, fingerprint: Option<Fingerprint>) {
        self.fingerprint = fingerprint;
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.key == other.key && self.provider == other.provider
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.provider.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{} in {}", self.key, provider),
            None => write!(f, "{} (expectation)", self.key),
        }
    }
}

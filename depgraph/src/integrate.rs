// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use fnv::FnvHashSet as HashSet;
use hashing::Fingerprint;

use crate::finder::NodeFinder;
use crate::key::{DependencyKey, Designator};
use crate::node::{Node, NodeId, Provider};
use crate::summary::Summary;

/// What happened to one def when a summary was integrated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Change {
    Added,
    FingerprintChanged,
    Removed,
}

/// One changed def: the key it is addressable by, what happened to it, and the live node when one
/// still exists.
#[derive(Clone, Debug)]
pub struct ChangedDef {
    pub key: DependencyKey,
    pub change: Change,
    pub node: Option<NodeId>,
}

///
/// The changed nodes produced by integrating one summary: defs added, refingerprinted, or
/// removed. Empty means the summary matched what the graph already knew, and the compile that
/// wrote it has no downstream consequences.
///
#[derive(Clone, Debug, Default)]
pub struct ChangedNodes {
    pub defs: Vec<ChangedDef>,
}

impl ChangedNodes {
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn stats(&self) -> IntegrationResult {
        let mut stats = IntegrationResult::default();
        for def in &self.defs {
            match def.change {
                Change::Added => stats.added += 1,
                Change::FingerprintChanged => stats.changed += 1,
                Change::Removed => stats.removed += 1,
            }
        }
        stats
    }

    fn push(&mut self, key: DependencyKey, change: Change, node: Option<NodeId>) {
        self.defs.push(ChangedDef { key, change, node });
    }
}

/// Totals for one integration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IntegrationResult {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
}

///
/// Merges a freshly parsed summary for `provider` into the graph.
///
/// Defs are diffed against the nodes the provider contributed before; uses are re-anchored on the
/// provider's current defs. Every def node of a source uses every key the source uses: flat
/// summaries make the file the unit of dependency, which over-approximates (safely) the
/// declaration-level arcs a richer format could express.
///
pub(crate) fn integrate(
    finder: &mut NodeFinder,
    traced: &mut HashSet<NodeId>,
    externals: &mut BTreeSet<PathBuf>,
    provider: &Provider,
    source: &Path,
    summary: &Summary,
) -> Result<ChangedNodes, String> {
    let prior = finder.nodes_for(provider);
    let mut changed = ChangedNodes::default();

    // The file's own def must exist to anchor its uses; a summary that omits it gets one
    // synthesized.
    let anchor_key = DependencyKey::source_file(source);
    let mut defs: Vec<(DependencyKey, Option<Fingerprint>)> = summary
        .defines
        .iter()
        .map(|def| (def.key.clone(), def.fingerprint))
        .collect();
    if !defs.iter().any(|(key, _)| *key == anchor_key) {
        defs.push((anchor_key.clone(), None));
    }

    let mut current: BTreeSet<DependencyKey> = BTreeSet::new();
    let mut added: Vec<NodeId> = Vec::new();
    let mut kept: Vec<NodeId> = Vec::new();
    for (key, fingerprint) in defs {
        if !current.insert(key.clone()) {
            log::debug!("{provider} defines {key} more than once; keeping the first");
            continue;
        }
        match prior.get(&key) {
            None => {
                let id = finder.insert(Node::new(key.clone(), fingerprint, Some(provider.clone())))?;
                added.push(id);
                changed.push(key, Change::Added, Some(id));
            }
            Some(&id) => {
                kept.push(id);
                if finder.node(id).fingerprint() != fingerprint {
                    finder.set_fingerprint(id, fingerprint);
                    changed.push(key, Change::FingerprintChanged, Some(id));
                }
            }
        }
    }

    for (key, id) in prior {
        if !current.contains(&key) {
            finder.remove(id);
            traced.remove(&id);
            changed.push(key, Change::Removed, None);
        }
    }

    let anchor = finder
        .find_node(&anchor_key, Some(provider))
        .ok_or_else(|| format!("{provider} has no node for its own source file"))?;
    let new_uses: BTreeSet<DependencyKey> = summary.uses.iter().cloned().collect();
    let old_uses: BTreeSet<DependencyKey> = finder.used_keys(anchor).cloned().collect();

    for key in &new_uses {
        if let Designator::ExternalDepend { path } = &key.designator {
            externals.insert(path.clone());
        }
        if finder.find_node(key, None).is_none() {
            finder.insert(Node::expectation(key.clone()))?;
        }
    }
    // Newly created defs use everything the file uses; surviving defs pick up only the delta.
    for &id in &added {
        for key in &new_uses {
            finder.record_use(key, id)?;
        }
    }
    for &id in &kept {
        for key in new_uses.difference(&old_uses) {
            finder.record_use(key, id)?;
        }
        for key in old_uses.difference(&new_uses) {
            finder.unrecord_use(key, id);
        }
    }

    // A changed def invalidates whatever tracing previously concluded about its users.
    for def in &changed.defs {
        let users: Vec<NodeId> = finder.ordered_uses_of(&def.key).collect();
        for user in users {
            traced.remove(&user);
        }
    }

    Ok(changed)
}

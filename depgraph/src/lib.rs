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

mod finder;
mod integrate;
mod key;
mod node;
mod summary;
mod trace;

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use petgraph::dot;
use petgraph::graph::DiGraph;

pub use crate::finder::NodeFinder;
pub use crate::integrate::{Change, ChangedDef, ChangedNodes, IntegrationResult};
pub use crate::key::{DeclAspect, DependencyKey, Designator};
pub use crate::node::{Node, NodeId, Provider};
pub use crate::summary::{Summary, SummaryDef};

use crate::trace::TracedWalk;

///
/// A persistent, incrementally updated multigraph of declaration-level dependencies for one
/// module.
///
/// Nodes are declarations (or expectations of them) addressed by dependency key and providing
/// summary file; use edges are implicit in the node finder's indices. Integrating a summary diffs
/// it against what the graph already knows; tracing expands changed defs into the set of
/// providers whose sources must recompile.
///
pub struct ModuleDepGraph {
    finder: NodeFinder,
    traced: HashSet<NodeId>,
    externals: BTreeSet<PathBuf>,
}

impl ModuleDepGraph {
    pub fn new() -> ModuleDepGraph {
        ModuleDepGraph {
            finder: NodeFinder::new(),
            traced: HashSet::default(),
            externals: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.finder.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.finder.node(id)
    }

    pub fn find_node(&self, key: &DependencyKey, provider: Option<&Provider>) -> Option<NodeId> {
        self.finder.find_node(key, provider)
    }

    pub fn is_traced(&self, id: NodeId) -> bool {
        self.traced.contains(&id)
    }

    ///
    /// Merges a freshly parsed summary for `provider` into the graph and returns the set of defs
    /// that changed. Empty changes mean the compile that wrote the summary taught us nothing new.
    ///
    pub fn integrate(
        &mut self,
        provider: &Provider,
        source: &Path,
        summary: &Summary,
    ) -> Result<ChangedNodes, String> {
        integrate::integrate(
            &mut self.finder,
            &mut self.traced,
            &mut self.externals,
            provider,
            source,
            summary,
        )
    }

    ///
    /// The transitive set of previously untraced users of the given changed defs, in
    /// breadth-first visit order.
    ///
    pub fn find_untraced_users(&mut self, changed: &ChangedNodes) -> Vec<NodeId> {
        let mut seeds = Vec::new();
        for def in &changed.defs {
            match def.node {
                Some(id) => seeds.push(id),
                // A removed def has no live node. The integration that removed it untraced its
                // users, so seed them directly.
                None => seeds.extend(self.finder.ordered_uses_of(&def.key)),
            }
        }
        TracedWalk::new(&self.finder, &mut self.traced, seeds).collect()
    }

    /// The providers of `nodes`: the summary files whose sources they belong to. Expectation
    /// nodes have no provider and contribute nothing.
    pub fn providers_of(&self, nodes: &[NodeId]) -> BTreeSet<Provider> {
        nodes
            .iter()
            .filter_map(|&id| self.finder.node(id).provider().cloned())
            .collect()
    }

    /// The sources that must recompile because the given defs changed.
    pub fn find_sources_to_recompile(&mut self, changed: &ChangedNodes) -> BTreeSet<Provider> {
        let users = self.find_untraced_users(changed);
        self.providers_of(&users)
    }

    ///
    /// The sources depending, transitively, on anything `provider` defines. Used to schedule the
    /// dependents of a changed source before its fresh summary exists.
    ///
    pub fn find_dependents_of(&mut self, provider: &Provider) -> BTreeSet<Provider> {
        let seeds: Vec<NodeId> = self.finder.nodes_for(provider).into_values().collect();
        let users: Vec<NodeId> =
            TracedWalk::new(&self.finder, &mut self.traced, seeds).collect();
        self.providers_of(&users)
    }

    /// The sources depending, transitively, on the given external module.
    pub fn find_users_of_external(&mut self, external: &Path) -> BTreeSet<Provider> {
        let key = DependencyKey::external(external);
        let seeds: Vec<NodeId> = self.finder.nodes_for_key(&key).collect();
        let users: Vec<NodeId> =
            TracedWalk::new(&self.finder, &mut self.traced, seeds).collect();
        self.providers_of(&users)
    }

    /// Modules outside this one referenced by any integrated summary.
    pub fn external_dependencies(&self) -> impl Iterator<Item = &PathBuf> {
        self.externals.iter()
    }

    /// Checks the finder's indices, and that traced state only covers live nodes.
    pub fn verify(&self) -> Result<(), String> {
        self.finder.verify()?;
        for &id in &self.traced {
            if !self.finder.contains(id) {
                return Err(format!("Traced state covers a removed node ({id:?})"));
            }
        }
        Ok(())
    }

    /// Renders the graph in GraphViz format.
    pub fn emit_dot<W: Write>(&self, f: &mut W) -> io::Result<()> {
        let mut graph: DiGraph<String, &str> = DiGraph::new();
        let mut indices = HashMap::default();
        for (id, node) in self.finder.iter() {
            let traced = if self.traced.contains(&id) {
                " (traced)"
            } else {
                ""
            };
            indices.insert(id, graph.add_node(format!("{node}{traced}")));
        }
        let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
        for (key, user) in self.finder.use_edges() {
            for def in self.finder.nodes_for_key(key) {
                if def != user {
                    edges.push((user, def));
                }
            }
        }
        edges.sort();
        edges.dedup();
        for (user, def) in edges {
            graph.add_edge(indices[&user], indices[&def], "");
        }
        f.write_all(
            format!(
                "{}",
                dot::Dot::with_config(&graph, &[dot::Config::EdgeNoLabel])
            )
            .as_bytes(),
        )
    }

    pub fn write_dot(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut f = BufWriter::new(file);
        self.emit_dot(&mut f)
    }
}

#[cfg(test)]
mod tests;

// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::{BTreeMap, BTreeSet};

use fnv::FnvHashMap as HashMap;
use hashing::Fingerprint;

use crate::key::DependencyKey;
use crate::node::{Node, NodeId, Provider};

/// The nodes currently known for one key: at most one expectation, plus one def per provider.
#[derive(Default)]
struct KeySlots {
    expectation: Option<NodeId>,
    defs: BTreeMap<Provider, NodeId>,
}

///
/// Owns the node storage and the indices that make nodes addressable: by provider, by key, and
/// the use edges indexed by the key they use.
///
/// Use edges are implicit: for each key, `uses_by_def` holds the nodes that use it, keyed by
/// (provider, key) of the user so that iteration order is deterministic.
///
pub struct NodeFinder {
    // Slots are tombstoned rather than reused; the graph lives for a single build.
    nodes: Vec<Option<Node>>,
    by_provider: HashMap<Provider, BTreeMap<DependencyKey, NodeId>>,
    by_key: HashMap<DependencyKey, KeySlots>,
    uses_by_def: HashMap<DependencyKey, BTreeMap<(Provider, DependencyKey), NodeId>>,
    keys_used_by: HashMap<NodeId, BTreeSet<DependencyKey>>,
}

impl NodeFinder {
    pub fn new() -> NodeFinder {
        NodeFinder {
            nodes: Vec::new(),
            by_provider: HashMap::default(),
            by_key: HashMap::default(),
            uses_by_def: HashMap::default(),
            keys_used_by: HashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.index())
            .map_or(false, |slot| slot.is_some())
    }

    /// Only valid for ids that have not been removed.
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.index()]
            .as_ref()
            .expect("NodeId referred to a removed node")
    }

    pub fn find_node(&self, key: &DependencyKey, provider: Option<&Provider>) -> Option<NodeId> {
        let slots = self.by_key.get(key)?;
        match provider {
            Some(provider) => slots.defs.get(provider).copied(),
            None => slots.expectation,
        }
    }

    /// The def nodes of `provider`, keyed by their keys.
    pub fn nodes_for(&self, provider: &Provider) -> BTreeMap<DependencyKey, NodeId> {
        self.by_provider.get(provider).cloned().unwrap_or_default()
    }

    /// All nodes for `key`: the expectation node first, then defs in provider order.
    pub fn nodes_for_key<'a>(&'a self, key: &DependencyKey) -> impl Iterator<Item = NodeId> + 'a {
        let slots = self.by_key.get(key);
        let expectation = slots.and_then(|slots| slots.expectation);
        let defs = slots
            .into_iter()
            .flat_map(|slots| slots.defs.values().copied());
        expectation.into_iter().chain(defs)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|node| (NodeId::new(index), node)))
    }

    pub fn insert(&mut self, node: Node) -> Result<NodeId, String> {
        if self.find_node(node.key(), node.provider()).is_some() {
            return Err(format!("A node for {node} is already present"));
        }
        let id = NodeId::new(self.nodes.len());
        let slots = self.by_key.entry(node.key().clone()).or_default();
        match node.provider() {
            Some(provider) => {
                slots.defs.insert(provider.clone(), id);
                self.by_provider
                    .entry(provider.clone())
                    .or_default()
                    .insert(node.key().clone(), id);
            }
            None => slots.expectation = Some(id),
        }
        self.nodes.push(Some(node));
        Ok(id)
    }

    pub fn remove(&mut self, id: NodeId) -> Node {
        let node = self.nodes[id.index()]
            .take()
            .expect("Removed a node twice");
        if let Some(slots) = self.by_key.get_mut(node.key()) {
            match node.provider() {
                Some(provider) => {
                    slots.defs.remove(provider);
                }
                None => slots.expectation = None,
            }
            if slots.expectation.is_none() && slots.defs.is_empty() {
                self.by_key.remove(node.key());
            }
        }
        if let Some(provider) = node.provider() {
            if let Some(keys) = self.by_provider.get_mut(provider) {
                keys.remove(node.key());
                if keys.is_empty() {
                    self.by_provider.remove(provider);
                }
            }
        }
        if let Some(used) = self.keys_used_by.remove(&id) {
            for key in used {
                if let Some(users) = self.uses_by_def.get_mut(&key) {
                    users.retain(|_, user| *user != id);
                    if users.is_empty() {
                        self.uses_by_def.remove(&key);
                    }
                }
            }
        }
        node
    }

    pub(crate) fn set_fingerprint(&mut self, id: NodeId, fingerprint: Option<Fingerprint>) {
        if let Some(node) = self.nodes[id.index()].as_mut() {
            node.set_fingerprint(fingerprint);
        }
    }

    /// Records that `user` (a def node of some source) uses `def_key`.
    pub fn record_use(&mut self, def_key: &DependencyKey, user: NodeId) -> Result<(), String> {
        let node = self.node(user);
        let provider = node.provider().cloned().ok_or_else(|| {
            format!("A use of {def_key} was recorded for {node}, which has no provider")
        })?;
        let user_key = node.key().clone();
        self.uses_by_def
            .entry(def_key.clone())
            .or_default()
            .insert((provider, user_key), user);
        self.keys_used_by
            .entry(user)
            .or_default()
            .insert(def_key.clone());
        Ok(())
    }

    pub fn unrecord_use(&mut self, def_key: &DependencyKey, user: NodeId) {
        if let Some(users) = self.uses_by_def.get_mut(def_key) {
            users.retain(|_, u| *u != user);
            if users.is_empty() {
                self.uses_by_def.remove(def_key);
            }
        }
        if let Some(keys) = self.keys_used_by.get_mut(&user) {
            keys.remove(def_key);
            if keys.is_empty() {
                self.keys_used_by.remove(&user);
            }
        }
    }

    /// The users of `def_key`, in (provider, key) order. Determinism here is a correctness
    /// requirement: it fixes the order in which tracing discovers work.
    pub fn ordered_uses_of<'a>(
        &'a self,
        def_key: &DependencyKey,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.uses_by_def
            .get(def_key)
            .into_iter()
            .flat_map(|users| users.values().copied())
    }

    /// The keys `id` is recorded as using.
    pub fn used_keys(&self, id: NodeId) -> impl Iterator<Item = &DependencyKey> {
        self.keys_used_by.get(&id).into_iter().flatten()
    }

    /// All use edges, as (used key, user) pairs. Iteration order is unspecified.
    pub fn use_edges(&self) -> impl Iterator<Item = (&DependencyKey, NodeId)> {
        self.uses_by_def
            .iter()
            .flat_map(|(key, users)| users.values().map(move |&user| (key, user)))
    }

    ///
    /// Checks the index invariants: one node per (key, provider), every node indexed exactly
    /// where it must be, and every use entry resolvable to a live node. Debug builds run this
    /// after every integration when asked to.
    ///
    pub fn verify(&self) -> Result<(), String> {
        let mut live = 0_usize;
        let mut provided = 0_usize;
        for (id, node) in self.iter() {
            live += 1;
            let indexed = self.find_node(node.key(), node.provider());
            if indexed != Some(id) {
                return Err(format!(
                    "{node} is not indexed under its key: expected {id:?}, found {indexed:?}"
                ));
            }
            if let Some(provider) = node.provider() {
                provided += 1;
                let by_provider = self
                    .by_provider
                    .get(provider)
                    .and_then(|keys| keys.get(node.key()))
                    .copied();
                if by_provider != Some(id) {
                    return Err(format!("{node} is not indexed under its provider"));
                }
            }
        }

        let by_key_total: usize = self
            .by_key
            .values()
            .map(|slots| slots.defs.len() + usize::from(slots.expectation.is_some()))
            .sum();
        if by_key_total != live {
            return Err(format!(
                "{by_key_total} by-key index entries for {live} live nodes"
            ));
        }
        let by_provider_total: usize = self.by_provider.values().map(|keys| keys.len()).sum();
        if by_provider_total != provided {
            return Err(format!(
                "{by_provider_total} by-provider index entries for {provided} provided nodes"
            ));
        }

        for (key, users) in &self.uses_by_def {
            for ((provider, user_key), &user) in users {
                if !self.contains(user) {
                    return Err(format!("A use of {key} is recorded for a removed node"));
                }
                let node = self.node(user);
                if node.provider() != Some(provider) || node.key() != user_key {
                    return Err(format!("A use of {key} is misfiled under {provider}"));
                }
                if !self
                    .keys_used_by
                    .get(&user)
                    .map_or(false, |keys| keys.contains(key))
                {
                    return Err(format!("A use of {key} by {node} has no reverse entry"));
                }
            }
        }
        for (&id, keys) in &self.keys_used_by {
            if !self.contains(id) {
                return Err("A removed node still has recorded uses".to_owned());
            }
            for key in keys {
                let node = self.node(id);
                let entry = node
                    .provider()
                    .cloned()
                    .map(|provider| (provider, node.key().clone()));
                let present = entry.map_or(false, |entry| {
                    self.uses_by_def
                        .get(key)
                        .map_or(false, |users| users.contains_key(&entry))
                });
                if !present {
                    return Err(format!("A use of {key} by {node} has no forward entry"));
                }
            }
        }
        Ok(())
    }
}

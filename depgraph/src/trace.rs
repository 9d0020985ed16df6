// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::VecDeque;

use fnv::FnvHashSet as HashSet;

use crate::finder::NodeFinder;
use crate::node::NodeId;

///
/// A breadth-first expansion from changed defs to the users that were not previously traced in
/// this build. Implements Iterator; nodes come out in visit order.
///
/// Once a node has been traced, the compiles it implies have already been scheduled, so walks
/// stop there rather than schedule the same work twice. The same guard breaks cycles between
/// mutually dependent sources without extra bookkeeping.
///
pub(crate) struct TracedWalk<'a> {
    finder: &'a NodeFinder,
    traced: &'a mut HashSet<NodeId>,
    deque: VecDeque<NodeId>,
}

impl<'a> TracedWalk<'a> {
    pub(crate) fn new(
        finder: &'a NodeFinder,
        traced: &'a mut HashSet<NodeId>,
        seeds: impl IntoIterator<Item = NodeId>,
    ) -> TracedWalk<'a> {
        TracedWalk {
            finder,
            traced,
            deque: seeds.into_iter().collect(),
        }
    }
}

impl Iterator for TracedWalk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.deque.pop_front() {
            if !self.traced.insert(id) {
                continue;
            }
            let key = self.finder.node(id).key();
            self.deque.extend(self.finder.ordered_uses_of(key));
            return Some(id);
        }
        None
    }
}

// src/dag/traversal.rs

//! Reachability and ordering queries over the adjacency store.
//!
//! Everything here runs on a borrowed [`GraphStore`], i.e. while the caller
//! holds the graph lock, and never mutates it.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::dag::graph::GraphStore;
use crate::types::NodeId;

impl GraphStore {
    /// Breadth-first walk over successors starting at `start`.
    ///
    /// Returns every reachable node exactly once, in discovery order, without
    /// `start` itself.
    pub(crate) fn downstream_bfs(&self, start: &str) -> Vec<NodeId> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut order = Vec::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for next in self.dependents_of(current) {
                if visited.insert(next.as_str()) {
                    order.push(next.clone());
                    queue.push_back(next.as_str());
                }
            }
        }

        order
    }

    /// Shortest directed path `from ~> to` (both ends included), if any.
    pub(crate) fn path_between(&self, from: &str, to: &str) -> Option<Vec<NodeId>> {
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(from);
        parent.insert(from, from);

        while let Some(current) = queue.pop_front() {
            for next in self.dependents_of(current) {
                let next = next.as_str();
                if parent.contains_key(next) {
                    continue;
                }
                parent.insert(next, current);
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while cursor != from {
                        cursor = parent[cursor];
                        path.push(cursor.to_string());
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Topologically order `members`, considering only edges between members.
    ///
    /// Ties are broken by position in `members`, so passing a BFS discovery
    /// order yields "direct dependents first" wherever the edges allow it.
    pub(crate) fn order_members(&self, members: &[NodeId]) -> Vec<NodeId> {
        let rank: HashMap<&str, usize> = members
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut indegree: Vec<usize> = members
            .iter()
            .map(|id| {
                self.dependencies_of(id)
                    .iter()
                    .filter(|dep| rank.contains_key(dep.as_str()))
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse(i)) = ready.pop() {
            let id = &members[i];
            order.push(id.clone());
            for next in self.dependents_of(id) {
                if let Some(&j) = rank.get(next.as_str()) {
                    indegree[j] -= 1;
                    if indegree[j] == 0 {
                        ready.push(Reverse(j));
                    }
                }
            }
        }

        order
    }

    /// Topological order of the whole graph, ties broken by id.
    pub(crate) fn full_order(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.node_ids().cloned().collect();
        ids.sort();
        self.order_members(&ids)
    }
}

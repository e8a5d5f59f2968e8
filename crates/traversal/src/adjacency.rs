//! Adjacency store and the output graph.
//!
//! [`AdjacencyStore`] is the mutable, run-internal structure: one edge set
//! per expanded node, deduplicated by [`EdgeKey`]. [`ReferenceGraph`] is the
//! immutable snapshot handed to renderers once the run ends.

use std::collections::{BTreeMap, HashMap, HashSet};

use graph::{Edge, EdgeKey, NodeKey};

/// Edges leaving one node, deduplicated and kept in insertion order.
#[derive(Debug, Default, Clone)]
struct EdgeSet {
    keys: HashSet<EdgeKey>,
    edges: Vec<Edge>,
}

impl EdgeSet {
    fn insert(&mut self, edge: Edge) -> bool {
        if self.keys.insert(edge.dedup_key()) {
            self.edges.push(edge);
            true
        } else {
            false
        }
    }
}

/// Per-node edge sets built during a run.
#[derive(Debug, Default)]
pub struct AdjacencyStore {
    nodes: HashMap<NodeKey, EdgeSet>,
}

impl AdjacencyStore {
    /// Creates an entry for `key` if none exists.
    pub fn ensure(&mut self, key: &NodeKey) {
        self.nodes.entry(key.clone()).or_default();
    }

    /// Adds `edge` to `source`'s set. Returns `false` for a duplicate.
    pub fn insert(&mut self, source: &NodeKey, edge: Edge) -> bool {
        self.nodes.entry(source.clone()).or_default().insert(edge)
    }

    /// Copies the store into an ordered output graph.
    pub fn to_graph(&self) -> ReferenceGraph {
        ReferenceGraph {
            nodes: self
                .nodes
                .iter()
                .map(|(key, set)| (key.clone(), set.edges.clone()))
                .collect(),
        }
    }
}

/// The result of a traversal: every expanded node and its outgoing edges.
///
/// Nodes are ordered by key. Within a node, edges keep the order they were
/// recorded in; consumers should treat them as a set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceGraph {
    nodes: BTreeMap<NodeKey, Vec<Edge>>,
}

impl ReferenceGraph {
    /// Returns `true` if `key` was expanded (has a header of its own).
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Outgoing edges of `key`, or `None` if it was never expanded.
    pub fn edges(&self, key: &NodeKey) -> Option<&[Edge]> {
        self.nodes.get(key).map(Vec::as_slice)
    }

    /// Iterates nodes and their edges in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &[Edge])> {
        self.nodes.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of expanded nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    /// Returns `true` if no node was expanded.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

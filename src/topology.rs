//! Tree topology seam.
//!
//! The propagation core never owns tree structure - the host render engine
//! does. Everything the core needs is a single upward query, expressed as the
//! [`Topology`] trait. Hosts with their own edge store (parent back-references,
//! arena indices) implement it directly; [`ParentMap`] is a ready-made
//! HashMap-backed store for hosts without one and for tests.

use std::collections::HashMap;

use crate::types::NodeId;

// =============================================================================
// Topology trait
// =============================================================================

/// Read-only view of the host's parent->child edges.
///
/// The parent chain must be acyclic and is expected to reflect the tree as
/// the host currently sees it: calls that follow a structural mutation
/// (`on_reparent` in particular) read the post-mutation chain.
pub trait Topology {
    /// The parent of `node`, or `None` at a root.
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
}

// =============================================================================
// ParentMap
// =============================================================================

/// Minimal child->parent edge store.
///
/// Owned and mutated by the host; the propagation core only ever sees it
/// through [`Topology`].
#[derive(Debug, Default)]
pub struct ParentMap {
    parents: HashMap<NodeId, NodeId>,
}

impl ParentMap {
    /// Create an empty edge store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child` as a child of `parent`. Roots are simply never
    /// inserted.
    pub fn insert(&mut self, child: NodeId, parent: NodeId) {
        self.parents.insert(child, parent);
    }

    /// Move `child` under a new parent.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) {
        self.parents.insert(child, new_parent);
    }

    /// Drop the edge above `node` (on unmount). Edges of its descendants are
    /// removed by their own unmounts.
    pub fn remove(&mut self, node: NodeId) {
        self.parents.remove(&node);
    }

    /// Number of recorded edges.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether no edges are recorded.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl Topology for ParentMap {
    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_map_edges() {
        let root = NodeId::new(0);
        let mid = NodeId::new(1);
        let leaf = NodeId::new(2);

        let mut map = ParentMap::new();
        map.insert(mid, root);
        map.insert(leaf, mid);

        assert_eq!(map.parent_of(root), None);
        assert_eq!(map.parent_of(mid), Some(root));
        assert_eq!(map.parent_of(leaf), Some(mid));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_reparent_and_remove() {
        let a = NodeId::new(0);
        let b = NodeId::new(1);
        let leaf = NodeId::new(2);

        let mut map = ParentMap::new();
        map.insert(leaf, a);
        map.reparent(leaf, b);
        assert_eq!(map.parent_of(leaf), Some(b));

        map.remove(leaf);
        assert_eq!(map.parent_of(leaf), None);
        assert!(map.is_empty());
    }
}

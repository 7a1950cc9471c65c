//! Nearest-ancestor resolution walk.
//!
//! The one unavoidable O(depth) cost in the system. Each helper walks the
//! parent chain upward starting *above* its subject node: a node never
//! observes its own attachment as ancestor-provided, so a provider reading
//! its own binding sees the outer scope (the same way a Provider component
//! reads the context above itself).

use crate::binding::BindingId;
use crate::topology::Topology;
use crate::types::NodeId;

use super::scopes::ScopeTable;

/// The nearest strict ancestor of `node` that attaches `binding`.
pub(crate) fn nearest_provider(
    topology: &dyn Topology,
    scopes: &ScopeTable,
    node: NodeId,
    binding: BindingId,
) -> Option<NodeId> {
    let mut current = topology.parent_of(node);
    while let Some(ancestor) = current {
        if scopes.attaches(ancestor, binding) {
            return Some(ancestor);
        }
        current = topology.parent_of(ancestor);
    }
    None
}

/// Whether `ancestor` lies on the strict parent chain above `node`.
pub(crate) fn is_ancestor(topology: &dyn Topology, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = topology.parent_of(node);
    while let Some(step) = current {
        if step == ancestor {
            return true;
        }
        current = topology.parent_of(step);
    }
    false
}

/// Whether `candidate` would win nearest-ancestor resolution for `consumer`
/// over its currently cached provider.
///
/// Walking up from the consumer, whichever of the two is met first wins; a
/// consumer with no cached provider is shadowed by any ancestor candidate.
pub(crate) fn shadows(
    topology: &dyn Topology,
    consumer: NodeId,
    candidate: NodeId,
    current: Option<NodeId>,
) -> bool {
    let mut step = topology.parent_of(consumer);
    while let Some(ancestor) = step {
        if ancestor == candidate {
            return true;
        }
        if Some(ancestor) == current {
            return false;
        }
        step = topology.parent_of(ancestor);
    }
    false
}

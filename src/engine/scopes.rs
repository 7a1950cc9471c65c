//! Scope table - per-node (binding -> value) attachments.
//!
//! Values are stored type-erased; the typed [`Binding`](crate::Binding) API
//! on [`ContextTree`](super::ContextTree) is the only way in or out, so a
//! stored value always downcasts to its binding's type.
//!
//! Each entry carries a revision counter mirrored into a
//! `spark_signals::Signal`. Resolving through the tree reads that signal, so
//! host deriveds and effects re-run when a provided value is replaced -
//! one signal per attachment, the same fine-grained shape the rest of the
//! spark stack uses.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::{signal, Signal};

use crate::binding::BindingId;
use crate::error::ScopeError;
use crate::types::NodeId;

// =============================================================================
// ScopeEntry
// =============================================================================

struct ScopeEntry {
    value: Rc<dyn Any>,
    revision: u64,
    revision_signal: Signal<u64>,
}

impl ScopeEntry {
    fn new(value: Rc<dyn Any>) -> Self {
        Self {
            value,
            revision: 0,
            revision_signal: signal(0u64),
        }
    }

    fn swap(&mut self, value: Rc<dyn Any>) -> RevisionBump {
        self.value = value;
        self.revision += 1;
        RevisionBump {
            signal: self.revision_signal.clone(),
            revision: self.revision,
        }
    }
}

/// Deferred revision-signal write handed back by [`ScopeTable::replace`].
///
/// Setting a signal re-runs subscribed effects synchronously, and those may
/// resolve back through the tree. The caller fires the bump only after every
/// borrow on the table has been released.
#[derive(Debug)]
pub(crate) struct RevisionBump {
    signal: Signal<u64>,
    revision: u64,
}

impl RevisionBump {
    /// Publish the new revision to reactive readers.
    pub(crate) fn fire(self) {
        self.signal.set(self.revision);
    }
}

// =============================================================================
// ScopeTable
// =============================================================================

/// All attachments of one tree, keyed node-first.
pub(crate) struct ScopeTable {
    nodes: HashMap<NodeId, HashMap<BindingId, ScopeEntry>>,
}

impl ScopeTable {
    pub(crate) fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Whether `node` currently attaches `binding`.
    pub(crate) fn attaches(&self, node: NodeId, binding: BindingId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|entries| entries.contains_key(&binding))
    }

    /// Record that `node` supplies `value` for `binding` to its subtree.
    pub(crate) fn attach(
        &mut self,
        node: NodeId,
        binding: BindingId,
        value: Rc<dyn Any>,
    ) -> Result<(), ScopeError> {
        let entries = self.nodes.entry(node).or_default();
        if entries.contains_key(&binding) {
            return Err(ScopeError::DuplicateAttachment { node, binding });
        }
        entries.insert(binding, ScopeEntry::new(value));
        Ok(())
    }

    /// Swap the attached value. The returned bump publishes the new revision
    /// to reactive readers; fire it after releasing the table borrow.
    pub(crate) fn replace(
        &mut self,
        node: NodeId,
        binding: BindingId,
        value: Rc<dyn Any>,
    ) -> Result<RevisionBump, ScopeError> {
        let entry = self
            .nodes
            .get_mut(&node)
            .and_then(|entries| entries.get_mut(&binding))
            .ok_or(ScopeError::NotAttached { node, binding })?;
        Ok(entry.swap(value))
    }

    /// Remove the attachment.
    pub(crate) fn detach(&mut self, node: NodeId, binding: BindingId) -> Result<(), ScopeError> {
        let entries = self
            .nodes
            .get_mut(&node)
            .ok_or(ScopeError::NotAttached { node, binding })?;
        if entries.remove(&binding).is_none() {
            return Err(ScopeError::NotAttached { node, binding });
        }
        if entries.is_empty() {
            self.nodes.remove(&node);
        }
        Ok(())
    }

    /// Remove every attachment at `node` (it unmounted), returning the
    /// bindings it supplied.
    pub(crate) fn detach_all(&mut self, node: NodeId) -> Vec<BindingId> {
        match self.nodes.remove(&node) {
            Some(entries) => entries.into_keys().collect(),
            None => Vec::new(),
        }
    }

    /// The value currently attached for (node, binding).
    pub(crate) fn value(&self, node: NodeId, binding: BindingId) -> Option<Rc<dyn Any>> {
        self.nodes
            .get(&node)
            .and_then(|entries| entries.get(&binding))
            .map(|entry| entry.value.clone())
    }

    /// Read the entry's revision signal so the calling reactive scope tracks
    /// replacements of this attachment.
    pub(crate) fn track(&self, node: NodeId, binding: BindingId) {
        if let Some(entry) = self.nodes.get(&node).and_then(|entries| entries.get(&binding)) {
            let _ = entry.revision_signal.get();
        }
    }

    /// Total number of attachments across all nodes.
    pub(crate) fn attachment_count(&self) -> usize {
        self.nodes.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erased<T: 'static>(value: T) -> Rc<dyn Any> {
        Rc::new(value)
    }

    fn read<T: Clone + 'static>(table: &ScopeTable, node: NodeId, binding: BindingId) -> Option<T> {
        table
            .value(node, binding)
            .and_then(|rc| rc.downcast_ref::<T>().cloned())
    }

    #[test]
    fn test_attach_then_read() {
        let node = NodeId::new(0);
        let binding = crate::Binding::<String>::new().id();

        let mut table = ScopeTable::new();
        assert!(!table.attaches(node, binding));

        table.attach(node, binding, erased("dark".to_string())).unwrap();
        assert!(table.attaches(node, binding));
        assert_eq!(read::<String>(&table, node, binding), Some("dark".to_string()));
        assert_eq!(table.attachment_count(), 1);
    }

    #[test]
    fn test_duplicate_attach_rejected() {
        let node = NodeId::new(0);
        let binding = crate::Binding::<u32>::new().id();

        let mut table = ScopeTable::new();
        table.attach(node, binding, erased(1u32)).unwrap();
        assert_eq!(
            table.attach(node, binding, erased(2u32)),
            Err(ScopeError::DuplicateAttachment { node, binding })
        );
        // Original value untouched.
        assert_eq!(read::<u32>(&table, node, binding), Some(1));
    }

    #[test]
    fn test_replace_swaps_value() {
        let node = NodeId::new(0);
        let binding = crate::Binding::<u32>::new().id();

        let mut table = ScopeTable::new();
        assert_eq!(
            table.replace(node, binding, erased(2u32)).unwrap_err(),
            ScopeError::NotAttached { node, binding }
        );

        table.attach(node, binding, erased(1u32)).unwrap();
        table.replace(node, binding, erased(2u32)).unwrap().fire();
        assert_eq!(read::<u32>(&table, node, binding), Some(2));
    }

    #[test]
    fn test_detach_removes_mapping() {
        let node = NodeId::new(0);
        let binding = crate::Binding::<u32>::new().id();

        let mut table = ScopeTable::new();
        table.attach(node, binding, erased(1u32)).unwrap();
        table.detach(node, binding).unwrap();

        assert!(!table.attaches(node, binding));
        assert_eq!(
            table.detach(node, binding),
            Err(ScopeError::NotAttached { node, binding })
        );
        assert_eq!(table.attachment_count(), 0);
    }

    #[test]
    fn test_detach_all_returns_supplied_bindings() {
        let node = NodeId::new(0);
        let a = crate::Binding::<u32>::new().id();
        let b = crate::Binding::<u32>::new().id();

        let mut table = ScopeTable::new();
        table.attach(node, a, erased(1u32)).unwrap();
        table.attach(node, b, erased(2u32)).unwrap();

        let mut dropped = table.detach_all(node);
        dropped.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(dropped, expected);
        assert_eq!(table.attachment_count(), 0);
        assert!(table.detach_all(node).is_empty());
    }

    #[test]
    fn test_revision_signal_tracks_replacement() {
        use std::cell::Cell;
        use std::rc::Rc;

        use spark_signals::effect;

        let node = NodeId::new(0);
        let binding = crate::Binding::<u32>::new().id();

        let table = Rc::new(std::cell::RefCell::new(ScopeTable::new()));
        table.borrow_mut().attach(node, binding, erased(1u32)).unwrap();

        let runs = Rc::new(Cell::new(0));
        let runs_probe = runs.clone();
        let table_probe = table.clone();
        let _stop = effect(move || {
            table_probe.borrow().track(node, binding);
            runs_probe.set(runs_probe.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        // Fire outside the borrow, the way the engine does: the effect
        // re-runs synchronously and reads the table again.
        let bump = table.borrow_mut().replace(node, binding, erased(2u32)).unwrap();
        bump.fire();
        assert_eq!(runs.get(), 2);
    }
}

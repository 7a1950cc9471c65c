//! Propagation engine - the per-tree facade the host render engine drives.
//!
//! A [`ContextTree`] owns the scope table and the subscription registry for
//! one component tree. The host calls `attach`/`replace`/`detach` from its
//! mount/update/unmount lifecycle, `resolve` while evaluating a consuming
//! node, and `on_unmount`/`on_reparent` from its tree-mutation hooks. Tree
//! topology stays host-owned; every call that needs ancestry takes a
//! [`Topology`] reference.
//!
//! All mutation happens synchronously inside the calling update pass. Wrap
//! several mutations in [`ContextTree::update`] to coalesce notifications:
//! each affected consumer is delivered to the scheduler hook exactly once
//! per pass, however many intermediate values were written.

mod resolver;
mod scopes;
mod subscriptions;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::binding::Binding;
use crate::error::ScopeError;
use crate::topology::Topology;
use crate::types::{NodeId, Resolution, SubscriptionState};

#[cfg(feature = "tracing")]
use crate::logging::{debug, trace};
#[cfg(not(feature = "tracing"))]
use crate::{debug, trace};

use scopes::ScopeTable;
use subscriptions::{PendingSet, SubscriptionRegistry};

type Scheduler = Box<dyn FnMut(NodeId)>;

// =============================================================================
// ContextTree
// =============================================================================

/// Scoped value propagation state for a single component tree.
///
/// Create one per mounted tree; independent trees share nothing. All methods
/// take `&self` - state lives behind interior mutability so the host can
/// thread one handle through its whole update cycle.
pub struct ContextTree {
    scopes: RefCell<ScopeTable>,
    registry: RefCell<SubscriptionRegistry>,
    pending: RefCell<PendingSet>,
    scheduler: RefCell<Option<Scheduler>>,
    depth: Cell<u32>,
    flushing: Cell<bool>,
}

impl ContextTree {
    /// Create an empty tree with no attachments, subscriptions, or scheduler.
    pub fn new() -> Self {
        Self {
            scopes: RefCell::new(ScopeTable::new()),
            registry: RefCell::new(SubscriptionRegistry::new()),
            pending: RefCell::new(PendingSet::new()),
            scheduler: RefCell::new(None),
            depth: Cell::new(0),
            flushing: Cell::new(false),
        }
    }

    /// Install the host's re-evaluation hook.
    ///
    /// The hook is invoked once per marked consumer when an update pass
    /// flushes, before the outermost mutating call returns, so the host can
    /// re-evaluate the node within the current update. The hook may call
    /// back into the tree; mutations it performs are absorbed into the same
    /// flush.
    pub fn set_scheduler(&self, hook: impl FnMut(NodeId) + 'static) {
        *self.scheduler.borrow_mut() = Some(Box::new(hook));
    }

    /// Run `f` as one logical update pass.
    ///
    /// Passes nest; notifications queued by mutations inside are delivered
    /// once, coalesced, when the outermost pass ends. Mutating calls made
    /// outside any pass flush before they return.
    pub fn update<R>(&self, f: impl FnOnce() -> R) -> R {
        self.depth.set(self.depth.get() + 1);
        let out = f();
        self.depth.set(self.depth.get() - 1);
        self.maybe_flush();
        out
    }

    // =========================================================================
    // Provider lifecycle
    // =========================================================================

    /// Record that `node` supplies `value` for `binding` to its subtree.
    ///
    /// Fails with [`ScopeError::DuplicateAttachment`] if `node` already
    /// attaches `binding`; use [`replace`](Self::replace) to swap values.
    /// Consumers of the same binding whose resolution the new provider
    /// shadows are invalidated and scheduled.
    pub fn attach<T: 'static>(
        &self,
        topology: &dyn Topology,
        node: NodeId,
        binding: &Binding<T>,
        value: T,
    ) -> Result<(), ScopeError> {
        let id = binding.id();
        self.scopes.borrow_mut().attach(node, id, Rc::new(value))?;
        debug!(node = node.raw(), binding = id.raw(), "attach");

        // Consumers bound to no provider, or to a farther ancestor on the
        // same path, now resolve here instead.
        let subscribers = self.registry.borrow().subscribers_of(id);
        let mut affected = Vec::new();
        for (consumer, provider) in subscribers {
            if provider == Some(node) {
                continue;
            }
            if resolver::shadows(topology, consumer, node, provider) {
                affected.push(consumer);
            }
        }
        if !affected.is_empty() {
            let mut registry = self.registry.borrow_mut();
            let mut pending = self.pending.borrow_mut();
            for consumer in affected {
                registry.invalidate(consumer, id);
                pending.push(consumer);
            }
        }

        self.maybe_flush();
        Ok(())
    }

    /// Atomically swap the value `node` supplies for `binding` and notify
    /// exactly the consumers currently bound to this attachment.
    ///
    /// Fails with [`ScopeError::NotAttached`] if no attachment exists.
    pub fn replace<T: 'static>(
        &self,
        node: NodeId,
        binding: &Binding<T>,
        value: T,
    ) -> Result<(), ScopeError> {
        let id = binding.id();
        let bump = self.scopes.borrow_mut().replace(node, id, Rc::new(value))?;
        debug!(node = node.raw(), binding = id.raw(), "replace");

        let notified = self.registry.borrow_mut().mark_replaced(node, id);
        let mut pending = self.pending.borrow_mut();
        for consumer in notified {
            pending.push(consumer);
        }
        drop(pending);

        // Publishes the new revision; host effects tracking this attachment
        // re-run synchronously here, with no table borrow outstanding.
        bump.fire();

        self.maybe_flush();
        Ok(())
    }

    /// Remove the attachment; bound consumers are scheduled and re-resolve
    /// to the next-nearest ancestor (or to the default / absence) on their
    /// next read.
    ///
    /// Fails with [`ScopeError::NotAttached`] if no attachment exists.
    pub fn detach<T>(&self, node: NodeId, binding: &Binding<T>) -> Result<(), ScopeError> {
        let id = binding.id();
        self.scopes.borrow_mut().detach(node, id)?;
        debug!(node = node.raw(), binding = id.raw(), "detach");

        let demoted = self.registry.borrow_mut().demote_provider(node, id);
        let mut pending = self.pending.borrow_mut();
        for consumer in demoted {
            pending.push(consumer);
        }
        drop(pending);

        self.maybe_flush();
        Ok(())
    }

    /// Whether `node` currently attaches `binding`.
    pub fn attaches<T>(&self, node: NodeId, binding: &Binding<T>) -> bool {
        self.scopes.borrow().attaches(node, binding.id())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve `binding` from `node`'s position: nearest ancestor wins.
    ///
    /// The first call walks the parent chain (O(depth)) and records a
    /// subscription; repeated calls without intervening mutation reuse the
    /// cached provider without re-walking and keep a single subscription
    /// entry. Reading a provided value tracks its revision signal, so host
    /// deriveds and effects re-run on replacement.
    ///
    /// A node never observes its own attachment; a provider resolving its
    /// own binding sees the scope above itself.
    pub fn resolve<T: Clone + 'static>(
        &self,
        topology: &dyn Topology,
        node: NodeId,
        binding: &Binding<T>,
    ) -> Resolution<T> {
        let id = binding.id();

        // Fast path: a cached subscription whose provider still attaches
        // (or a still-valid default/absent resolution).
        let cached = {
            let registry = self.registry.borrow();
            match registry.get(node, id) {
                Some(sub) => match (sub.state, sub.provider) {
                    (SubscriptionState::Bound | SubscriptionState::Notified, Some(provider))
                        if self.scopes.borrow().attaches(provider, id) =>
                    {
                        Some(Some(provider))
                    }
                    (SubscriptionState::Bound, None) => Some(None),
                    _ => None,
                },
                None => None,
            }
        };

        if let Some(provider) = cached {
            trace!(node = node.raw(), binding = id.raw(), "resolve cache hit");
            self.registry.borrow_mut().rebind(node, id);
            return self.read(provider, binding);
        }

        let provider = {
            let scopes = self.scopes.borrow();
            resolver::nearest_provider(topology, &scopes, node, id)
        };
        trace!(
            node = node.raw(),
            binding = id.raw(),
            provider = provider.map(NodeId::raw),
            "resolve walk"
        );
        self.registry.borrow_mut().bind(node, id, provider);
        self.read(provider, binding)
    }

    /// Number of live subscriptions (diagnostics and tests).
    pub fn subscription_count(&self) -> usize {
        self.registry.borrow().subscription_count()
    }

    /// Number of attachments across all nodes (diagnostics and tests).
    pub fn attachment_count(&self) -> usize {
        self.scopes.borrow().attachment_count()
    }

    fn read<T: Clone + 'static>(
        &self,
        provider: Option<NodeId>,
        binding: &Binding<T>,
    ) -> Resolution<T> {
        match provider {
            Some(provider) => {
                let scopes = self.scopes.borrow();
                scopes.track(provider, binding.id());
                let value = scopes
                    .value(provider, binding.id())
                    .and_then(|stored| stored.downcast_ref::<T>().cloned())
                    .expect("scope entry downcasts to its binding's type");
                Resolution::Provided { value, provider }
            }
            None => match binding.default_value() {
                Some(value) => Resolution::Default(value),
                None => Resolution::Absent,
            },
        }
    }

    // =========================================================================
    // Tree-mutation lifecycle
    // =========================================================================

    /// The host unmounted `node`.
    ///
    /// Drops every subscription `node` owns, cancels any pending delivery to
    /// it (a notification never fires against an unmounted consumer), and
    /// detaches everything `node` provided, demoting its subscribers so they
    /// re-resolve to the next-nearest ancestor.
    pub fn on_unmount(&self, node: NodeId) {
        debug!(node = node.raw(), "unmount");
        self.pending.borrow_mut().remove(node);
        self.registry.borrow_mut().drop_consumer(node);

        let supplied = self.scopes.borrow_mut().detach_all(node);
        if !supplied.is_empty() {
            let mut demoted = Vec::new();
            {
                let mut registry = self.registry.borrow_mut();
                for binding in supplied {
                    demoted.extend(registry.demote_provider(node, binding));
                }
            }
            let mut pending = self.pending.borrow_mut();
            for consumer in demoted {
                pending.push(consumer);
            }
        }

        self.maybe_flush();
    }

    /// The host moved `node` (and its subtree) to a new parent; call after
    /// the topology reflects the move.
    ///
    /// Cached subscriptions of `node` and of every subscribed node now below
    /// it go stale - nearest-ancestor resolution may differ - and their
    /// owners are scheduled for re-evaluation.
    pub fn on_reparent(&self, topology: &dyn Topology, node: NodeId) {
        debug!(node = node.raw(), "reparent");
        let consumers = self.registry.borrow().consumers();
        let moved: Vec<NodeId> = consumers
            .into_iter()
            .filter(|&consumer| {
                consumer == node || resolver::is_ancestor(topology, node, consumer)
            })
            .collect();

        if !moved.is_empty() {
            let mut registry = self.registry.borrow_mut();
            let mut pending = self.pending.borrow_mut();
            for consumer in moved {
                for binding in registry.bindings_for(consumer) {
                    registry.invalidate(consumer, binding);
                }
                pending.push(consumer);
            }
        }

        self.maybe_flush();
    }

    // =========================================================================
    // Flush
    // =========================================================================

    fn maybe_flush(&self) {
        if self.depth.get() > 0 || self.flushing.get() {
            return;
        }
        if self.pending.borrow().is_empty() {
            return;
        }

        self.flushing.set(true);
        loop {
            let next = self.pending.borrow_mut().pop();
            let Some(node) = next else { break };
            trace!(node = node.raw(), "deliver");

            // Take the hook out so it can call back into the tree.
            let hook = self.scheduler.borrow_mut().take();
            if let Some(mut hook) = hook {
                hook(node);
                let mut slot = self.scheduler.borrow_mut();
                // A hook installed from inside the callback wins.
                if slot.is_none() {
                    *slot = Some(hook);
                }
            }
        }
        self.flushing.set(false);
    }
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

//! Subscription registry - who depends on which provider, and the pending
//! re-evaluation set.
//!
//! Three indexes are kept consistent by every mutator before it returns:
//! - by consumer: the resolution cache and the unmount path
//! - by (provider, binding): O(subscriber-count) notification on replace
//! - by binding: attach-time revalidation of consumers the new provider
//!   may shadow
//!
//! State machine per subscription: `Unresolved -> Bound -> [Notified ->
//! Bound | Stale -> Unresolved]`. `Unresolved` is the absence of an entry.
//! A `Stale` subscription never delivers a notification; the consumer
//! re-walks the tree on its next read.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::binding::BindingId;
use crate::types::{NodeId, SubscriptionState};

// =============================================================================
// Subscription
// =============================================================================

/// One consumer's cached resolution of one binding.
pub(crate) struct Subscription {
    /// The ancestor satisfying the resolution; `None` when the consumer
    /// resolved to the binding's default or to absence.
    pub(crate) provider: Option<NodeId>,
    pub(crate) state: SubscriptionState,
}

// =============================================================================
// SubscriptionRegistry
// =============================================================================

pub(crate) struct SubscriptionRegistry {
    by_consumer: HashMap<NodeId, HashMap<BindingId, Subscription>>,
    by_provider: HashMap<(NodeId, BindingId), HashSet<NodeId>>,
    by_binding: HashMap<BindingId, HashSet<NodeId>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            by_consumer: HashMap::new(),
            by_provider: HashMap::new(),
            by_binding: HashMap::new(),
        }
    }

    /// Record (or refresh) the subscription produced by a resolve. Keeps at
    /// most one entry per (consumer, binding).
    pub(crate) fn bind(&mut self, consumer: NodeId, binding: BindingId, provider: Option<NodeId>) {
        // Drop the reverse index for a previous provider before rebinding.
        let previous = self
            .by_consumer
            .get(&consumer)
            .and_then(|subs| subs.get(&binding))
            .and_then(|sub| sub.provider);
        if previous != provider {
            if let Some(old) = previous {
                self.unindex_provider(old, binding, consumer);
            }
        }

        self.by_consumer.entry(consumer).or_default().insert(
            binding,
            Subscription {
                provider,
                state: SubscriptionState::Bound,
            },
        );
        self.by_binding.entry(binding).or_default().insert(consumer);
        if let Some(provider) = provider {
            self.by_provider
                .entry((provider, binding))
                .or_default()
                .insert(consumer);
        }
    }

    pub(crate) fn get(&self, consumer: NodeId, binding: BindingId) -> Option<&Subscription> {
        self.by_consumer
            .get(&consumer)
            .and_then(|subs| subs.get(&binding))
    }

    /// Re-enter `Bound` after a fast-path revalidation.
    pub(crate) fn rebind(&mut self, consumer: NodeId, binding: BindingId) {
        if let Some(sub) = self
            .by_consumer
            .get_mut(&consumer)
            .and_then(|subs| subs.get_mut(&binding))
        {
            sub.state = SubscriptionState::Bound;
        }
    }

    /// The provider replaced its value: mark every live subscriber `Notified`
    /// and return them for scheduling. Stale subscriptions are skipped -
    /// they never deliver.
    pub(crate) fn mark_replaced(&mut self, provider: NodeId, binding: BindingId) -> Vec<NodeId> {
        let Some(consumers) = self.by_provider.get(&(provider, binding)) else {
            return Vec::new();
        };
        let consumers: Vec<NodeId> = consumers.iter().copied().collect();

        let mut notified = Vec::new();
        for consumer in consumers {
            if let Some(sub) = self
                .by_consumer
                .get_mut(&consumer)
                .and_then(|subs| subs.get_mut(&binding))
            {
                if sub.state == SubscriptionState::Stale {
                    continue;
                }
                sub.state = SubscriptionState::Notified;
                notified.push(consumer);
            }
        }
        notified
    }

    /// The provider detached (or unmounted): its subscribers go `Stale` and
    /// must re-walk on next read. Returns them for scheduling.
    pub(crate) fn demote_provider(&mut self, provider: NodeId, binding: BindingId) -> Vec<NodeId> {
        let Some(consumers) = self.by_provider.remove(&(provider, binding)) else {
            return Vec::new();
        };

        let mut demoted = Vec::new();
        for consumer in consumers {
            if let Some(sub) = self
                .by_consumer
                .get_mut(&consumer)
                .and_then(|subs| subs.get_mut(&binding))
            {
                sub.provider = None;
                sub.state = SubscriptionState::Stale;
                demoted.push(consumer);
            }
        }
        demoted
    }

    /// Every consumer subscribed to `binding`, with its cached provider.
    /// Used by attach to find subscriptions the new provider shadows.
    pub(crate) fn subscribers_of(&self, binding: BindingId) -> Vec<(NodeId, Option<NodeId>)> {
        let Some(consumers) = self.by_binding.get(&binding) else {
            return Vec::new();
        };
        consumers
            .iter()
            .filter_map(|&consumer| {
                self.get(consumer, binding)
                    .map(|sub| (consumer, sub.provider))
            })
            .collect()
    }

    /// Ancestry changed for this (consumer, binding): the cache is no longer
    /// trustworthy.
    pub(crate) fn invalidate(&mut self, consumer: NodeId, binding: BindingId) {
        let dropped = self
            .by_consumer
            .get_mut(&consumer)
            .and_then(|subs| subs.get_mut(&binding))
            .map(|sub| {
                sub.state = SubscriptionState::Stale;
                sub.provider.take()
            });
        if let Some(Some(provider)) = dropped {
            self.unindex_provider(provider, binding, consumer);
        }
    }

    /// All bindings `consumer` currently subscribes to.
    pub(crate) fn bindings_for(&self, consumer: NodeId) -> Vec<BindingId> {
        self.by_consumer
            .get(&consumer)
            .map(|subs| subs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every node that currently holds at least one subscription.
    pub(crate) fn consumers(&self) -> Vec<NodeId> {
        self.by_consumer.keys().copied().collect()
    }

    /// The consumer unmounted: prune everything it owns, synchronously.
    pub(crate) fn drop_consumer(&mut self, consumer: NodeId) {
        let Some(subs) = self.by_consumer.remove(&consumer) else {
            return;
        };
        for (binding, sub) in subs {
            if let Some(listeners) = self.by_binding.get_mut(&binding) {
                listeners.remove(&consumer);
                if listeners.is_empty() {
                    self.by_binding.remove(&binding);
                }
            }
            if let Some(provider) = sub.provider {
                self.unindex_provider(provider, binding, consumer);
            }
        }
    }

    /// Total number of live subscriptions.
    pub(crate) fn subscription_count(&self) -> usize {
        self.by_consumer.values().map(HashMap::len).sum()
    }

    fn unindex_provider(&mut self, provider: NodeId, binding: BindingId, consumer: NodeId) {
        if let Some(listeners) = self.by_provider.get_mut(&(provider, binding)) {
            listeners.remove(&consumer);
            if listeners.is_empty() {
                self.by_provider.remove(&(provider, binding));
            }
        }
    }
}

// =============================================================================
// PendingSet
// =============================================================================

/// Order-preserving, deduplicated set of consumers awaiting re-evaluation.
///
/// Deduplication is what gives exactly-once-per-pass coalescing when the host
/// batches several replacements in one update.
pub(crate) struct PendingSet {
    queue: VecDeque<NodeId>,
    queued: HashSet<NodeId>,
}

impl PendingSet {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
        }
    }

    /// Queue a consumer; returns false if it was already queued.
    pub(crate) fn push(&mut self, node: NodeId) -> bool {
        if self.queued.insert(node) {
            self.queue.push_back(node);
            true
        } else {
            false
        }
    }

    pub(crate) fn pop(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        self.queued.remove(&node);
        Some(node)
    }

    /// Cancel a queued delivery - the node unmounted.
    pub(crate) fn remove(&mut self, node: NodeId) {
        if self.queued.remove(&node) {
            self.queue.retain(|&queued| queued != node);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding_id() -> BindingId {
        crate::Binding::<u32>::new().id()
    }

    #[test]
    fn test_bind_is_idempotent() {
        let consumer = NodeId::new(1);
        let provider = NodeId::new(0);
        let binding = binding_id();

        let mut registry = SubscriptionRegistry::new();
        registry.bind(consumer, binding, Some(provider));
        registry.bind(consumer, binding, Some(provider));

        assert_eq!(registry.subscription_count(), 1);
        assert_eq!(registry.mark_replaced(provider, binding), vec![consumer]);
    }

    #[test]
    fn test_rebinding_moves_provider_index() {
        let consumer = NodeId::new(2);
        let near = NodeId::new(1);
        let far = NodeId::new(0);
        let binding = binding_id();

        let mut registry = SubscriptionRegistry::new();
        registry.bind(consumer, binding, Some(far));
        registry.bind(consumer, binding, Some(near));

        // Replacement at the old provider no longer reaches the consumer.
        assert!(registry.mark_replaced(far, binding).is_empty());
        assert_eq!(registry.mark_replaced(near, binding), vec![consumer]);
    }

    #[test]
    fn test_mark_replaced_sets_notified() {
        let consumer = NodeId::new(1);
        let provider = NodeId::new(0);
        let binding = binding_id();

        let mut registry = SubscriptionRegistry::new();
        registry.bind(consumer, binding, Some(provider));
        registry.mark_replaced(provider, binding);

        let sub = registry.get(consumer, binding).unwrap();
        assert_eq!(sub.state, SubscriptionState::Notified);
        assert_eq!(sub.provider, Some(provider));

        registry.rebind(consumer, binding);
        assert_eq!(
            registry.get(consumer, binding).unwrap().state,
            SubscriptionState::Bound
        );
    }

    #[test]
    fn test_stale_subscription_never_delivers() {
        let consumer = NodeId::new(1);
        let provider = NodeId::new(0);
        let binding = binding_id();

        let mut registry = SubscriptionRegistry::new();
        registry.bind(consumer, binding, Some(provider));
        registry.invalidate(consumer, binding);

        assert!(registry.mark_replaced(provider, binding).is_empty());
        assert_eq!(
            registry.get(consumer, binding).unwrap().state,
            SubscriptionState::Stale
        );
    }

    #[test]
    fn test_demote_provider_goes_stale() {
        let consumer = NodeId::new(1);
        let provider = NodeId::new(0);
        let binding = binding_id();

        let mut registry = SubscriptionRegistry::new();
        registry.bind(consumer, binding, Some(provider));

        assert_eq!(registry.demote_provider(provider, binding), vec![consumer]);
        let sub = registry.get(consumer, binding).unwrap();
        assert_eq!(sub.state, SubscriptionState::Stale);
        assert_eq!(sub.provider, None);
        // Reverse index gone with the provider.
        assert!(registry.mark_replaced(provider, binding).is_empty());
    }

    #[test]
    fn test_drop_consumer_prunes_all_indexes() {
        let consumer = NodeId::new(2);
        let provider = NodeId::new(0);
        let binding = binding_id();
        let unprovided = binding_id();

        let mut registry = SubscriptionRegistry::new();
        registry.bind(consumer, binding, Some(provider));
        registry.bind(consumer, unprovided, None);
        assert_eq!(registry.subscription_count(), 2);

        registry.drop_consumer(consumer);
        assert_eq!(registry.subscription_count(), 0);
        assert!(registry.mark_replaced(provider, binding).is_empty());
        assert!(registry.subscribers_of(unprovided).is_empty());
        assert!(registry.consumers().is_empty());
    }

    #[test]
    fn test_subscribers_of_includes_unprovided() {
        let consumer = NodeId::new(1);
        let other = NodeId::new(2);
        let provider = NodeId::new(0);
        let binding = binding_id();

        let mut registry = SubscriptionRegistry::new();
        registry.bind(consumer, binding, None);
        registry.bind(other, binding, Some(provider));

        let mut subscribers = registry.subscribers_of(binding);
        subscribers.sort();
        assert_eq!(subscribers, vec![(consumer, None), (other, Some(provider))]);
    }

    #[test]
    fn test_pending_set_coalesces() {
        let a = NodeId::new(1);
        let b = NodeId::new(2);

        let mut pending = PendingSet::new();
        assert!(pending.push(a));
        assert!(pending.push(b));
        assert!(!pending.push(a));

        assert_eq!(pending.pop(), Some(a));
        assert_eq!(pending.pop(), Some(b));
        assert_eq!(pending.pop(), None);

        // Once drained, a node may queue again.
        assert!(pending.push(a));
    }

    #[test]
    fn test_pending_set_cancellation() {
        let a = NodeId::new(1);
        let b = NodeId::new(2);

        let mut pending = PendingSet::new();
        pending.push(a);
        pending.push(b);
        pending.remove(a);

        assert_eq!(pending.pop(), Some(b));
        assert!(pending.is_empty());
    }
}

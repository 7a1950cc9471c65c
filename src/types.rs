//! Core types for spark-context.
//!
//! These types flow across the host boundary: the host render engine mints
//! [`NodeId`]s for tree positions, and every lookup through the tree produces
//! a [`Resolution`].

// =============================================================================
// NodeId
// =============================================================================

/// Stable identity for a position in the host's component tree.
///
/// The host render engine owns allocation and guarantees the id stays stable
/// for as long as the position is mounted. The propagation core never mints
/// node ids itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a host-allocated raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id assigned by the host.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Outcome of resolving a binding from a node's position in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The nearest ancestor attaching the binding supplies the value.
    Provided {
        /// The value currently attached at the providing node.
        value: T,
        /// The ancestor that supplies it.
        provider: NodeId,
    },
    /// No ancestor attaches the binding; its default applies.
    Default(T),
    /// No ancestor attaches the binding and it has no default.
    ///
    /// This is a legitimate outcome, not an error. Escalation is the
    /// caller's policy.
    Absent,
}

impl<T> Resolution<T> {
    /// The resolved value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Provided { value, .. } => Some(value),
            Self::Default(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// The resolved value, or a caller-chosen fallback when absent.
    pub fn value_or(self, fallback: T) -> T {
        self.value().unwrap_or(fallback)
    }

    /// The node that supplies the value, when an ancestor provides it.
    ///
    /// `None` for both `Default` and `Absent` outcomes.
    pub fn provider(&self) -> Option<NodeId> {
        match self {
            Self::Provided { provider, .. } => Some(*provider),
            _ => None,
        }
    }

    /// True when an ancestor supplies the value.
    pub fn is_provided(&self) -> bool {
        matches!(self, Self::Provided { .. })
    }

    /// True when neither a provider nor a default exists.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

// =============================================================================
// SubscriptionState
// =============================================================================

/// Lifecycle of a recorded subscription.
///
/// Transitions: `Bound -> Notified -> Bound` on value replacement, and
/// `Bound -> Stale` when either endpoint unmounts, the consumer's ancestry
/// changes, or a nearer provider appears. A stale subscription never delivers
/// a notification; it is re-resolved (or pruned) before any further read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Resolution is cached and current; reads take the O(1) fast path.
    Bound,
    /// The provider replaced its value; the consumer is scheduled and the
    /// next read revalidates against the same provider.
    Notified,
    /// The cached provider is no longer trustworthy; the next read re-walks
    /// the ancestor chain from scratch.
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_roundtrip() {
        let id = NodeId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(NodeId::from(42u64), id);
        assert_ne!(NodeId::new(7), id);
    }

    #[test]
    fn test_resolution_accessors() {
        let provided = Resolution::Provided {
            value: "dark",
            provider: NodeId::new(1),
        };
        assert!(provided.is_provided());
        assert_eq!(provided.provider(), Some(NodeId::new(1)));
        assert_eq!(provided.value(), Some("dark"));

        let default = Resolution::Default("light");
        assert!(!default.is_provided());
        assert_eq!(default.provider(), None);
        assert_eq!(default.clone().value(), Some("light"));
        assert_eq!(default.value_or("fallback"), "light");

        let absent: Resolution<&str> = Resolution::Absent;
        assert!(absent.is_absent());
        assert_eq!(absent.provider(), None);
        assert_eq!(absent.value_or("fallback"), "fallback");
    }
}

//! Binding - identity and typed contract for a shareable value channel.
//!
//! A [`Binding`] is the "magic portal" endpoint: providers attach a value for
//! it somewhere in the tree, descendants resolve it without threading the
//! value through every intermediate level. Identity is allocated once per
//! created binding and compared by id only - two bindings created with
//! identical defaults are never equal.
//!
//! # Example
//!
//! ```
//! use spark_context::Binding;
//!
//! let theme: Binding<String> = Binding::with_default("light".to_string());
//! let cart: Binding<Vec<u32>> = Binding::new();
//!
//! assert!(theme.has_default());
//! assert!(!cart.has_default());
//! assert_ne!(theme.id(), cart.id());
//! ```

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// BindingId
// =============================================================================

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

fn next_binding_id() -> BindingId {
    BindingId(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
}

/// Process-lifetime-unique identity of a binding.
///
/// Ids are minted from a global counter so a binding stays distinguishable
/// even when moved between independent trees. All value and subscription
/// state remains per-tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    /// The raw counter value (for logging and host-side bookkeeping).
    pub const fn raw(self) -> u64 {
        self.0
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Identity plus typed contract for a value channel.
///
/// Immutable once created. Cloning is cheap and preserves identity, so the
/// same binding value can be handed to providers and consumers alike.
pub struct Binding<T> {
    id: BindingId,
    default: Option<Rc<T>>,
}

impl<T> Binding<T> {
    /// Create a fresh binding with no default value.
    ///
    /// Resolution falls through to [`Resolution::Absent`] when no ancestor
    /// attaches it.
    ///
    /// [`Resolution::Absent`]: crate::Resolution::Absent
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: next_binding_id(),
            default: None,
        }
    }

    /// Create a fresh binding that falls back to `value` when no ancestor
    /// provides one.
    pub fn with_default(value: T) -> Self {
        Self {
            id: next_binding_id(),
            default: Some(Rc::new(value)),
        }
    }

    /// This binding's identity.
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Whether a default value exists.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Clone out the default value, if any.
    pub(crate) fn default_value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.default.as_deref().cloned()
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

impl<T> PartialEq for Binding<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Binding<T> {}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

//! Structural error taxonomy.
//!
//! Both variants are programmer misuse of the attach lifecycle and surface
//! synchronously at the call site; neither is retried or silently recovered.
//! A resolution with no provider is *not* an error - see
//! [`Resolution::Absent`](crate::Resolution::Absent).

use thiserror::Error;

use crate::binding::BindingId;
use crate::types::NodeId;

/// Misuse of the attach/replace/detach lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// `attach` was called twice for the same (node, binding) without an
    /// intervening `detach`. Use `replace` for value updates; double
    /// attachment would make shadowing ambiguous.
    #[error("node {node:?} already attaches binding {binding:?}; use replace to swap the value")]
    DuplicateAttachment {
        /// The node that already holds an attachment.
        node: NodeId,
        /// The binding attached twice.
        binding: BindingId,
    },

    /// `replace` or `detach` was called for a mapping that does not exist.
    #[error("node {node:?} does not attach binding {binding:?}")]
    NotAttached {
        /// The node missing the attachment.
        node: NodeId,
        /// The binding that is not attached there.
        binding: BindingId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Binding;

    #[test]
    fn test_display_names_both_endpoints() {
        let binding: Binding<u8> = Binding::new();
        let err = ScopeError::DuplicateAttachment {
            node: NodeId::new(3),
            binding: binding.id(),
        };
        let text = err.to_string();
        assert!(text.contains("already attaches"));
        assert!(text.contains('3'));

        let err = ScopeError::NotAttached {
            node: NodeId::new(9),
            binding: binding.id(),
        };
        assert!(err.to_string().contains("does not attach"));
    }
}

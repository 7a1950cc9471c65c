//! # spark-context
//!
//! Scoped value propagation for reactive component trees.
//!
//! A value attached at one node of a tree becomes visible to every
//! descendant without threading it through each intermediate level. The
//! host render engine owns the tree; this crate owns the (binding -> value)
//! scopes, the nearest-ancestor resolution, and the subscription registry
//! that tells consumers when a value they depend on changes.
//!
//! ## Architecture
//!
//! ```text
//! attach(provider, binding, value) → ScopeTable
//! resolve(consumer, binding) → ancestor walk → Subscription recorded
//! replace(provider, binding, value) → notify exactly the subscribers
//! flush → scheduler hook → host re-evaluates marked nodes
//! ```
//!
//! Resolution is nearest-ancestor-wins: a nearer provider shadows a farther
//! one for the same binding. A binding may carry a default, used when no
//! ancestor provides it; with neither, resolution is [`Resolution::Absent`],
//! a normal outcome rather than an error.
//!
//! The model is single-threaded and cooperative, driven by the host's
//! update cycle. Wrap batched mutations in [`ContextTree::update`] so each
//! affected consumer is notified once per pass.
//!
//! ## Example
//!
//! ```
//! use spark_context::{Binding, ContextTree, NodeId, ParentMap, Resolution};
//!
//! let root = NodeId::new(0);
//! let child = NodeId::new(1);
//!
//! let mut topology = ParentMap::new();
//! topology.insert(child, root);
//!
//! let theme = Binding::with_default("light".to_string());
//! let tree = ContextTree::new();
//!
//! tree.attach(&topology, root, &theme, "dark".to_string()).unwrap();
//! assert_eq!(
//!     tree.resolve(&topology, child, &theme),
//!     Resolution::Provided { value: "dark".to_string(), provider: root }
//! );
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types ([`NodeId`], [`Resolution`], [`SubscriptionState`])
//! - [`binding`] - [`Binding`] identity and typed value contract
//! - [`topology`] - The host-owned tree seam ([`Topology`], [`ParentMap`])
//! - [`engine`] - [`ContextTree`]: scopes, resolver, subscription registry
//! - [`error`] - [`ScopeError`] structural error taxonomy
//! - [`logging`] - `tracing` macros behind the `tracing` feature, no-ops otherwise

pub mod binding;
pub mod engine;
pub mod error;
pub mod logging;
pub mod topology;
pub mod types;

// Re-export commonly used items
pub use binding::{Binding, BindingId};
pub use engine::ContextTree;
pub use error::ScopeError;
pub use topology::{ParentMap, Topology};
pub use types::{NodeId, Resolution, SubscriptionState};

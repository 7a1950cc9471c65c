//! Logging shims.
//!
//! With the `tracing` feature enabled the standard tracing macros are
//! re-exported from here; without it the crate-root shims below compile to
//! nothing, so call sites stay unconditional.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace};

/// No-op stand-in for `tracing::debug!` when the feature is off.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

/// No-op stand-in for `tracing::trace!` when the feature is off.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

//! # Valtree
//!
//! Ownership-tracked value trees that can be shared, detached and moved
//! between independent domains without dangling handles.
//!
//! A tree holds JSON-like values (null, bool, int, double, string, binary,
//! dictionary, list). Every tree lives in an ownership domain governed by
//! a [`ValueController`], which knows the tree's single owner, every live
//! handle into it and which handles depend on which containers. Removing,
//! replacing or clearing an entry invalidates every handle into it, so a
//! stale handle reports [`ValueError::Detached`] instead of reading freed
//! memory.
//!
//! ## Architecture
//!
//! - **Controller**: liveness, ownership and dependency bookkeeping, plus
//!   node storage for its domain
//! - **Lock policy**: [`ThreadSafe`] (mutex) or [`ThreadConfined`]
//!   (single thread, no locking), picked at compile time
//! - **Tracked values**: the handle wrapper that re-verifies itself
//!   against its controller on every access
//! - **Kinds**: [`BinaryValue`], [`DictionaryValue`] and [`ListValue`]
//! - **Detached values**: controller-free trees for transport and adoption
//!
//! ## Copy or move
//!
//! Storing a container inside another either moves it or copies it. An
//! owner that will delete is moved: its storage and its live references
//! transfer to the target domain, and the original handle becomes invalid.
//! Anything else is deep-copied, so two domains never alias storage.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod controller;
pub mod error;
pub mod value;

// Re-export main types
pub use context::ValueContext;
pub use controller::{LockPolicy, ThreadConfined, ThreadSafe, ThreadSafeGuard, ValueController};
pub use error::{ControllerError, Result, ValueError};
pub use value::{
    BinaryValue, DetachedBinary, DetachedDictionary, DetachedList, DetachedValue,
    DictionaryValue, ListValue, NodeId, OwnerMode, TrackedValue, ValueMode, ValueType,
};

/// Valtree version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

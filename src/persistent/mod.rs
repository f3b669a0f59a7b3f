//! Persistent (copy-on-write) ordered collections.
//!
//! This module provides a B-tree that uses structural sharing to make
//! versions cheap:
//!
//! - [`PersistentBTree`]: a mutable draft owned by one writer
//! - [`Snapshot`]: a frozen version that any number of readers can share
//! - [`Less`]: the ordering predicate trees are built with
//!
//! # Structural Sharing
//!
//! Copying a snapshot shares every node. A mutation copies only the nodes
//! on the path it touches that are still shared with another version, so
//! a new version costs O(log N) fresh nodes instead of a full copy.
//!
//! # Examples
//!
//! ```rust
//! use atomic_btree::persistent::{PersistentBTree, Snapshot};
//!
//! let base: Snapshot<i32> = (0..100).collect::<PersistentBTree<i32>>().freeze();
//!
//! let mut draft = base.copy();
//! draft.set(1000);
//! draft.delete(&0);
//! let next = draft.freeze();
//!
//! assert_eq!(base.min(), Some(&0));     // Original unchanged
//! assert_eq!(next.min(), Some(&1));     // New version
//! assert_eq!(next.max(), Some(&1000));
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type used for tree nodes.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled, this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod btree;
mod ordering;

pub use btree::Iter;
pub use btree::PersistentBTree;
pub use btree::Snapshot;
pub use ordering::Less;
pub use ordering::Natural;

// =============================================================================
// Tests
// =============================================================================

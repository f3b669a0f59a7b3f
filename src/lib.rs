//! # atomic-btree
//!
//! A concurrent, versioned ordered container for Rust.
//!
//! ## Overview
//!
//! Many readers traverse a consistent, immutable snapshot while writers race
//! to install new snapshots through optimistic compare-and-swap retries.
//! Readers are never blocked and never see a partially applied write.
//! It includes:
//!
//! - **Persistent B-tree**: a copy-on-write B-tree ordered by a caller-supplied
//!   predicate, with O(1) copies that share structure with their source
//! - **Atomic publisher**: [`AtomicBTree`](concurrent::AtomicBTree), which
//!   serializes writes into a sequence of atomically visible versions
//! - **Options**: tree degree, plus telemetry and contention settings for the
//!   publisher
//! - **Metrics**: an `iroh-metrics` group of per-operation counters
//!
//! ## Feature Flags
//!
//! - `persistent`: Persistent B-tree and ordering predicates
//! - `concurrent`: Atomic snapshot publisher (enables `persistent` and `arc`)
//! - `metrics`: Record per-operation counters (enables `concurrent`)
//! - `arc`: Use `Arc` instead of `Rc` for tree nodes
//! - `serde`: Serialization of snapshots, options and telemetry
//!
//! ## Example
//!
//! ```rust
//! use atomic_btree::prelude::*;
//!
//! let tree = AtomicBTree::<u32>::default();
//! assert_eq!(tree.set(7), None);
//! assert_eq!(tree.set(7), Some(7));
//! assert_eq!(tree.reverse_seek(&10), Some(7));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use atomic_btree::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::ConfigError;
    pub use crate::options::Options;

    #[cfg(feature = "persistent")]
    pub use crate::persistent::*;

    #[cfg(feature = "concurrent")]
    pub use crate::concurrent::*;
    #[cfg(feature = "concurrent")]
    pub use crate::options::PublisherOptions;
}

pub mod error;
pub mod options;

#[cfg(feature = "persistent")]
pub mod persistent;

#[cfg(feature = "concurrent")]
pub mod concurrent;

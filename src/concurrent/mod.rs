//! Lock-free concurrent containers built on persistent snapshots.
//!
//! - [`AtomicBTree`]: an ordered container whose readers work on immutable
//!   snapshots while writers publish new ones with compare-and-swap
//! - [`TreeMetrics`]: the `iroh-metrics` group each tree records per-operation
//!   calls, latency and retries into, with [`TelemetryReport`] as a plain
//!   data view of it
//!
//! # Examples
//!
//! ```rust
//! use atomic_btree::concurrent::AtomicBTree;
//!
//! let tree = AtomicBTree::<i32>::default();
//! tree.set(2);
//! tree.set(1);
//!
//! // A snapshot is unaffected by later writes
//! let snapshot = tree.snapshot();
//! tree.delete(&1);
//! assert_eq!(snapshot.len(), 2);
//! assert_eq!(tree.len(), 1);
//! ```

mod atomic_tree;
mod telemetry;

pub use atomic_tree::AtomicBTree;
pub use telemetry::Operation;
pub use telemetry::OperationStats;
pub use telemetry::TelemetryReport;
pub use telemetry::TreeMetrics;

//! Per-operation metrics for [`AtomicBTree`](super::AtomicBTree).
//!
//! Every tree owns an [`iroh_metrics`] group, [`TreeMetrics`], with a call
//! counter and a latency counter per public operation and a retry counter
//! per write operation. Hosts register the group with their metrics
//! registry to export it; [`TelemetryReport`] is a plain-data view of the
//! same counters.
//!
//! Counters only move when the `metrics` feature is enabled and the tree
//! was built with `record_telemetry` on.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iroh_metrics::{Counter, MetricsGroup};

/// A public operation of [`AtomicBTree`](super::AtomicBTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Operation {
    /// Point lookup.
    Get,
    /// Lookup that publishes a default when the item is absent.
    GetOrDefault,
    /// Upsert.
    Set,
    /// Removal.
    Delete,
    /// Ascending scan.
    Scan,
    /// Greatest item.
    Max,
    /// Smallest item.
    Min,
    /// Iterator creation.
    Iter,
    /// Greatest item not above a pivot.
    ReverseSeek,
}

impl Operation {
    /// Number of operations.
    pub const COUNT: usize = 9;

    /// Every operation, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Get,
        Self::GetOrDefault,
        Self::Set,
        Self::Delete,
        Self::Scan,
        Self::Max,
        Self::Min,
        Self::Iter,
        Self::ReverseSeek,
    ];

    /// Returns the metric key of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetOrDefault => "get_or_default",
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Scan => "scan",
            Self::Max => "max",
            Self::Min => "min",
            Self::Iter => "iter",
            Self::ReverseSeek => "reverse_seek",
        }
    }

    /// Returns `true` for operations that publish new snapshots.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::GetOrDefault | Self::Set | Self::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Metrics tracked for one tree.
#[derive(Debug, Default, MetricsGroup)]
#[metrics(name = "atomic_btree")]
pub struct TreeMetrics {
    /*
     * Reads
     */
    /// Number of `get` calls.
    pub get_calls: Counter,
    /// Nanoseconds spent in `get` calls.
    pub get_nanos: Counter,
    /// Number of `scan` calls.
    pub scan_calls: Counter,
    /// Nanoseconds spent in `scan` calls.
    pub scan_nanos: Counter,
    /// Number of `max` calls.
    pub max_calls: Counter,
    /// Nanoseconds spent in `max` calls.
    pub max_nanos: Counter,
    /// Number of `min` calls.
    pub min_calls: Counter,
    /// Nanoseconds spent in `min` calls.
    pub min_nanos: Counter,
    /// Number of `iter` calls.
    pub iter_calls: Counter,
    /// Nanoseconds spent creating iterators.
    pub iter_nanos: Counter,
    /// Number of `reverse_seek` calls.
    pub reverse_seek_calls: Counter,
    /// Nanoseconds spent in `reverse_seek` calls.
    pub reverse_seek_nanos: Counter,

    /*
     * Writes
     */
    /// Number of `get_or_default` calls.
    pub get_or_default_calls: Counter,
    /// Nanoseconds spent in `get_or_default` calls.
    pub get_or_default_nanos: Counter,
    /// Compare-and-swap rounds lost by `get_or_default`.
    pub get_or_default_retries: Counter,
    /// Number of `set` calls.
    pub set_calls: Counter,
    /// Nanoseconds spent in `set` calls.
    pub set_nanos: Counter,
    /// Compare-and-swap rounds lost by `set`.
    pub set_retries: Counter,
    /// Number of `delete` calls.
    pub delete_calls: Counter,
    /// Nanoseconds spent in `delete` calls.
    pub delete_nanos: Counter,
    /// Compare-and-swap rounds lost by `delete`.
    pub delete_retries: Counter,
}

impl TreeMetrics {
    const fn calls(&self, operation: Operation) -> &Counter {
        match operation {
            Operation::Get => &self.get_calls,
            Operation::GetOrDefault => &self.get_or_default_calls,
            Operation::Set => &self.set_calls,
            Operation::Delete => &self.delete_calls,
            Operation::Scan => &self.scan_calls,
            Operation::Max => &self.max_calls,
            Operation::Min => &self.min_calls,
            Operation::Iter => &self.iter_calls,
            Operation::ReverseSeek => &self.reverse_seek_calls,
        }
    }

    const fn nanos(&self, operation: Operation) -> &Counter {
        match operation {
            Operation::Get => &self.get_nanos,
            Operation::GetOrDefault => &self.get_or_default_nanos,
            Operation::Set => &self.set_nanos,
            Operation::Delete => &self.delete_nanos,
            Operation::Scan => &self.scan_nanos,
            Operation::Max => &self.max_nanos,
            Operation::Min => &self.min_nanos,
            Operation::Iter => &self.iter_nanos,
            Operation::ReverseSeek => &self.reverse_seek_nanos,
        }
    }

    /// Read operations never retry and have no retry counter.
    const fn retries(&self, operation: Operation) -> Option<&Counter> {
        match operation {
            Operation::GetOrDefault => Some(&self.get_or_default_retries),
            Operation::Set => Some(&self.set_retries),
            Operation::Delete => Some(&self.delete_retries),
            _ => None,
        }
    }

    /// Returns the counters of `operation` as plain data.
    #[must_use]
    pub fn stats(&self, operation: Operation) -> OperationStats {
        OperationStats {
            operation,
            calls: self.calls(operation).get(),
            elapsed_nanos: self.nanos(operation).get(),
            retries: self.retries(operation).map_or(0, Counter::get),
        }
    }
}

/// Recording side of a tree's [`TreeMetrics`].
#[derive(Debug)]
pub(crate) struct Telemetry {
    enabled: bool,
    metrics: Arc<TreeMetrics>,
}

impl Telemetry {
    pub(crate) fn new(record_telemetry: bool) -> Self {
        Self::with_metrics(record_telemetry, Arc::default())
    }

    pub(crate) fn with_metrics(record_telemetry: bool, metrics: Arc<TreeMetrics>) -> Self {
        Self {
            enabled: record_telemetry && cfg!(feature = "metrics"),
            metrics,
        }
    }

    pub(crate) const fn metrics(&self) -> &Arc<TreeMetrics> {
        &self.metrics
    }

    /// Starts timing one call of `operation`.
    pub(crate) fn start(&self, operation: Operation) -> OperationTimer<'_> {
        OperationTimer {
            telemetry: self,
            operation,
            started: self.enabled.then(Instant::now),
        }
    }

    pub(crate) fn record_retry(&self, operation: Operation) {
        if self.enabled
            && let Some(retries) = self.metrics.retries(operation)
        {
            retries.inc();
        }
    }

    fn record_call(&self, operation: Operation, elapsed: Duration) {
        self.metrics.calls(operation).inc();
        self.metrics
            .nanos(operation)
            .inc_by(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }

    pub(crate) fn report(&self) -> TelemetryReport {
        TelemetryReport {
            enabled: self.enabled,
            operations: Operation::ALL
                .iter()
                .map(|&operation| self.metrics.stats(operation))
                .collect(),
        }
    }
}

/// Drop guard that records one call and its latency.
#[must_use = "the call is recorded when the timer is dropped"]
pub(crate) struct OperationTimer<'a> {
    telemetry: &'a Telemetry,
    operation: Operation,
    started: Option<Instant>,
}

impl Drop for OperationTimer<'_> {
    fn drop(&mut self) {
        if let Some(started) = self.started {
            self.telemetry
                .record_call(self.operation, started.elapsed());
        }
    }
}

/// Counters of one operation at the time of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperationStats {
    /// The operation these counters belong to.
    pub operation: Operation,
    /// Completed calls, including calls that unwound.
    pub calls: u64,
    /// Total time spent in those calls, in nanoseconds.
    pub elapsed_nanos: u64,
    /// Lost compare-and-swap rounds. Always zero for reads.
    pub retries: u64,
}

impl OperationStats {
    /// Total time spent in the recorded calls.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos)
    }

    /// Mean latency per call, or `None` before the first call.
    #[must_use]
    pub fn mean_latency(&self) -> Option<Duration> {
        (self.calls > 0).then(|| Duration::from_nanos(self.elapsed_nanos / self.calls))
    }
}

/// A point-in-time view of a tree's [`TreeMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetryReport {
    /// Whether the tree records telemetry at all.
    pub enabled: bool,
    /// One entry per [`Operation`], in [`Operation::ALL`] order.
    pub operations: Vec<OperationStats>,
}

impl TelemetryReport {
    /// Returns the counters of `operation`.
    #[must_use]
    pub fn get(&self, operation: Operation) -> Option<&OperationStats> {
        self.operations
            .iter()
            .find(|stats| stats.operation == operation)
    }

    /// Total lost compare-and-swap rounds across all operations.
    #[must_use]
    pub fn total_retries(&self) -> u64 {
        self.operations.iter().map(|stats| stats.retries).sum()
    }
}

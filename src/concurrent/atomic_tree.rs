//! Lock-free publication of B-tree snapshots.
//!
//! [`AtomicBTree`] holds one atomically replaceable pointer to the current
//! frozen [`Snapshot`]. Readers load the pointer once and work on that
//! version for their whole call. Writers copy the version they loaded,
//! mutate the private copy, freeze it, and install it with a
//! compare-and-swap; a writer that loses the race drops its copy and starts
//! over from the newer version.
//!
//! # Progress
//!
//! Readers never wait and never retry. Writers are lock-free but not
//! wait-free: some writer wins every round, but a single writer may lose
//! an unbounded number of rounds under sustained contention on the tree.
//! No retry cap is applied; hosts that need one must bound calls
//! externally.
//!
//! # Logging
//!
//! - **TRACE** `atomic_btree::concurrent`: `cas_retry`, a writer lost a round
//! - **DEBUG** `atomic_btree::concurrent`: `snapshot_published`, a writer won
//! - **WARN**  `atomic_btree::concurrent`: `writer_contention`, one call lost
//!   `contention_warning_threshold` rounds

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, trace, warn};

use super::telemetry::{Operation, Telemetry, TelemetryReport, TreeMetrics};
use crate::error::ConfigError;
use crate::options::PublisherOptions;
use crate::persistent::{Iter, Less, Natural, PersistentBTree, Snapshot};

const LOG_TARGET: &str = "atomic_btree::concurrent";

/// A concurrent ordered container that publishes immutable snapshots.
///
/// Items are ordered by the predicate given at construction; two items are
/// the same slot when neither is less than the other. Lookups return clones
/// of stored items.
///
/// # Examples
///
/// ```rust
/// use atomic_btree::concurrent::AtomicBTree;
/// use std::sync::Arc;
/// use std::thread;
///
/// let tree = Arc::new(AtomicBTree::<u64>::default());
///
/// let handles: Vec<_> = (0..4)
///     .map(|worker| {
///         let tree = Arc::clone(&tree);
///         thread::spawn(move || {
///             for index in 0..100 {
///                 tree.set(worker * 100 + index);
///             }
///         })
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// assert_eq!(tree.len(), 400);
/// assert_eq!(tree.max(), Some(399));
/// ```
pub struct AtomicBTree<T, L = Natural> {
    current: ArcSwap<Snapshot<T, L>>,
    options: PublisherOptions,
    telemetry: Telemetry,
}

impl<T, L> AtomicBTree<T, L> {
    /// Creates an empty tree ordered by `less` with default options.
    #[must_use]
    pub fn new(less: L) -> Self {
        Self::from_snapshot(PersistentBTree::new(less).freeze())
    }

    /// Creates an empty tree ordered by `less`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `options` fail validation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atomic_btree::concurrent::AtomicBTree;
    /// use atomic_btree::options::PublisherOptions;
    /// use atomic_btree::persistent::Natural;
    ///
    /// let options = PublisherOptions::default().with_degree(4);
    /// assert!(AtomicBTree::<i32>::with_options(Natural, options).is_ok());
    ///
    /// let rejected = PublisherOptions::default().with_contention_warning_threshold(0);
    /// assert!(AtomicBTree::<i32>::with_options(Natural, rejected).is_err());
    /// ```
    pub fn with_options(less: L, options: PublisherOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let snapshot = PersistentBTree::with_options(less, options.tree)?.freeze();
        Ok(Self::from_parts(snapshot, options))
    }

    /// Creates a tree whose first published version is `snapshot`.
    ///
    /// The tree keeps the snapshot's shape and default publisher settings.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot<T, L>) -> Self {
        let options = PublisherOptions {
            tree: *snapshot.options(),
            ..PublisherOptions::default()
        };
        Self::from_parts(snapshot, options)
    }

    fn from_parts(snapshot: Snapshot<T, L>, options: PublisherOptions) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            options,
            telemetry: Telemetry::new(options.record_telemetry),
        }
    }

    /// Records into `metrics` instead of a group private to this tree.
    ///
    /// Several trees may share one group; their counters then add up.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<TreeMetrics>) -> Self {
        self.telemetry = Telemetry::with_metrics(self.options.record_telemetry, metrics);
        self
    }

    /// Returns the current snapshot.
    ///
    /// Use this to run several reads against one version.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot<T, L>> {
        self.current.load_full()
    }

    /// Returns the number of items in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Returns `true` if the current snapshot holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Returns the options the tree was built with.
    #[must_use]
    pub const fn options(&self) -> &PublisherOptions {
        &self.options
    }

    /// Returns the metrics group this tree records into.
    ///
    /// Register it with an `iroh_metrics` registry to export it.
    #[must_use]
    pub const fn metrics(&self) -> &Arc<TreeMetrics> {
        self.telemetry.metrics()
    }

    /// Returns a copy of the per-operation counters.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryReport {
        self.telemetry.report()
    }

    /// Calls `visit` on every item of one snapshot in ascending order until
    /// it returns `false`.
    ///
    /// Writers that publish while the scan runs do not affect it.
    pub fn scan<F>(&self, visit: F)
    where
        F: FnMut(&T) -> bool,
    {
        let _timer = self.telemetry.start(Operation::Scan);
        self.current.load_full().scan(visit);
    }
}

impl<T: Clone, L> AtomicBTree<T, L> {
    /// Returns the greatest item.
    #[must_use]
    pub fn max(&self) -> Option<T> {
        let _timer = self.telemetry.start(Operation::Max);
        Snapshot::max(&self.current.load()).cloned()
    }

    /// Returns the smallest item.
    #[must_use]
    pub fn min(&self) -> Option<T> {
        let _timer = self.telemetry.start(Operation::Min);
        Snapshot::min(&self.current.load()).cloned()
    }

    /// Returns a lazy ascending iterator bound to the current snapshot.
    ///
    /// The iterator is a single forward pass; call `iter` again for a new
    /// pass over whatever version is current then.
    #[must_use]
    pub fn iter(&self) -> Iter<T, L> {
        let _timer = self.telemetry.start(Operation::Iter);
        self.current.load().iter()
    }
}

impl<T: Clone, L: Less<T>> AtomicBTree<T, L> {
    /// Returns the stored item equal to `item`.
    #[must_use]
    pub fn get(&self, item: &T) -> Option<T> {
        let _timer = self.telemetry.start(Operation::Get);
        self.current.load().get(item).cloned()
    }

    /// Returns the greatest item that is `<= pivot`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atomic_btree::concurrent::AtomicBTree;
    ///
    /// let tree = AtomicBTree::<i32>::default();
    /// for item in [1, 3, 7, 10] {
    ///     tree.set(item);
    /// }
    /// assert_eq!(tree.reverse_seek(&5), Some(3));
    /// assert_eq!(tree.reverse_seek(&0), None);
    /// assert_eq!(tree.reverse_seek(&10), Some(10));
    /// ```
    #[must_use]
    pub fn reverse_seek(&self, pivot: &T) -> Option<T> {
        let _timer = self.telemetry.start(Operation::ReverseSeek);
        self.current.load().reverse_seek(pivot).cloned()
    }

    /// Inserts `item`, replacing any stored item equal to it.
    ///
    /// Returns the item the published write replaced, as seen by the
    /// attempt that won.
    pub fn set(&self, item: T) -> Option<T> {
        let _timer = self.telemetry.start(Operation::Set);
        self.update(Operation::Set, |draft| draft.set(item.clone()))
    }

    /// Removes the stored item equal to `item` and returns it.
    ///
    /// A new version is published even when nothing was removed.
    pub fn delete(&self, item: &T) -> Option<T> {
        let _timer = self.telemetry.start(Operation::Delete);
        self.update(Operation::Delete, |draft| draft.delete(item))
    }

    /// Returns the stored item equal to `item`, publishing a default first
    /// when there is none.
    ///
    /// When the item is absent, `fill_defaults` completes a fresh clone of
    /// `item` and the result is published. If another writer publishes
    /// first, the call starts over: it returns the item that writer stored
    /// if it is now present, and otherwise fills and publishes again. The
    /// call therefore returns either a value that was already stored or
    /// the value this call published, never an unpublished one.
    ///
    /// `fill_defaults` may run once per lost round and must not have side
    /// effects that assume it runs at most once.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atomic_btree::concurrent::AtomicBTree;
    ///
    /// let by_key = |a: &(u32, u64), b: &(u32, u64)| a.0 < b.0;
    /// let tree = AtomicBTree::new(by_key);
    ///
    /// let filled = tree.get_or_default((7, 0), |entry| entry.1 = 42);
    /// assert_eq!(filled, (7, 42));
    ///
    /// // An existing entry wins over the default.
    /// let existing = tree.get_or_default((7, 0), |entry| entry.1 = 99);
    /// assert_eq!(existing, (7, 42));
    /// ```
    pub fn get_or_default<F>(&self, item: T, mut fill_defaults: F) -> T
    where
        F: FnMut(&mut T),
    {
        let _timer = self.telemetry.start(Operation::GetOrDefault);
        let mut attempt: u32 = 0;
        loop {
            let current = self.current.load_full();
            if let Some(existing) = current.get(&item) {
                return existing.clone();
            }
            let mut candidate = item.clone();
            fill_defaults(&mut candidate);
            let mut draft = current.copy();
            draft.set(candidate.clone());
            if self.try_publish(Operation::GetOrDefault, &current, draft, attempt) {
                return candidate;
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Runs read-copy-mutate-freeze-publish until a round wins.
    fn update<R, F>(&self, operation: Operation, mut mutate: F) -> R
    where
        F: FnMut(&mut PersistentBTree<T, L>) -> R,
    {
        let mut attempt: u32 = 0;
        loop {
            let current = self.current.load_full();
            let mut draft = current.copy();
            let outcome = mutate(&mut draft);
            if self.try_publish(operation, &current, draft, attempt) {
                return outcome;
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Freezes `draft` and installs it if `current` is still published.
    fn try_publish(
        &self,
        operation: Operation,
        current: &Arc<Snapshot<T, L>>,
        draft: PersistentBTree<T, L>,
        attempt: u32,
    ) -> bool {
        let next = Arc::new(draft.freeze());
        let length = next.len();
        let round = attempt.saturating_add(1);
        // `current` is held for the whole round, so its address cannot be
        // reused by a newer version.
        let previous = self.current.compare_and_swap(current, next);
        if Arc::ptr_eq(&previous, current) {
            debug!(
                target: LOG_TARGET,
                operation = operation.as_str(),
                attempts = round,
                length,
                "snapshot_published"
            );
            return true;
        }

        self.telemetry.record_retry(operation);
        trace!(
            target: LOG_TARGET,
            operation = operation.as_str(),
            attempt = round,
            "cas_retry"
        );
        if round == self.options.contention_warning_threshold {
            warn!(
                target: LOG_TARGET,
                operation = operation.as_str(),
                retries = round,
                "writer_contention"
            );
        }
        false
    }
}

impl<T: Ord> Default for AtomicBTree<T, Natural> {
    fn default() -> Self {
        Self::new(Natural)
    }
}

impl<T, L> fmt::Debug for AtomicBTree<T, L> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AtomicBTree")
            .field("len", &self.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(AtomicBTree<u64>: Send, Sync);
static_assertions::assert_impl_all!(AtomicBTree<String, fn(&String, &String) -> bool>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io;
    use std::sync::Mutex;
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::fmt::MakeWriter;

    type Entry = (i32, &'static str);
    type ByKey = fn(&Entry, &Entry) -> bool;

    fn by_key(a: &Entry, b: &Entry) -> bool {
        a.0 < b.0
    }

    fn keyed_tree() -> AtomicBTree<Entry, ByKey> {
        AtomicBTree::new(by_key as ByKey)
    }

    #[rstest]
    fn test_new_is_empty() {
        let tree = AtomicBTree::<i32>::default();
        assert!(tree.is_empty());
        assert_eq!(tree.get(&1), None);
        assert_eq!(tree.max(), None);
        assert_eq!(tree.min(), None);
        assert_eq!(tree.reverse_seek(&1), None);
        assert_eq!(tree.iter().next(), None);
    }

    #[rstest]
    fn test_set_get_delete_round_trip() {
        let tree = keyed_tree();
        assert_eq!(tree.set((1, "one")), None);
        assert_eq!(tree.get(&(1, "")), Some((1, "one")));
        assert_eq!(tree.set((1, "uno")), Some((1, "one")));
        assert_eq!(tree.delete(&(1, "")), Some((1, "uno")));
        assert_eq!(tree.get(&(1, "")), None);
        assert_eq!(tree.delete(&(1, "")), None);
    }

    #[rstest]
    fn test_each_write_publishes_new_snapshot() {
        let tree = AtomicBTree::<i32>::default();
        let before = tree.snapshot();
        tree.set(1);
        let after_set = tree.snapshot();
        tree.delete(&42);
        let after_noop_delete = tree.snapshot();

        assert!(!Arc::ptr_eq(&before, &after_set));
        assert!(!Arc::ptr_eq(&after_set, &after_noop_delete));
        assert!(before.is_empty());
        assert_eq!(after_set.len(), 1);
        assert_eq!(after_noop_delete.len(), 1);
    }

    #[rstest]
    fn test_get_or_default_fills_once_when_uncontended() {
        let tree = keyed_tree();
        let mut fills = 0;
        let value = tree.get_or_default((3, ""), |entry| {
            fills += 1;
            entry.1 = "three";
        });
        assert_eq!(value, (3, "three"));
        assert_eq!(fills, 1);

        let value = tree.get_or_default((3, ""), |_| fills += 1);
        assert_eq!(value, (3, "three"));
        assert_eq!(fills, 1);
    }

    #[rstest]
    fn test_scan_iter_and_bounds() {
        let tree = AtomicBTree::<i32>::default();
        for item in [10, 1, 7, 3] {
            tree.set(item);
        }
        let mut scanned = Vec::new();
        tree.scan(|item| {
            scanned.push(*item);
            true
        });
        assert_eq!(scanned, vec![1, 3, 7, 10]);
        assert_eq!(tree.iter().collect::<Vec<_>>(), vec![1, 3, 7, 10]);
        assert_eq!(tree.min(), Some(1));
        assert_eq!(tree.max(), Some(10));
    }

    #[rstest]
    fn test_iter_is_bound_to_creation_snapshot() {
        let tree = AtomicBTree::<i32>::default();
        tree.set(1);
        tree.set(2);
        let iter = tree.iter();
        tree.set(3);
        tree.delete(&1);
        assert_eq!(iter.collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(tree.iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[rstest]
    fn test_from_snapshot_seeds_tree() {
        let seed = (0..10).collect::<PersistentBTree<i32>>().freeze();
        let tree = AtomicBTree::from_snapshot(seed.clone());
        assert_eq!(tree.len(), 10);
        tree.set(10);
        assert_eq!(tree.len(), 11);
        assert_eq!(seed.len(), 10);
    }

    #[rstest]
    fn test_with_options_carries_degree() {
        let tree =
            AtomicBTree::<i32>::with_options(Natural, PublisherOptions::default().with_degree(2))
                .unwrap();
        for item in 0..100 {
            tree.set(item);
        }
        assert_eq!(tree.snapshot().degree(), 2);
        assert_eq!(tree.options().tree.degree, 2);
        assert_eq!(tree.len(), 100);
    }

    #[cfg(feature = "metrics")]
    #[rstest]
    fn test_telemetry_counts_calls() {
        let tree = AtomicBTree::<i32>::default();
        tree.set(1);
        tree.set(2);
        let _ = tree.get(&1);
        let _ = tree.reverse_seek(&5);

        let report = tree.telemetry();
        assert!(report.enabled);
        assert_eq!(report.get(Operation::Set).unwrap().calls, 2);
        assert_eq!(report.get(Operation::Get).unwrap().calls, 1);
        assert_eq!(report.get(Operation::ReverseSeek).unwrap().calls, 1);
        assert_eq!(report.total_retries(), 0);
    }

    #[rstest]
    fn test_telemetry_disabled() {
        let options = PublisherOptions::default().with_telemetry(false);
        let tree = AtomicBTree::<i32>::with_options(Natural, options).unwrap();
        tree.set(1);
        let report = tree.telemetry();
        assert!(!report.enabled);
        assert_eq!(report.get(Operation::Set).unwrap().calls, 0);
    }

    #[rstest]
    fn test_panicking_fill_publishes_nothing() {
        let tree = keyed_tree();
        tree.set((1, "one"));
        let before = tree.snapshot();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tree.get_or_default((2, ""), |_| panic!("fill failed"))
        }));
        assert!(result.is_err());
        assert!(Arc::ptr_eq(&before, &tree.snapshot()));
        assert_eq!(tree.get(&(2, "")), None);
    }

    #[rstest]
    fn test_debug_shows_len() {
        let tree = AtomicBTree::<i32>::default();
        tree.set(1);
        let rendered = format!("{tree:?}");
        assert!(rendered.starts_with("AtomicBTree { len: 1"));
    }

    #[cfg(feature = "metrics")]
    #[rstest]
    fn test_shared_metrics_group_adds_up() {
        let metrics = Arc::new(TreeMetrics::default());
        let first = AtomicBTree::<i32>::default().with_metrics(Arc::clone(&metrics));
        let second = AtomicBTree::<i32>::default().with_metrics(Arc::clone(&metrics));
        first.set(1);
        second.set(1);
        second.set(2);

        assert!(Arc::ptr_eq(first.metrics(), &metrics));
        assert_eq!(metrics.set_calls.get(), 3);
        assert_eq!(first.telemetry().get(Operation::Set).unwrap().calls, 3);
    }

    /// Log output captured from one subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buffer);
            Ok(buffer.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Runs `body` with every event of this thread written to the returned
    /// buffer.
    fn with_captured_logs<R>(body: impl FnOnce() -> R) -> (R, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(LevelFilter::TRACE)
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, body);
        (result, logs.contents())
    }

    #[rstest]
    #[case(1, true)]
    #[case(2, false)]
    fn test_get_or_default_loses_round_to_nested_set(
        #[case] threshold: u32,
        #[case] expect_warning: bool,
    ) {
        let options = PublisherOptions::default().with_contention_warning_threshold(threshold);
        let tree = AtomicBTree::with_options(by_key as ByKey, options).unwrap();
        let mut fills = 0;

        let (value, logs) = with_captured_logs(|| {
            tree.get_or_default((1, "default"), |entry| {
                fills += 1;
                if fills == 1 {
                    // Publishes between this call's load and its CAS.
                    tree.set((1, "winner"));
                }
                entry.1 = "default";
            })
        });

        assert_eq!(value, (1, "winner"));
        assert_eq!(tree.get(&(1, "")), Some((1, "winner")));
        assert_eq!(fills, 1);
        assert_eq!(tree.len(), 1);
        assert!(logs.contains("cas_retry"), "{logs}");
        assert!(logs.contains("snapshot_published"), "{logs}");
        assert_eq!(logs.contains("writer_contention"), expect_warning, "{logs}");
    }

    #[cfg(feature = "metrics")]
    #[rstest]
    fn test_lost_round_is_counted_as_retry() {
        let tree = keyed_tree();
        let mut fills = 0;
        let value = tree.get_or_default((5, "default"), |entry| {
            fills += 1;
            if fills == 1 {
                tree.set((5, "winner"));
            }
        });
        assert_eq!(value, (5, "winner"));

        let report = tree.telemetry();
        assert_eq!(report.get(Operation::GetOrDefault).unwrap().retries, 1);
        assert_eq!(report.get(Operation::GetOrDefault).unwrap().calls, 1);
        assert_eq!(report.get(Operation::Set).unwrap().retries, 0);
        assert_eq!(report.total_retries(), 1);
        assert_eq!(tree.metrics().get_or_default_retries.get(), 1);
    }

    #[rstest]
    fn test_get_or_default_refills_when_winner_wrote_another_key() {
        let tree = keyed_tree();
        let mut fills = 0;
        let value = tree.get_or_default((5, ""), |entry| {
            fills += 1;
            if fills == 1 {
                tree.set((6, "other"));
            }
            entry.1 = "filled";
        });

        assert_eq!(value, (5, "filled"));
        assert_eq!(fills, 2);
        assert_eq!(tree.get(&(6, "")), Some((6, "other")));
        assert_eq!(tree.len(), 2);
    }

    #[rstest]
    fn test_uncontended_write_logs_no_retry() {
        let tree = AtomicBTree::<i32>::default();
        let ((), logs) = with_captured_logs(|| {
            tree.set(1);
        });
        assert!(logs.contains("snapshot_published"), "{logs}");
        assert!(!logs.contains("cas_retry"), "{logs}");
    }
}

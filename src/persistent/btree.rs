//! Persistent (copy-on-write) B-tree ordered by a caller-supplied predicate.
//!
//! This module provides two views of the same tree:
//!
//! - [`PersistentBTree`]: a privately owned, mutable draft.
//! - [`Snapshot`]: a frozen, shareable version that can only be read.
//!
//! A draft is produced from a snapshot with [`Snapshot::copy`] in O(1): the
//! draft shares every node with the snapshot. The first mutation that
//! reaches a shared node copies that node (and only that node) before
//! changing it, so a mutation copies at most one root-to-leaf path and the
//! snapshot it came from never changes. [`PersistentBTree::freeze`] consumes
//! the draft, so a frozen version can never be mutated again.
//!
//! - O(log N) get, set, delete, min, max
//! - O(log N) reverse seek
//! - O(log N + k) scans that stop after k items
//! - O(1) copy, freeze, len
//!
//! # Examples
//!
//! ```rust
//! use atomic_btree::persistent::PersistentBTree;
//!
//! let mut draft: PersistentBTree<i32> = PersistentBTree::default();
//! draft.set(3);
//! draft.set(1);
//! draft.set(2);
//! let version_one = draft.freeze();
//!
//! let mut draft = version_one.copy();
//! assert_eq!(draft.delete(&1), Some(1));
//! let version_two = draft.freeze();
//!
//! // Structural sharing: the older version is unchanged
//! assert_eq!(version_one.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
//! assert_eq!(version_two.iter().collect::<Vec<_>>(), vec![2, 3]);
//! ```
//!
//! # Internal Structure
//!
//! With minimum degree `d` the tree maintains:
//! 1. Every node holds at most `2d - 1` items
//! 2. Every node except the root holds at least `d - 1` items
//! 3. An internal node with `k` items has exactly `k + 1` children
//! 4. All leaves are at the same depth
//!
//! Inserts split full nodes on the way down and deletes grow thin nodes on
//! the way down, so neither ever has to walk back up.

use super::ReferenceCounter;
use super::ordering::{Less, Natural};
use crate::error::ConfigError;
use crate::options::Options;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::ops::Deref;

/// Frames kept inline by [`Iter`] before its stack spills to the heap.
const INLINE_DEPTH: usize = 16;

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node of the B-tree. Leaves have no children.
#[derive(Clone)]
struct Node<T> {
    items: Vec<T>,
    children: Vec<ReferenceCounter<Self>>,
}

/// What a removal walks down to.
enum Target<'a, T> {
    Item(&'a T),
    Max,
}

impl<T> Clone for Target<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Target<'_, T> {}

impl<T> Node<T> {
    fn leaf(item: T) -> Self {
        Self {
            items: vec![item],
            children: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the index of the first item not less than `item`, and
    /// whether that item is equal to it.
    fn find<L: Less<T>>(&self, item: &T, less: &L) -> (usize, bool) {
        let index = self
            .items
            .partition_point(|existing| less.less(existing, item));
        let found = index < self.items.len() && !less.less(item, &self.items[index]);
        (index, found)
    }

    /// In-order traversal. Returns `false` once `visit` asks to stop.
    fn ascend<'a, F: FnMut(&'a T) -> bool>(&'a self, visit: &mut F) -> bool {
        for (index, item) in self.items.iter().enumerate() {
            if let Some(child) = self.children.get(index)
                && !child.ascend(visit)
            {
                return false;
            }
            if !visit(item) {
                return false;
            }
        }
        self.children
            .get(self.items.len())
            .is_none_or(|child| child.ascend(visit))
    }

    /// Reverse in-order traversal of the whole subtree.
    fn descend<'a, F: FnMut(&'a T) -> bool>(&'a self, visit: &mut F) -> bool {
        if let Some(child) = self.children.get(self.items.len())
            && !child.descend(visit)
        {
            return false;
        }
        self.descend_items_below(self.items.len(), visit)
    }

    /// Reverse in-order traversal of the items `<= pivot`.
    fn descend_from<'a, L, F>(&'a self, pivot: &T, less: &L, visit: &mut F) -> bool
    where
        L: Less<T>,
        F: FnMut(&'a T) -> bool,
    {
        let (index, found) = self.find(pivot, less);
        if found {
            // children[index + 1] only holds items greater than the pivot.
            return self.descend_items_below(index + 1, visit);
        }
        if let Some(child) = self.children.get(index)
            && !child.descend_from(pivot, less, visit)
        {
            return false;
        }
        self.descend_items_below(index, visit)
    }

    /// Visits `items[..end]` in reverse, each followed by its left subtree.
    fn descend_items_below<'a, F: FnMut(&'a T) -> bool>(
        &'a self,
        end: usize,
        visit: &mut F,
    ) -> bool {
        for position in (0..end).rev() {
            if !visit(&self.items[position]) {
                return false;
            }
            if let Some(child) = self.children.get(position)
                && !child.descend(visit)
            {
                return false;
            }
        }
        true
    }
}

impl<T: Clone> Node<T> {
    /// Splits this node around `items[at]`, keeping the left half.
    /// Returns the median and the new right sibling.
    fn split(&mut self, at: usize) -> (T, Self) {
        let items = self.items.split_off(at + 1);
        let median = self.items.remove(at);
        let children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(at + 1)
        };
        (median, Self { items, children })
    }

    /// Splits `children[index]` if it is full. Returns whether it split.
    fn split_child_if_full(&mut self, index: usize, max_items: usize) -> bool {
        if self.children[index].items.len() < max_items {
            return false;
        }
        let child = ReferenceCounter::make_mut(&mut self.children[index]);
        let (median, right) = child.split(max_items / 2);
        self.items.insert(index, median);
        self.children
            .insert(index + 1, ReferenceCounter::new(right));
        true
    }

    /// Inserts or replaces `item` below a node that is not full.
    fn insert<L: Less<T>>(&mut self, item: T, max_items: usize, less: &L) -> Option<T> {
        let (mut index, found) = self.find(&item, less);
        if found {
            return Some(std::mem::replace(&mut self.items[index], item));
        }
        if self.is_leaf() {
            self.items.insert(index, item);
            return None;
        }
        if self.split_child_if_full(index, max_items) {
            match less.compare(&item, &self.items[index]) {
                Ordering::Less => {}
                Ordering::Greater => index += 1,
                Ordering::Equal => {
                    return Some(std::mem::replace(&mut self.items[index], item));
                }
            }
        }
        ReferenceCounter::make_mut(&mut self.children[index]).insert(item, max_items, less)
    }

    /// Removes `target` from this subtree. The caller guarantees this node
    /// holds more than `min_items` items unless it is the root.
    fn remove<L: Less<T>>(
        &mut self,
        target: Target<'_, T>,
        min_items: usize,
        less: &L,
    ) -> Option<T> {
        let (index, found) = match target {
            Target::Item(item) => self.find(item, less),
            Target::Max => (self.items.len(), false),
        };
        if self.is_leaf() {
            return match target {
                Target::Item(_) => found.then(|| self.items.remove(index)),
                Target::Max => self.items.pop(),
            };
        }
        if self.children[index].items.len() <= min_items {
            return self.grow_child_and_remove(index, target, min_items, less);
        }
        let child = ReferenceCounter::make_mut(&mut self.children[index]);
        if found {
            // Replace the separator with its in-order predecessor.
            let predecessor = child.remove(Target::Max, min_items, less)?;
            return Some(std::mem::replace(&mut self.items[index], predecessor));
        }
        child.remove(target, min_items, less)
    }

    /// Gives `children[index]` an extra item (by stealing from a sibling or
    /// merging with one) and retries the removal from this node.
    fn grow_child_and_remove<L: Less<T>>(
        &mut self,
        index: usize,
        target: Target<'_, T>,
        min_items: usize,
        less: &L,
    ) -> Option<T> {
        if index > 0 && self.children[index - 1].items.len() > min_items {
            self.steal_from_left(index);
        } else if index < self.items.len() && self.children[index + 1].items.len() > min_items {
            self.steal_from_right(index);
        } else if index >= self.items.len() {
            self.merge_children(index - 1);
        } else {
            self.merge_children(index);
        }
        self.remove(target, min_items, less)
    }

    fn steal_from_left(&mut self, index: usize) {
        let left = ReferenceCounter::make_mut(&mut self.children[index - 1]);
        let (Some(stolen), stolen_child) = (left.items.pop(), left.children.pop()) else {
            return;
        };
        let separator = std::mem::replace(&mut self.items[index - 1], stolen);
        let child = ReferenceCounter::make_mut(&mut self.children[index]);
        child.items.insert(0, separator);
        if let Some(stolen_child) = stolen_child {
            child.children.insert(0, stolen_child);
        }
    }

    fn steal_from_right(&mut self, index: usize) {
        let right = ReferenceCounter::make_mut(&mut self.children[index + 1]);
        let stolen_child = (!right.is_leaf()).then(|| right.children.remove(0));
        let stolen = right.items.remove(0);
        let separator = std::mem::replace(&mut self.items[index], stolen);
        let child = ReferenceCounter::make_mut(&mut self.children[index]);
        child.items.push(separator);
        if let Some(stolen_child) = stolen_child {
            child.children.push(stolen_child);
        }
    }

    /// Folds `items[index]` and `children[index + 1]` into `children[index]`.
    fn merge_children(&mut self, index: usize) {
        let separator = self.items.remove(index);
        let right = ReferenceCounter::unwrap_or_clone(self.children.remove(index + 1));
        let left = ReferenceCounter::make_mut(&mut self.children[index]);
        left.items.push(separator);
        left.items.extend(right.items);
        left.children.extend(right.children);
    }
}

// =============================================================================
// Snapshot Definition
// =============================================================================

/// A frozen version of a B-tree.
///
/// A `Snapshot` is immutable: no method takes `&mut self`, and the nodes it
/// points to are only ever copied, never changed, by drafts derived from it.
/// Cloning a snapshot is O(1) and shares every node.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `get`          | O(log N)          |
/// | `min`/`max`    | O(log N)          |
/// | `reverse_seek` | O(log N)          |
/// | `scan`         | O(log N + k)      |
/// | `copy`         | O(1)              |
/// | `len`          | O(1)              |
///
/// # Examples
///
/// ```rust
/// use atomic_btree::persistent::PersistentBTree;
///
/// let snapshot: atomic_btree::persistent::Snapshot<i32> =
///     [1, 3, 7, 10].into_iter().collect::<PersistentBTree<i32>>().freeze();
///
/// assert_eq!(snapshot.reverse_seek(&5), Some(&3));
/// assert_eq!(snapshot.reverse_seek(&0), None);
/// assert_eq!(snapshot.max(), Some(&10));
/// ```
pub struct Snapshot<T, L = Natural> {
    root: Option<ReferenceCounter<Node<T>>>,
    length: usize,
    less: ReferenceCounter<L>,
    options: Options,
}

impl<T, L> Clone for Snapshot<T, L> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            less: self.less.clone(),
            options: self.options,
        }
    }
}

impl<T, L> Snapshot<T, L> {
    /// Returns the number of items.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the snapshot holds no items.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the options the tree was built with.
    #[inline]
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the minimum degree of the tree.
    #[inline]
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.options.degree
    }

    /// Returns the ordering predicate.
    #[inline]
    #[must_use]
    pub fn comparator(&self) -> &L {
        &self.less
    }

    /// Returns a mutable draft that shares every node with this snapshot.
    ///
    /// Mutating the draft never affects this snapshot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atomic_btree::persistent::PersistentBTree;
    ///
    /// let original = [1, 2].into_iter().collect::<PersistentBTree<i32>>().freeze();
    /// let mut draft = original.copy();
    /// draft.set(3);
    ///
    /// assert_eq!(original.len(), 2);
    /// assert_eq!(draft.len(), 3);
    /// ```
    #[must_use]
    pub fn copy(&self) -> PersistentBTree<T, L> {
        PersistentBTree { view: self.clone() }
    }

    /// Returns the item with the greatest key.
    #[must_use]
    pub fn max(&self) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        while let Some(child) = node.children.last() {
            node = &**child;
        }
        node.items.last()
    }

    /// Returns the item with the smallest key.
    #[must_use]
    pub fn min(&self) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        while let Some(child) = node.children.first() {
            node = &**child;
        }
        node.items.first()
    }

    /// Calls `visit` on every item in ascending order until it returns
    /// `false`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atomic_btree::persistent::PersistentBTree;
    ///
    /// let snapshot = (1..=10).collect::<PersistentBTree<i32>>().freeze();
    /// let mut seen = Vec::new();
    /// snapshot.scan(|item| {
    ///     seen.push(*item);
    ///     *item < 3
    /// });
    /// assert_eq!(seen, vec![1, 2, 3]);
    /// ```
    pub fn scan<F>(&self, mut visit: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = &self.root {
            root.ascend(&mut visit);
        }
    }
}

impl<T, L: Less<T>> Snapshot<T, L> {
    /// Returns the stored item equal to `item` under the ordering.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atomic_btree::persistent::PersistentBTree;
    ///
    /// let by_key = |a: &(u32, &str), b: &(u32, &str)| a.0 < b.0;
    /// let mut draft = PersistentBTree::new(by_key);
    /// draft.set((7, "seven"));
    /// let snapshot = draft.freeze();
    ///
    /// assert_eq!(snapshot.get(&(7, "")), Some(&(7, "seven")));
    /// assert_eq!(snapshot.get(&(8, "")), None);
    /// ```
    #[must_use]
    pub fn get(&self, item: &T) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        loop {
            let (index, found) = node.find(item, &*self.less);
            if found {
                return Some(&node.items[index]);
            }
            node = &**node.children.get(index)?;
        }
    }

    /// Returns `true` if an item equal to `item` is stored.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.get(item).is_some()
    }

    /// Calls `visit` on every item `<= pivot` in descending order until it
    /// returns `false`.
    pub fn descend<F>(&self, pivot: &T, mut visit: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = &self.root {
            root.descend_from(pivot, &*self.less, &mut visit);
        }
    }

    /// Returns the greatest item that is `<= pivot`.
    ///
    /// This is the first item of [`descend`](Self::descend) from `pivot`.
    #[must_use]
    pub fn reverse_seek(&self, pivot: &T) -> Option<&T> {
        let mut result = None;
        if let Some(root) = &self.root {
            root.descend_from(pivot, &*self.less, &mut |item| {
                result = Some(item);
                false
            });
        }
        result
    }
}

impl<T: Clone, L> Snapshot<T, L> {
    /// Returns a lazy ascending iterator over clones of the items.
    ///
    /// The iterator keeps this version alive on its own, so it stays valid
    /// after the snapshot handle is dropped.
    #[must_use]
    pub fn iter(&self) -> Iter<T, L> {
        Iter::new(self.root.clone(), self.less.clone())
    }
}

impl<T: fmt::Debug, L> fmt::Debug for Snapshot<T, L> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = formatter.debug_set();
        self.scan(|item| {
            set.entry(item);
            true
        });
        set.finish()
    }
}

impl<T: Clone, L> IntoIterator for Snapshot<T, L> {
    type Item = T;
    type IntoIter = Iter<T, L>;

    fn into_iter(self) -> Self::IntoIter {
        Iter::new(self.root, self.less)
    }
}

impl<T: Clone, L> IntoIterator for &Snapshot<T, L> {
    type Item = T;
    type IntoIter = Iter<T, L>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// PersistentBTree Definition
// =============================================================================

/// A mutable, privately owned draft of a B-tree.
///
/// Every read operation of [`Snapshot`] is available through `Deref`.
/// Mutations copy shared nodes on first touch, so a draft obtained from
/// [`Snapshot::copy`] can be changed freely without disturbing any
/// published version. [`freeze`](Self::freeze) seals the draft.
///
/// # Examples
///
/// ```rust
/// use atomic_btree::persistent::PersistentBTree;
///
/// let mut draft: PersistentBTree<&str> = PersistentBTree::default();
/// assert_eq!(draft.set("a"), None);
/// assert_eq!(draft.set("a"), Some("a"));
/// assert_eq!(draft.delete(&"a"), Some("a"));
/// assert!(draft.freeze().is_empty());
/// ```
pub struct PersistentBTree<T, L = Natural> {
    view: Snapshot<T, L>,
}

impl<T, L> PersistentBTree<T, L> {
    /// Creates an empty draft ordered by `less` with default options.
    #[must_use]
    pub fn new(less: L) -> Self {
        Self::from_parts(less, Options::default())
    }

    /// Creates an empty draft ordered by `less`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `options` fail validation.
    pub fn with_options(less: L, options: Options) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self::from_parts(less, options))
    }

    fn from_parts(less: L, options: Options) -> Self {
        Self {
            view: Snapshot {
                root: None,
                length: 0,
                less: ReferenceCounter::new(less),
                options,
            },
        }
    }

    /// Seals the draft into an immutable [`Snapshot`].
    #[inline]
    #[must_use]
    pub fn freeze(self) -> Snapshot<T, L> {
        self.view
    }
}

impl<T: Clone, L: Less<T>> PersistentBTree<T, L> {
    /// Inserts `item`, replacing any stored item equal to it.
    ///
    /// Returns the replaced item.
    pub fn set(&mut self, item: T) -> Option<T> {
        let max_items = self.view.options.max_items();
        let less = &*self.view.less;
        let Some(root) = self.view.root.as_mut() else {
            self.view.root = Some(ReferenceCounter::new(Node::leaf(item)));
            self.view.length = 1;
            return None;
        };
        if root.items.len() >= max_items {
            let (median, right) = ReferenceCounter::make_mut(root).split(max_items / 2);
            let new_root = Node {
                items: vec![median],
                children: Vec::with_capacity(2),
            };
            let left = std::mem::replace(root, ReferenceCounter::new(new_root));
            ReferenceCounter::make_mut(root)
                .children
                .extend([left, ReferenceCounter::new(right)]);
        }
        let previous = ReferenceCounter::make_mut(root).insert(item, max_items, less);
        if previous.is_none() {
            self.view.length += 1;
        }
        previous
    }

    /// Removes the stored item equal to `item` and returns it.
    pub fn delete(&mut self, item: &T) -> Option<T> {
        let min_items = self.view.options.min_items();
        let less = &*self.view.less;
        let root = self.view.root.as_mut()?;
        let removed =
            ReferenceCounter::make_mut(root).remove(Target::Item(item), min_items, less);
        if root.items.is_empty() {
            let collapsed = root.children.first().cloned();
            self.view.root = collapsed;
        }
        if removed.is_some() {
            self.view.length -= 1;
        }
        removed
    }
}

impl<T, L> Deref for PersistentBTree<T, L> {
    type Target = Snapshot<T, L>;

    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

impl<T, L: Default> Default for PersistentBTree<T, L> {
    fn default() -> Self {
        Self::new(L::default())
    }
}

impl<T: fmt::Debug, L> fmt::Debug for PersistentBTree<T, L> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.view.fmt(formatter)
    }
}

impl<T: Clone, L: Less<T>> Extend<T> for PersistentBTree<T, L> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.set(item);
        }
    }
}

impl<T: Clone, L: Less<T> + Default> FromIterator<T> for PersistentBTree<T, L> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::default();
        tree.extend(iter);
        tree
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A lazy ascending iterator over one fixed version of a tree.
///
/// The iterator holds its own references to the nodes, so writers that
/// publish new versions never affect it. It yields clones of the items.
///
/// # Examples
///
/// ```rust
/// use atomic_btree::persistent::PersistentBTree;
///
/// let snapshot = [10, 20, 30, 40].into_iter().collect::<PersistentBTree<i32>>().freeze();
/// let mut iter = snapshot.iter();
/// iter.seek(&25);
/// assert_eq!(iter.collect::<Vec<_>>(), vec![30, 40]);
/// ```
pub struct Iter<T, L = Natural> {
    root: Option<ReferenceCounter<Node<T>>>,
    less: ReferenceCounter<L>,
    /// Nodes on the path to the next item, with the index of the next item
    /// to yield from each.
    stack: SmallVec<[(ReferenceCounter<Node<T>>, usize); INLINE_DEPTH]>,
}

impl<T, L> Iter<T, L> {
    fn new(root: Option<ReferenceCounter<Node<T>>>, less: ReferenceCounter<L>) -> Self {
        let mut iter = Self {
            root,
            less,
            stack: SmallVec::new(),
        };
        if let Some(root) = iter.root.clone() {
            iter.push_leftmost(root);
        }
        iter
    }

    fn push_leftmost(&mut self, mut node: ReferenceCounter<Node<T>>) {
        loop {
            let next = node.children.first().cloned();
            self.stack.push((node, 0));
            match next {
                Some(child) => node = child,
                None => break,
            }
        }
    }
}

impl<T, L: Less<T>> Iter<T, L> {
    /// Repositions the iterator at the first item `>= pivot`.
    ///
    /// Seeking may move backwards as well as forwards.
    pub fn seek(&mut self, pivot: &T) {
        self.stack.clear();
        let mut current = self.root.clone();
        while let Some(node) = current {
            let (index, found) = node.find(pivot, &*self.less);
            current = if found {
                None
            } else {
                node.children.get(index).cloned()
            };
            self.stack.push((node, index));
        }
    }
}

impl<T: Clone, L> Iterator for Iter<T, L> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, index) = self.stack.last_mut()?;
            if *index < node.items.len() {
                let item = node.items[*index].clone();
                *index += 1;
                let child = node.children.get(*index).cloned();
                if let Some(child) = child {
                    self.push_leftmost(child);
                }
                return Some(item);
            }
            self.stack.pop();
        }
    }
}

impl<T: Clone, L> FusedIterator for Iter<T, L> {}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T, L> serde::Serialize for Snapshot<T, L>
where
    T: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;

        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        let mut outcome = Ok(());
        self.scan(|item| {
            outcome = sequence.serialize_element(item);
            outcome.is_ok()
        });
        outcome?;
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct SnapshotVisitor<T, L> {
    marker: std::marker::PhantomData<(T, L)>,
}

#[cfg(feature = "serde")]
impl<'de, T, L> serde::de::Visitor<'de> for SnapshotVisitor<T, L>
where
    T: serde::Deserialize<'de> + Clone,
    L: Less<T> + Default,
{
    type Value = Snapshot<T, L>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of items")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut tree = PersistentBTree::default();
        while let Some(item) = access.next_element()? {
            tree.set(item);
        }
        Ok(tree.freeze())
    }
}

#[cfg(feature = "serde")]
impl<'de, T, L> serde::Deserialize<'de> for Snapshot<T, L>
where
    T: serde::Deserialize<'de> + Clone,
    L: Less<T> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(SnapshotVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests (arc feature only)
// =============================================================================

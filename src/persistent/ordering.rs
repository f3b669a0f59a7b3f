//! Item ordering.
//!
//! Trees are ordered by a caller-supplied "less than" predicate instead of
//! requiring `T: Ord`, so one item type can carry both a key and a payload
//! and be ordered by the key alone.
//!
//! # Preconditions
//!
//! The predicate must be a strict weak order: irreflexive, transitive, and
//! with transitive incomparability. Two items are treated as the same slot
//! when neither is less than the other. A predicate that breaks these rules
//! leaves lookups and traversals unspecified; it is not detected.
//!
//! # Examples
//!
//! ```rust
//! use atomic_btree::persistent::{Less, Natural};
//!
//! let by_key = |a: &(u32, &str), b: &(u32, &str)| a.0 < b.0;
//! assert!(by_key.less(&(1, "b"), &(2, "a")));
//! assert!(Natural.less(&1, &2));
//! ```

use std::cmp::Ordering;

/// A strict weak order over `T`.
pub trait Less<T: ?Sized> {
    /// Returns `true` when `a` sorts strictly before `b`.
    fn less(&self, a: &T, b: &T) -> bool;

    /// Three-way comparison derived from [`less`](Self::less).
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        if self.less(a, b) {
            Ordering::Less
        } else if self.less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl<T: ?Sized, F> Less<T> for F
where
    F: Fn(&T, &T) -> bool,
{
    #[inline]
    fn less(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}

/// Orders items by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Natural;

impl<T: Ord + ?Sized> Less<T> for Natural {
    #[inline]
    fn less(&self, a: &T, b: &T) -> bool {
        a < b
    }

    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

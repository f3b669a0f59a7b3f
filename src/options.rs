//! Tree and publisher configuration.
//!
//! [`Options`] shapes a persistent tree: the degree only trades node width
//! against height. [`PublisherOptions`] wraps it with the settings that only
//! the atomic publisher reads: whether telemetry is recorded and when
//! contention is logged.
//!
//! # Examples
//!
//! ```rust
//! use atomic_btree::options::Options;
//!
//! let options = Options::default().with_degree(8);
//! assert!(options.validate().is_ok());
//! assert_eq!(options.max_items(), 15);
//! ```

use crate::error::ConfigError;

/// Default minimum degree.
pub const DEFAULT_DEGREE: usize = 32;

/// Default number of lost compare-and-swap rounds after which a single call
/// logs a contention warning.
pub const DEFAULT_CONTENTION_WARNING_THRESHOLD: u32 = 64;

/// Shape of a [`PersistentBTree`](crate::persistent::PersistentBTree).
///
/// With the `serde` feature, missing fields fall back to their defaults so
/// hosts can embed a partial `Options` table in their own configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Minimum degree `d` of the B-tree. Nodes hold at most `2d - 1` items
    /// and, apart from the root, at least `d - 1`.
    pub degree: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            degree: DEFAULT_DEGREE,
        }
    }
}

impl Options {
    /// Returns these options with a different minimum degree.
    #[must_use]
    pub const fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    /// Checks that the options describe a valid tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDegree`] when `degree < 2`.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.degree < 2 {
            return Err(ConfigError::InvalidDegree {
                degree: self.degree,
            });
        }
        Ok(())
    }

    /// Maximum number of items a node may hold.
    #[inline]
    #[must_use]
    pub const fn max_items(&self) -> usize {
        (self.degree * 2).saturating_sub(1)
    }

    /// Minimum number of items a non-root node must hold.
    #[inline]
    #[must_use]
    pub const fn min_items(&self) -> usize {
        self.degree.saturating_sub(1)
    }
}

/// Configuration of an [`AtomicBTree`](crate::concurrent::AtomicBTree).
///
/// # Examples
///
/// ```rust
/// use atomic_btree::options::PublisherOptions;
///
/// let options = PublisherOptions::default()
///     .with_degree(4)
///     .with_telemetry(false)
///     .with_contention_warning_threshold(8);
/// assert!(options.validate().is_ok());
/// assert_eq!(options.tree.degree, 4);
/// ```
#[cfg(feature = "concurrent")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PublisherOptions {
    /// Shape of every published snapshot.
    pub tree: Options,
    /// Whether per-operation metrics are recorded.
    pub record_telemetry: bool,
    /// Lost CAS rounds after which one writer call logs a warning.
    pub contention_warning_threshold: u32,
}

#[cfg(feature = "concurrent")]
impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            tree: Options::default(),
            record_telemetry: true,
            contention_warning_threshold: DEFAULT_CONTENTION_WARNING_THRESHOLD,
        }
    }
}

#[cfg(feature = "concurrent")]
impl PublisherOptions {
    /// Returns these options with a different minimum degree.
    #[must_use]
    pub const fn with_degree(mut self, degree: usize) -> Self {
        self.tree = self.tree.with_degree(degree);
        self
    }

    /// Returns these options with telemetry recording switched on or off.
    #[must_use]
    pub const fn with_telemetry(mut self, record_telemetry: bool) -> Self {
        self.record_telemetry = record_telemetry;
        self
    }

    /// Returns these options with a different contention warning threshold.
    #[must_use]
    pub const fn with_contention_warning_threshold(mut self, threshold: u32) -> Self {
        self.contention_warning_threshold = threshold;
        self
    }

    /// Checks the tree shape and the publisher settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDegree`] when the degree is below 2 and
    /// [`ConfigError::InvalidContentionThreshold`] when the threshold is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if let Err(error) = self.tree.validate() {
            return Err(error);
        }
        if self.contention_warning_threshold == 0 {
            return Err(ConfigError::InvalidContentionThreshold);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_default_options_are_valid() {
        let options = Options::default();
        assert_eq!(options.degree, DEFAULT_DEGREE);
        assert!(options.validate().is_ok());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn test_validate_rejects_small_degree(#[case] degree: usize) {
        let options = Options::default().with_degree(degree);
        assert_eq!(
            options.validate(),
            Err(ConfigError::InvalidDegree { degree })
        );
    }

    #[rstest]
    #[case(2, 3, 1)]
    #[case(3, 5, 2)]
    #[case(32, 63, 31)]
    fn test_node_bounds(#[case] degree: usize, #[case] max: usize, #[case] min: usize) {
        let options = Options::default().with_degree(degree);
        assert_eq!(options.max_items(), max);
        assert_eq!(options.min_items(), min);
    }
}

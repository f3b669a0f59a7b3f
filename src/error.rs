//! Error types.
//!
//! Tree operations never fail: contention is retried and caller callbacks
//! that panic unwind straight through. The only fallible step is building a
//! tree from options that cannot describe a valid B-tree or publisher.

use thiserror::Error;

/// Error returned when tree or publisher options are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The minimum degree must be at least 2 (a 2-3-4 tree).
    #[error("invalid degree {degree}: a B-tree needs a minimum degree of at least 2")]
    InvalidDegree {
        /// The rejected degree.
        degree: usize,
    },

    /// The contention warning threshold must be non-zero.
    #[error("contention warning threshold must be at least 1")]
    InvalidContentionThreshold,
}

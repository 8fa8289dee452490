//! Fingerprint score record.

use serde::{Deserialize, Serialize};

/// Vanity score of one fingerprint suffix.
///
/// Computed once by the scoring engine and never mutated afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    /// Cost of the longest run of a repeated digit.
    pub repeat: i32,
    /// Cost of the longest cyclic ascending run.
    pub increasing: i32,
    /// Cost of the longest cyclic descending run.
    pub decreasing: i32,
    /// `-100` when the suffix contains `49`, otherwise `0`.
    pub magic: i32,
    /// Number of distinct hex digit values present (0..=16).
    pub unique_digits: i32,
}

impl Score {
    /// Sum of the four score components. Uniqueness is not part of it.
    pub fn total(&self) -> i32 {
        self.repeat + self.increasing + self.decreasing + self.magic
    }
}

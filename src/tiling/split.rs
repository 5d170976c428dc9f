//! Main/tail partition of an iteration count across workers

use serde::{Deserialize, Serialize};

/// Partition of `total` units into `used` chunks of `factor`, the last one
/// holding `tail`
///
/// `factor * (used - 1) + tail == total` and `0 < tail <= factor` whenever
/// `total > 0`. An empty total yields an all-zero split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockSplit {
    pub total: u64,
    /// Units per chunk, all but the last
    pub factor: u64,
    /// Number of chunks
    pub used: u64,
    /// Units in the last chunk
    pub tail: u64,
}

impl BlockSplit {
    /// Split `total` over at most `workers` chunks
    ///
    /// ```
    /// use trueno_strided::tiling::BlockSplit;
    ///
    /// let split = BlockSplit::new(35, 3);
    /// assert_eq!((split.factor, split.used, split.tail), (12, 3, 11));
    /// ```
    #[must_use]
    pub fn new(total: u64, workers: u64) -> Self {
        if total == 0 || workers == 0 {
            return Self::default();
        }
        let factor = total.div_ceil(workers);
        let used = total.div_ceil(factor);
        let tail = total - (used - 1) * factor;
        Self {
            total,
            factor,
            used,
            tail,
        }
    }

    /// Units handled by chunk `idx`
    pub fn len_of(&self, idx: u64) -> u64 {
        match idx {
            i if i + 1 < self.used => self.factor,
            i if i + 1 == self.used => self.tail,
            _ => 0,
        }
    }

    /// First unit of chunk `idx`
    pub fn start_of(&self, idx: u64) -> u64 {
        idx * self.factor
    }
}

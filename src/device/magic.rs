//! Division by a loop-invariant `u32`
//!
//! The per-element kernel divides every output index by the same few axis
//! sizes. [`FastDivisor`] replaces each division with a multiply, add and
//! shift using a precomputed magic number; [`PlainDivisor`] is the `/`
//! reference. Both implement [`Divisor`] so kernels are generic over them and
//! the `reference-div` feature can swap one for the other.

use std::fmt::Debug;

/// Division by a fixed non-zero divisor
pub trait Divisor: Copy + Debug + Send + Sync {
    /// Precompute for `d`; a zero divisor is treated as 1
    fn new(d: u32) -> Self;

    fn divisor(&self) -> u32;

    /// `n / d`
    fn div(&self, n: u32) -> u32;

    /// `(n / d, n % d)`
    fn div_rem(&self, n: u32) -> (u32, u32) {
        let q = self.div(n);
        (q, n - q * self.divisor())
    }
}

/// Reciprocal-multiply divisor
///
/// With `s = ceil(log2 d)` and `m = floor(2^32 · (2^s − d) / d) + 1`, the
/// quotient is `((n · m >> 32) + n) >> s` for every `n < 2^32`.
///
/// ```
/// use trueno_strided::device::{Divisor, FastDivisor};
///
/// let by7 = FastDivisor::new(7);
/// assert_eq!(by7.div(100), 14);
/// assert_eq!(by7.div_rem(100), (14, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastDivisor {
    d: u32,
    magic: u64,
    shift: u32,
}

impl Divisor for FastDivisor {
    fn new(d: u32) -> Self {
        let d = d.max(1);
        let shift = 32 - (d - 1).leading_zeros();
        let magic = ((1u64 << 32) * ((1u64 << shift) - u64::from(d))) / u64::from(d) + 1;
        Self { d, magic, shift }
    }

    fn divisor(&self) -> u32 {
        self.d
    }

    #[inline]
    fn div(&self, n: u32) -> u32 {
        let n = u64::from(n);
        let hi = (n * self.magic) >> 32;
        ((hi + n) >> self.shift) as u32
    }
}

/// Hardware `/` divisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainDivisor {
    d: u32,
}

impl Divisor for PlainDivisor {
    fn new(d: u32) -> Self {
        Self { d: d.max(1) }
    }

    fn divisor(&self) -> u32 {
        self.d
    }

    #[inline]
    fn div(&self, n: u32) -> u32 {
        n / self.d
    }
}

/// Divisor used by the per-element kernel
#[cfg(not(feature = "reference-div"))]
pub type DefaultDivisor = FastDivisor;
/// Divisor used by the per-element kernel
#[cfg(feature = "reference-div")]
pub type DefaultDivisor = PlainDivisor;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_divisors_exhaustive() {
        for d in 1..=64u32 {
            let fast = FastDivisor::new(d);
            for n in 0..5000u32 {
                assert_eq!(fast.div(n), n / d, "{n} / {d}");
            }
        }
    }

    #[test]
    fn test_extremes() {
        let small = [1, 2, 3, 7, 1 << 16];
        let large = [(1 << 31) - 1, 1 << 31, u32::MAX - 1, u32::MAX];
        for d in small.into_iter().chain(large) {
            let fast = FastDivisor::new(d);
            let near = [d - 1, d, d.saturating_add(1)];
            for n in [0, 1, u32::MAX - 1, u32::MAX].into_iter().chain(near) {
                assert_eq!(fast.div(n), n / d, "{n} / {d}");
            }
        }
    }

    #[test]
    fn test_zero_divisor_clamps() {
        assert_eq!(FastDivisor::new(0).div(9), 9);
        assert_eq!(PlainDivisor::new(0).div(9), 9);
    }

    proptest! {
        #[test]
        fn fast_matches_plain(n in any::<u32>(), d in 1u32..) {
            let fast = FastDivisor::new(d);
            let plain = PlainDivisor::new(d);
            prop_assert_eq!(fast.div(n), plain.div(n));
            prop_assert_eq!(fast.div_rem(n), plain.div_rem(n));
        }
    }
}

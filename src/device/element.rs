//! Element storage classes and gather index lanes
//!
//! Layout kernels move bits, not numbers, so they are generic over four
//! storage types (`u8`, `u16`, `u32`, `u64`), one per width class. Each class
//! picks the narrowest index lane that keeps a vector register full: `u16`
//! lanes for elements up to two bytes, `u32` otherwise.

use std::fmt::Debug;
use std::mem::size_of;

use bytemuck::Pod;

use crate::error::{LayoutError, Result};

/// Vector register width of the default device, in bytes
pub const VECTOR_BYTES: usize = 256;

/// Integer type of one gather index lane
pub trait IndexLane: Pod + Default + Debug + PartialEq + Send + Sync {
    /// Narrow `value`; callers guarantee it fits the lane
    fn from_u64(value: u64) -> Self;

    fn to_u64(self) -> u64;

    /// Lanes in a vector register of `vector_bytes`
    fn lanes(vector_bytes: usize) -> usize {
        (vector_bytes / size_of::<Self>()).max(1)
    }
}

impl IndexLane for u16 {
    fn from_u64(value: u64) -> Self {
        value as u16
    }

    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl IndexLane for u32 {
    fn from_u64(value: u64) -> Self {
        value as u32
    }

    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

/// Storage type of one tensor element
pub trait Element: Pod + Default + Debug + PartialEq + Send + Sync {
    /// Gather index lane for this width
    type Index: IndexLane;

    /// Element width in bytes
    const WIDTH: usize = size_of::<Self>();

    /// `dst[k] = src[idx[k] + offset]` for every `k < dst.len()`
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InnerNull`] if an index falls outside `src`.
    fn gather(src: &[Self], idx: &[Self::Index], offset: usize, dst: &mut [Self]) -> Result<()> {
        for (d, &i) in dst.iter_mut().zip(idx) {
            *d = *lookup(src, i.to_u64() as usize + offset)?;
        }
        Ok(())
    }
}

/// Index lane width, in bytes, of the storage class `width` maps to
pub fn index_width(width: usize) -> Option<usize> {
    match width {
        1 => Some(size_of::<<u8 as Element>::Index>()),
        2 => Some(size_of::<<u16 as Element>::Index>()),
        4 => Some(size_of::<<u32 as Element>::Index>()),
        8 => Some(size_of::<<u64 as Element>::Index>()),
        _ => None,
    }
}

fn lookup<T>(src: &[T], pos: usize) -> Result<&T> {
    src.get(pos)
        .ok_or_else(|| LayoutError::InnerNull(format!("gather index {pos} beyond {}", src.len())))
}

/// Byte elements have no byte-granular gather: values are widened into
/// 16-bit lanes, gathered, then packed back down.
impl Element for u8 {
    type Index = u16;

    fn gather(src: &[Self], idx: &[u16], offset: usize, dst: &mut [Self]) -> Result<()> {
        let mut wide = [0u16; VECTOR_BYTES / 2];
        let chunks = dst.chunks_mut(wide.len()).zip(idx.chunks(wide.len()));
        for (dst_chunk, idx_chunk) in chunks {
            for (w, &i) in wide.iter_mut().zip(idx_chunk) {
                *w = u16::from(*lookup(src, usize::from(i) + offset)?);
            }
            for (d, &w) in dst_chunk.iter_mut().zip(&wide) {
                *d = w as u8;
            }
        }
        Ok(())
    }
}

impl Element for u16 {
    type Index = u16;
}

impl Element for u32 {
    type Index = u32;
}

impl Element for u64 {
    type Index = u32;
}

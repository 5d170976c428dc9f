//! Block-transfer primitives between global memory and scratch
//!
//! Two shapes of transfer exist:
//!
//! - [`NdDma`]: up to five nested `(extent, src stride, dst stride)` levels,
//!   global memory into scratch. Level 0 is outermost.
//! - [`RowCopy`]: `block_count` rows of `block_len` elements with independent
//!   row pitches on each side, in either direction.
//!
//! Both validate their whole footprint before moving a byte. A transfer that
//! would leave its buffers returns [`LayoutError::InnerNull`] and nothing is
//! written.

use bytemuck::Pod;

use super::memory::GlobalMemory;
use crate::error::{LayoutError, Result};
use crate::tiling::block::DMA_LEVELS;

/// Five-level strided descriptor, all quantities in elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdDma {
    /// Iterations per level, outermost first
    pub loops: [u64; DMA_LEVELS],
    pub src_strides: [u64; DMA_LEVELS],
    /// Scratch strides; a level with stride 0 rewrites the same elements
    pub dst_strides: [u64; DMA_LEVELS],
}

impl Default for NdDma {
    fn default() -> Self {
        Self {
            loops: [1; DMA_LEVELS],
            src_strides: [0; DMA_LEVELS],
            dst_strides: [0; DMA_LEVELS],
        }
    }
}

impl NdDma {
    /// Elements moved by one issue
    pub fn elems(&self) -> u64 {
        self.loops.iter().product()
    }

    fn extent(&self, strides: &[u64; DMA_LEVELS]) -> u64 {
        if self.loops.contains(&0) {
            return 0;
        }
        self.loops
            .iter()
            .zip(strides)
            .fold(1, |acc, (&l, &s)| acc + (l - 1) * s)
    }

    /// Elements of source touched, counted from the base
    pub fn src_extent(&self) -> u64 {
        self.extent(&self.src_strides)
    }

    /// Elements of scratch touched, counted from the base
    pub fn dst_extent(&self) -> u64 {
        self.extent(&self.dst_strides)
    }

    /// Copy with `loops[level]` replaced
    #[must_use]
    pub fn with_loop(mut self, level: usize, extent: u64) -> Self {
        if let Some(slot) = self.loops.get_mut(level) {
            *slot = extent;
        }
        self
    }

    /// Issue the descriptor: global memory at element `src_base` into `ub`
    ///
    /// Returns the number of elements moved.
    pub fn copy_in<T: Pod>(&self, gm: &GlobalMemory, src_base: u64, ub: &mut [T]) -> Result<u64> {
        let width = std::mem::size_of::<T>() as u64;
        if self.dst_extent() > ub.len() as u64 {
            return Err(LayoutError::InnerNull(format!(
                "nd_dma writes {} scratch elements, slot holds {}",
                self.dst_extent(),
                ub.len()
            )));
        }
        if (src_base + self.src_extent()) * width > gm.len() as u64 {
            return Err(LayoutError::InnerNull(format!(
                "nd_dma reads {}+{} elements beyond source",
                src_base,
                self.src_extent()
            )));
        }
        if self.elems() == 0 {
            return Ok(0);
        }
        let [l0, l1, l2, l3, l4] = self.loops;
        let [s0, s1, s2, s3, s4] = self.src_strides;
        let [d0, d1, d2, d3, d4] = self.dst_strides;
        let run = l4 as usize;
        for i0 in 0..l0 {
            for i1 in 0..l1 {
                for i2 in 0..l2 {
                    for i3 in 0..l3 {
                        let src = src_base + i0 * s0 + i1 * s1 + i2 * s2 + i3 * s3;
                        let dst = (i0 * d0 + i1 * d1 + i2 * d2 + i3 * d3) as usize;
                        if s4 == 1 && d4 == 1 {
                            gm.read_elems(src, &mut ub[dst..dst + run])?;
                        } else {
                            for i4 in 0..l4 {
                                ub[dst + (i4 * d4) as usize] = gm.read(src + i4 * s4)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(self.elems())
    }
}

/// Row-wise transfer with padding, pitches in elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCopy {
    /// Number of rows
    pub block_count: u64,
    /// Elements per row
    pub block_len: u64,
    /// Distance between row starts on the source side
    pub src_pitch: u64,
    /// Distance between row starts on the destination side
    pub dst_pitch: u64,
}

impl RowCopy {
    /// One contiguous block of `len` elements
    pub fn contiguous(len: u64) -> Self {
        Self {
            block_count: 1,
            block_len: len,
            src_pitch: len,
            dst_pitch: len,
        }
    }

    pub fn elems(&self) -> u64 {
        self.block_count * self.block_len
    }

    fn footprint(count: u64, len: u64, pitch: u64) -> u64 {
        if count == 0 || len == 0 {
            0
        } else {
            (count - 1) * pitch + len
        }
    }

    fn check_pitches(&self) -> Result<()> {
        let short_pitch = self.src_pitch < self.block_len || self.dst_pitch < self.block_len;
        if self.block_count > 1 && short_pitch {
            return Err(LayoutError::InnerNull(format!(
                "row copy pitch smaller than row: {self:?}"
            )));
        }
        Ok(())
    }

    /// Global memory at element `src_base` into `ub[ub_base..]`
    pub fn copy_in<T: Pod>(
        &self,
        gm: &GlobalMemory,
        src_base: u64,
        ub: &mut [T],
        ub_base: usize,
    ) -> Result<u64> {
        self.check_pitches()?;
        let span = Self::footprint(self.block_count, self.block_len, self.dst_pitch);
        let need = ub_base as u64 + span;
        if need > ub.len() as u64 {
            return Err(LayoutError::InnerNull(format!(
                "row copy-in needs {need} scratch elements, slot holds {}",
                ub.len()
            )));
        }
        let len = self.block_len as usize;
        for row in 0..self.block_count {
            let dst = ub_base + (row * self.dst_pitch) as usize;
            gm.read_elems(src_base + row * self.src_pitch, &mut ub[dst..dst + len])?;
        }
        Ok(self.elems())
    }

    /// `ub[ub_base..]` into global memory at element `dst_base`
    pub fn copy_out<T: Pod>(
        &self,
        ub: &[T],
        ub_base: usize,
        gm: &GlobalMemory,
        dst_base: u64,
    ) -> Result<u64> {
        self.check_pitches()?;
        let span = Self::footprint(self.block_count, self.block_len, self.src_pitch);
        let need = ub_base as u64 + span;
        if need > ub.len() as u64 {
            return Err(LayoutError::InnerNull(format!(
                "row copy-out reads {need} scratch elements, slot holds {}",
                ub.len()
            )));
        }
        let width = std::mem::size_of::<T>() as u64;
        let end = dst_base + Self::footprint(self.block_count, self.block_len, self.dst_pitch);
        if end * width > gm.len() as u64 {
            return Err(LayoutError::InnerNull(format!(
                "row copy-out writes up to element {end} beyond destination"
            )));
        }
        let len = self.block_len as usize;
        for row in 0..self.block_count {
            let src = ub_base + (row * self.src_pitch) as usize;
            gm.write_elems(dst_base + row * self.dst_pitch, &ub[src..src + len])?;
        }
        Ok(self.elems())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(n: u32) -> GlobalMemory {
        GlobalMemory::from_slice(&(0..n).collect::<Vec<u32>>())
    }

    #[test]
    fn test_nd_dma_transpose() {
        // 3x4 source read column-major into a 4x3 scratch tile
        let gm = iota(12);
        let desc = NdDma {
            loops: [1, 1, 1, 4, 3],
            src_strides: [0, 0, 0, 1, 4],
            dst_strides: [0, 0, 0, 3, 1],
        };
        let mut ub = vec![0u32; 12];
        assert_eq!(desc.copy_in(&gm, 0, &mut ub).unwrap(), 12);
        assert_eq!(ub, vec![0, 4, 8, 1, 5, 9, 2, 6, 10, 3, 7, 11]);
    }

    #[test]
    fn test_nd_dma_contiguous_run_with_base() {
        let gm = iota(16);
        let desc = NdDma {
            loops: [1, 1, 1, 2, 3],
            src_strides: [0, 0, 0, 8, 1],
            dst_strides: [0, 0, 0, 4, 1],
        };
        let mut ub = vec![0u32; 8];
        desc.copy_in(&gm, 2, &mut ub).unwrap();
        assert_eq!(ub, vec![2, 3, 4, 0, 10, 11, 12, 0]);
        assert_eq!(desc.src_extent(), 11);
        assert_eq!(desc.dst_extent(), 7);
    }

    #[test]
    fn test_nd_dma_rejects_overrun() {
        let gm = iota(4);
        let desc = NdDma::default().with_loop(4, 5).with_loop(3, 1);
        let desc = NdDma {
            src_strides: [0, 0, 0, 0, 1],
            dst_strides: [0, 0, 0, 0, 1],
            ..desc
        };
        let mut ub = vec![0u32; 8];
        assert!(matches!(
            desc.copy_in(&gm, 0, &mut ub),
            Err(LayoutError::InnerNull(_))
        ));
        let mut small = vec![0u32; 2];
        assert!(desc.copy_in(&iota(8), 0, &mut small).is_err());
    }

    #[test]
    fn test_row_copy_padding_round_trip() {
        // three rows of 5 u32 padded to 8 in scratch, then packed again
        let gm = iota(15);
        let rows_in = RowCopy {
            block_count: 3,
            block_len: 5,
            src_pitch: 5,
            dst_pitch: 8,
        };
        let mut ub = vec![u32::MAX; 24];
        rows_in.copy_in(&gm, 0, &mut ub, 0).unwrap();
        assert_eq!(&ub[8..13], &[5, 6, 7, 8, 9]);
        assert_eq!(ub[5], u32::MAX);

        let out = GlobalMemory::zeroed(15 * 4);
        let rows_out = RowCopy {
            src_pitch: 8,
            dst_pitch: 5,
            ..rows_in
        };
        assert_eq!(rows_out.copy_out(&ub, 0, &out, 0).unwrap(), 15);
        assert_eq!(out.to_typed::<u32>(), (0..15).collect::<Vec<u32>>());
    }

    #[test]
    fn test_row_copy_bounds() {
        let out = GlobalMemory::zeroed(8);
        let ub = [1u32, 2, 3];
        assert!(RowCopy::contiguous(3).copy_out(&ub, 0, &out, 0).is_err());
        assert!(RowCopy::contiguous(2).copy_out(&ub, 0, &out, 0).is_ok());
        let bad = RowCopy {
            block_count: 2,
            block_len: 2,
            src_pitch: 1,
            dst_pitch: 2,
        };
        assert!(bad.copy_out(&ub, 0, &out, 0).is_err());
    }
}

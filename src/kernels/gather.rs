//! Index-buffer gather
//!
//! Each core loads the whole source window into scratch once, builds one
//! index buffer describing a main tile, then turns every iteration into a
//! vector gather at the iteration's source offset followed by a contiguous
//! store. A tail tile shortens only its outermost level, so its indices are
//! a prefix of the main buffer.
//!
//! The index buffer is filled a vector register at a time. Every lane keeps
//! its own coordinate over the (up to) three tile levels and advances by a
//! fixed per-vector increment with single-subtract carries, so no division
//! happens after the first register.

use std::marker::PhantomData;

use crate::device::dma::RowCopy;
use crate::device::element::{Element, IndexLane};
use crate::device::launch::{CoreContext, CoreKernel, CoreStats};
use crate::device::queue::{pipeline, SlotQueue};
use crate::error::{LayoutError, Result};
use crate::tiling::{GatherParams, DMA_LEVELS};

/// Levels of a gather tile, innermost last
pub const GATHER_LEVELS: usize = 3;

/// Tile shape an index buffer describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLevels {
    /// Trip count per level, outermost first
    pub loops: [u64; GATHER_LEVELS],
    /// Source stride per level, in elements
    pub strides: [u64; GATHER_LEVELS],
}

impl TileLevels {
    pub fn elems(&self) -> u64 {
        self.loops.iter().product()
    }

    /// Source offset of the `k`-th tile element in row-major order
    fn offset_of(&self, k: u64) -> u64 {
        let [_, b, a] = self.loops;
        let [s2, s1, s0] = self.strides;
        (k % a) * s0 + (k / a % b) * s1 + (k / (a * b)) * s2
    }
}

/// Fill `idx` with the offsets of the first `idx.len()` tile elements,
/// one vector register of `lanes` at a time
pub fn build_index<I: IndexLane>(tile: &TileLevels, lanes: usize, idx: &mut [I]) {
    let [_, b, a] = tile.loops;
    let [s2, s1, s0] = tile.strides;
    let (a, b) = (a.max(1), b.max(1));
    let lanes = lanes.max(1);
    let vl = lanes as u64;

    let last_dim_inc = vl % a;
    let last_2nd_dim_inc = vl / a % b;
    let last_3rd_dim_inc = vl / (a * b);

    let mut dim1: Vec<u64> = (0..vl).map(|k| k % a).collect();
    let mut dim2: Vec<u64> = (0..vl).map(|k| k / a % b).collect();
    let mut dim3: Vec<u64> = (0..vl).map(|k| k / (a * b)).collect();

    for chunk in idx.chunks_mut(lanes) {
        for (lane, out) in chunk.iter_mut().enumerate() {
            *out = I::from_u64(dim1[lane] * s0 + dim2[lane] * s1 + dim3[lane] * s2);
        }
        for lane in 0..lanes {
            dim1[lane] += last_dim_inc;
            let carry1 = u64::from(dim1[lane] >= a);
            dim1[lane] -= carry1 * a;
            dim2[lane] += last_2nd_dim_inc + carry1;
            let carry2 = u64::from(dim2[lane] >= b);
            dim2[lane] -= carry2 * b;
            dim3[lane] += last_3rd_dim_inc + carry2;
        }
    }
}

/// Same buffer as [`build_index`], recomputed per element with division
pub fn reference_index<I: IndexLane>(tile: &TileLevels, idx: &mut [I]) {
    for (k, out) in idx.iter_mut().enumerate() {
        *out = I::from_u64(tile.offset_of(k as u64));
    }
}

pub struct GatherKernel<'p, T> {
    params: &'p GatherParams,
    storage_offset: u64,
    _elem: PhantomData<T>,
}

impl<'p, T: Element> GatherKernel<'p, T> {
    pub fn new(params: &'p GatherParams, storage_offset: u64) -> Self {
        Self {
            params,
            storage_offset,
            _elem: PhantomData,
        }
    }

    /// Main tile levels, taken from the innermost descriptor levels
    pub fn tile(&self) -> TileLevels {
        let main = &self.params.cut.main;
        let lvl = DMA_LEVELS - GATHER_LEVELS;
        let mut tile = TileLevels {
            loops: [1; GATHER_LEVELS],
            strides: [0; GATHER_LEVELS],
        };
        tile.loops.copy_from_slice(&main.loops[lvl..]);
        tile.strides.copy_from_slice(&main.src_strides[lvl..]);
        tile
    }

    fn compute_core_offset(&self, core: u64) -> std::ops::Range<u64> {
        let split = &self.params.split;
        let first = split.start_of(core);
        first..first + split.len_of(core)
    }

    fn load_source(&self, ctx: &CoreContext<'_>) -> Result<Vec<T>> {
        let span = usize::try_from(self.params.span)
            .map_err(|_| LayoutError::Overflow(format!("gather window {}", self.params.span)))?;
        let mut window = vec![T::default(); span];
        RowCopy::contiguous(self.params.span)
            .copy_in(ctx.input, self.storage_offset, &mut window, 0)?;
        Ok(window)
    }

    fn build_index(&self, ctx: &CoreContext<'_>, elems: usize) -> Vec<T::Index> {
        let mut idx = vec![T::Index::default(); elems];
        let lanes = T::Index::lanes(ctx.hw.vector_bytes);
        build_index(&self.tile(), lanes, &mut idx);
        idx
    }

    /// Source offset of iteration `g` inside the loaded window
    fn locate(&self, g: u64) -> Result<usize> {
        usize::try_from(self.params.cut.src_offset(g))
            .map_err(|_| LayoutError::Overflow(format!("gather offset of iteration {g}")))
    }

    fn gather(&self, window: &[T], idx: &[T::Index], g: u64, slot: &mut [T]) -> Result<()> {
        let (_, elems) = self.params.cut.transfer(g);
        let n = elems as usize;
        T::gather(window, &idx[..n], self.locate(g)?, &mut slot[..n])
    }

    fn copy_out(&self, ctx: &CoreContext<'_>, g: u64, slot: &[T]) -> Result<u64> {
        let cut = &self.params.cut;
        let (_, elems) = cut.transfer(g);
        RowCopy::contiguous(elems).copy_out(slot, 0, ctx.output, cut.dst_offset(g))
    }
}

impl<T: Element> CoreKernel for GatherKernel<'_, T> {
    fn name(&self) -> &'static str {
        "gather"
    }

    fn used_cores(&self) -> u64 {
        self.params.split.used
    }

    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        let cut = &self.params.cut;
        let tile_elems = cut.ub_factor;
        if self.tile().elems() != tile_elems || cut.inner_axis_num > GATHER_LEVELS {
            return Err(LayoutError::Abi(format!(
                "gather tile of {} levels does not match {tile_elems} elements",
                cut.inner_axis_num
            )));
        }
        let window_bytes = ctx.hw.align_up(self.params.span * T::WIDTH as u64);
        let index_bytes = tile_elems * std::mem::size_of::<T::Index>() as u64;
        let slot_bytes = ctx.hw.buffer_num.max(1) as u64 * tile_elems * T::WIDTH as u64;
        if window_bytes + index_bytes + slot_bytes > ctx.hw.scratch_bytes as u64 {
            return Err(LayoutError::InnerNull(format!(
                "gather needs {} scratch bytes, core has {}",
                window_bytes + index_bytes + slot_bytes,
                ctx.hw.scratch_bytes
            )));
        }

        let window = self.load_source(ctx)?;
        let idx = self.build_index(ctx, tile_elems as usize);
        let queue: SlotQueue<T> = SlotQueue::new(ctx.hw.buffer_num, tile_elems as usize);
        let mut stats = CoreStats::default();
        pipeline(
            &queue,
            self.compute_core_offset(ctx.core_idx),
            |&g, slot| self.gather(&window, &idx, g, slot),
            |&g, slot| {
                let elems = self.copy_out(ctx, g, slot)?;
                stats.record(elems, T::WIDTH);
                Ok(())
            },
        )?;
        Ok(stats)
    }
}

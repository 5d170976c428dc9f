//! Single tiling-axis search shared by the block-copy strategies
//!
//! Axes are scanned right to left. The first axis whose extent times the
//! product of everything to its right no longer fits one scratch slot becomes
//! the tiling axis `t`: it is split into `outer_factor` chunks of `inner`
//! (the last chunk holds `inner_tail`), axes right of `t` stay whole inside
//! the slot, and axes left of `t` become per-core outer loops.

use crate::device::dma::NdDma;
use crate::error::{LayoutError, Result};
use crate::tiling::block::{field, to_field, TilingParameterBlock, DMA_LEVELS, OUTER_SLOTS};

/// Fraction of the slot an even split must fill to be preferred
const EVEN_SPLIT_FILL: f64 = 0.9;

/// Result of the single-cut search over a normalized descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleCut {
    /// Axis split between the outer loops and the slot
    pub tiling_axis: usize,
    /// Outer loop levels, tiling axis included
    pub outer_axis_num: usize,
    /// Axes handled inside one slot, tiling axis included
    pub inner_axis_num: usize,
    /// Right-aligned outer loop extents; the last slot is the tiling axis
    pub out_loops: [u64; OUTER_SLOTS],
    /// Source stride of one step of each outer loop
    pub out_strides: [u64; OUTER_SLOTS],
    /// Tiles over the whole view
    pub total_iterations: u64,
    /// Chunks of the tiling axis
    pub outer_factor: u64,
    /// Tiling-axis elements per chunk
    pub inner_factor: u64,
    /// Elements of the tiling axis in its last chunk, in `(0, inner_factor]`
    pub inner_tail: u64,
    /// Real elements moved by a main iteration
    pub ub_factor: u64,
    /// Real elements moved by a tail iteration
    pub ub_factor_tail: u64,
    /// Output elements between consecutive tiles of the outer-most loops
    pub tile_elems: u64,
    /// True when some axis had to be split or moved out of the slot
    pub split: bool,
    /// Copy-in descriptor of a full chunk
    pub main: NdDma,
    /// Same as `main` with the tiling level shortened to `inner_tail`
    pub tail: NdDma,
}

/// Search a single cut
///
/// `capacity` is the slot size in elements and `max_levels` the number of
/// descriptor levels available inside a slot. With `align_block = Some(b)`
/// the last axis is padded to a multiple of `b` elements in scratch, and the
/// scratch-side strides reflect that padding.
///
/// # Errors
///
/// Returns [`LayoutError::NoFeasibleTiling`] when not even one row fits.
pub fn plan_single_cut(
    extents: &[u64],
    strides: &[u64],
    capacity: u64,
    max_levels: usize,
    align_block: Option<u64>,
) -> Result<SingleCut> {
    let rank = extents.len();
    if rank == 0 || rank != strides.len() || rank > OUTER_SLOTS {
        return Err(LayoutError::InvalidShape(format!("single cut over rank {rank}")));
    }
    let max_levels = max_levels.clamp(1, DMA_LEVELS);
    let block = align_block.unwrap_or(1).max(1);
    let cap_extent = |axis: usize| {
        if axis + 1 == rank {
            extents[axis].div_ceil(block) * block
        } else {
            extents[axis]
        }
    };

    let mut pre_cap = 1u64;
    let mut found = None;
    for axis in (0..rank).rev() {
        if cap_extent(axis).saturating_mul(pre_cap) > capacity {
            found = Some(axis);
            break;
        }
        pre_cap *= cap_extent(axis);
    }

    let (tiling_axis, inner, split) = match found {
        Some(t) if rank - t <= max_levels => {
            let inner = cut_axis(extents[t], pre_cap, capacity, t + 1 == rank, block)?;
            (t, inner, true)
        }
        Some(_) => {
            let t = rank - max_levels;
            (t, extents[t], true)
        }
        None if rank > max_levels => {
            let t = rank - max_levels;
            (t, extents[t], true)
        }
        None => (0, extents[0], false),
    };

    Ok(assemble(extents, strides, tiling_axis, inner, split, align_block))
}

/// Chunk length for the tiling axis
fn cut_axis(extent: u64, pre_cap: u64, capacity: u64, last: bool, block: u64) -> Result<u64> {
    if last && block > 1 {
        let inner = capacity / block * block;
        if inner == 0 {
            return Err(LayoutError::NoFeasibleTiling(format!(
                "slot of {capacity} elements below one {block}-element row"
            )));
        }
        return Ok(inner);
    }
    let max_inner = capacity / pre_cap;
    if max_inner == 0 {
        return Err(LayoutError::NoFeasibleTiling(format!(
            "slot of {capacity} elements below one {pre_cap}-element row"
        )));
    }
    let min_inner = ((capacity as f64 * EVEN_SPLIT_FILL) / pre_cap as f64).ceil() as u64;
    let even = (min_inner.max(1)..=max_inner)
        .rev()
        .find(|&inner| extent % inner == 0);
    Ok(even.unwrap_or(max_inner))
}

fn assemble(
    extents: &[u64],
    strides: &[u64],
    t: usize,
    inner: u64,
    split: bool,
    align_block: Option<u64>,
) -> SingleCut {
    let rank = extents.len();
    let outer_factor = extents[t].div_ceil(inner);
    let inner_tail = extents[t] - inner * (outer_factor - 1);
    let pre: u64 = extents[t + 1..].iter().product();

    let mut out_loops = [1u64; OUTER_SLOTS];
    let mut out_strides = [0u64; OUTER_SLOTS];
    let base = OUTER_SLOTS - (t + 1);
    for axis in 0..t {
        out_loops[base + axis] = extents[axis];
        out_strides[base + axis] = strides[axis];
    }
    out_loops[OUTER_SLOTS - 1] = outer_factor;
    out_strides[OUTER_SLOTS - 1] = inner * strides[t];

    let inner_axis_num = rank - t;
    let mut main = NdDma::default();
    let lvl = DMA_LEVELS - inner_axis_num;
    for k in 0..inner_axis_num {
        main.loops[lvl + k] = if k == 0 { inner } else { extents[t + k] };
        main.src_strides[lvl + k] = strides[t + k];
    }
    let mut dst = 1u64;
    for k in (0..inner_axis_num).rev() {
        main.dst_strides[lvl + k] = dst;
        let level = main.loops[lvl + k];
        dst *= match align_block {
            Some(b) if k + 1 == inner_axis_num => level.div_ceil(b) * b,
            _ => level,
        };
    }
    let tail = main.with_loop(lvl, inner_tail);

    SingleCut {
        tiling_axis: t,
        outer_axis_num: t + 1,
        inner_axis_num,
        out_loops,
        out_strides,
        total_iterations: out_loops.iter().product(),
        outer_factor,
        inner_factor: inner,
        inner_tail,
        ub_factor: inner * pre,
        ub_factor_tail: inner_tail * pre,
        tile_elems: extents[t] * pre,
        split,
        main,
        tail,
    }
}

impl SingleCut {
    /// Source offset of iteration `g`, relative to the storage offset
    pub fn src_offset(&self, g: u64) -> u64 {
        let mut rem = g;
        let mut offset = 0;
        for (&l, &s) in self.out_loops.iter().zip(&self.out_strides).rev() {
            offset += (rem % l) * s;
            rem /= l;
        }
        offset
    }

    /// Output offset of iteration `g` in the row-major result
    pub fn dst_offset(&self, g: u64) -> u64 {
        (g / self.outer_factor) * self.tile_elems + (g % self.outer_factor) * self.ub_factor
    }

    /// True when `g` is the last chunk of the tiling axis
    pub fn is_tail(&self, g: u64) -> bool {
        g % self.outer_factor == self.outer_factor - 1
    }

    /// Descriptor and element count for iteration `g`
    pub fn transfer(&self, g: u64) -> (&NdDma, u64) {
        if self.is_tail(g) {
            (&self.tail, self.ub_factor_tail)
        } else {
            (&self.main, self.ub_factor)
        }
    }

    /// Write the cut into the tiling fields of `block`
    pub fn encode(&self, block: &mut TilingParameterBlock) -> Result<()> {
        block.tiling_axis_idx = to_field(self.tiling_axis as u64, "tiling_axis_idx")?;
        block.outer_axis_num = to_field(self.outer_axis_num as u64, "outer_axis_num")?;
        block.inner_axis_num = to_field(self.inner_axis_num as u64, "inner_axis_num")?;
        block.total_iterations = to_field(self.total_iterations, "total_iterations")?;
        block.outer_axis_factor = to_field(self.outer_factor, "outer_axis_factor")?;
        block.inner_axis_factor = to_field(self.inner_factor, "inner_axis_factor")?;
        block.inner_axis_factor_tail = to_field(self.inner_tail, "inner_axis_factor_tail")?;
        block.ub_factor = to_field(self.ub_factor, "ub_factor")?;
        block.ub_factor_tail = to_field(self.ub_factor_tail, "ub_factor_tail")?;
        block.tile_elems = to_field(self.tile_elems, "tile_elems")?;
        for slot in 0..OUTER_SLOTS {
            block.out_loop_arr[slot] = to_field(self.out_loops[slot], "out_loop_arr")?;
            block.out_stride_arr[slot] = to_field(self.out_strides[slot], "out_stride_arr")?;
        }
        for lvl in 0..DMA_LEVELS {
            block.dma_loop[lvl] = to_field(self.main.loops[lvl], "dma_loop")?;
            block.dma_tail_loop[lvl] = to_field(self.tail.loops[lvl], "dma_tail_loop")?;
            block.dma_src_stride[lvl] = to_field(self.main.src_strides[lvl], "dma_src_stride")?;
            block.dma_dst_stride[lvl] = to_field(self.main.dst_strides[lvl], "dma_dst_stride")?;
        }
        Ok(())
    }

    /// Read a cut back from `block`
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Abi`] for negative fields or an inconsistent
    /// axis split.
    pub fn decode(block: &TilingParameterBlock) -> Result<Self> {
        let mut main = NdDma::default();
        let mut tail = NdDma::default();
        for lvl in 0..DMA_LEVELS {
            main.loops[lvl] = field(block.dma_loop[lvl], "dma_loop")?;
            tail.loops[lvl] = field(block.dma_tail_loop[lvl], "dma_tail_loop")?;
            main.src_strides[lvl] = field(block.dma_src_stride[lvl], "dma_src_stride")?;
            main.dst_strides[lvl] = field(block.dma_dst_stride[lvl], "dma_dst_stride")?;
        }
        tail.src_strides = main.src_strides;
        tail.dst_strides = main.dst_strides;

        let mut out_loops = [1u64; OUTER_SLOTS];
        let mut out_strides = [0u64; OUTER_SLOTS];
        for slot in 0..OUTER_SLOTS {
            out_loops[slot] = field(block.out_loop_arr[slot], "out_loop_arr")?;
            out_strides[slot] = field(block.out_stride_arr[slot], "out_stride_arr")?;
        }

        let cut = Self {
            tiling_axis: field(block.tiling_axis_idx, "tiling_axis_idx")? as usize,
            outer_axis_num: field(block.outer_axis_num, "outer_axis_num")? as usize,
            inner_axis_num: field(block.inner_axis_num, "inner_axis_num")? as usize,
            out_loops,
            out_strides,
            total_iterations: field(block.total_iterations, "total_iterations")?,
            outer_factor: field(block.outer_axis_factor, "outer_axis_factor")?,
            inner_factor: field(block.inner_axis_factor, "inner_axis_factor")?,
            inner_tail: field(block.inner_axis_factor_tail, "inner_axis_factor_tail")?,
            ub_factor: field(block.ub_factor, "ub_factor")?,
            ub_factor_tail: field(block.ub_factor_tail, "ub_factor_tail")?,
            tile_elems: field(block.tile_elems, "tile_elems")?,
            split: true,
            main,
            tail,
        };
        if cut.outer_factor == 0
            || out_loops.contains(&0)
            || cut.inner_axis_num == 0
            || cut.inner_axis_num > DMA_LEVELS
            || cut.outer_axis_num == 0
            || cut.outer_axis_num > OUTER_SLOTS
            || cut.inner_tail == 0
            || cut.inner_tail > cut.inner_factor
            || cut.total_iterations != out_loops.iter().product::<u64>()
        {
            return Err(LayoutError::Abi(format!("inconsistent single cut: {cut:?}")));
        }
        Ok(cut)
    }
}

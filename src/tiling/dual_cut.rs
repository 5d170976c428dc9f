//! Two-axis tiling for transposing access patterns
//!
//! When the smallest source stride sits on an axis the single cut leaves
//! outside scratch, every iteration of a single cut would move one short,
//! strided run. The seeker instead looks for a square-ish tile: it runs one
//! cutter over the axes in output order and one over the axes in input
//! order (largest source stride first), each bounded by the square root of
//! the remaining slot, and cuts the axis each of them stops at. Both inner
//! chunks then live in one scratch tile, so both the read and the write of a
//! tile are long runs.
//!
//! The result drives per-core loops over the `gm` axes (whole axes left out
//! of scratch plus the outer halves of the cut axes). The last one or two
//! `gm` entries are the cut axes; an iteration landing on the last chunk of
//! a cut axis substitutes that axis's tail extent into the descriptor.

use tracing::debug;

use crate::device::dma::NdDma;
use crate::error::{LayoutError, Result};
use crate::hardware::HardwareSpec;
use crate::shape::row_major_strides;
use crate::tiling::block::{field, to_field, TilingParameterBlock, DMA_LEVELS, OUTER_SLOTS};
use crate::tiling::split::BlockSplit;

/// Seeker refinement rounds
const SEEK_ROUNDS: usize = OUTER_SLOTS + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisInfo {
    extent: u64,
    stride: u64,
    axis: usize,
}

impl AxisInfo {
    fn code(&self) -> u32 {
        1 << self.axis
    }
}

#[derive(Debug, Clone, Copy)]
struct Cut {
    axis: AxisInfo,
    inner: u64,
}

/// Greedy right-to-left cutter over one axis ordering
#[derive(Debug)]
struct AxisCutter {
    axes: Vec<AxisInfo>,
    final_axis: usize,
    ub_set: u32,
    cut: Option<Cut>,
}

impl AxisCutter {
    fn new(axes: &[AxisInfo], final_axis: usize, aligned: u64) -> Self {
        let axes = axes
            .iter()
            .map(|a| {
                if a.axis == final_axis {
                    AxisInfo {
                        extent: a.extent.div_ceil(aligned) * aligned,
                        ..*a
                    }
                } else {
                    *a
                }
            })
            .collect();
        Self {
            axes,
            final_axis,
            ub_set: 0,
            cut: None,
        }
    }

    /// Take whole axes from the right while the product stays within `bound`
    fn find_cut(&mut self, bound: u64) {
        let mut prod = 1u64;
        self.ub_set = 0;
        self.cut = None;
        for a in self.axes.iter().rev() {
            if prod.saturating_mul(a.extent) > bound {
                self.cut = Some(Cut {
                    axis: *a,
                    inner: bound / prod,
                });
                return;
            }
            prod *= a.extent;
            self.ub_set |= a.code();
        }
    }

    fn cut_set(&self) -> u32 {
        self.cut.map_or(0, |c| c.axis.code())
    }

    fn cut_final(&self) -> bool {
        self.cut.is_some_and(|c| c.axis.axis == self.final_axis)
    }

    fn remove(&mut self, set: u32) {
        self.axes.retain(|a| a.code() & set == 0);
    }
}

/// Transfer-size combination of one dual-cut iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TailCase {
    MainMain,
    /// First cut axis on its last chunk
    TailMain,
    /// Second cut axis on its last chunk
    MainTail,
    TailTail,
}

impl TailCase {
    fn from_flags(tail01: bool, tail02: bool) -> Self {
        match (tail01, tail02) {
            (true, true) => Self::TailTail,
            (true, false) => Self::TailMain,
            (false, true) => Self::MainTail,
            (false, false) => Self::MainMain,
        }
    }
}

/// Where one iteration reads, writes, and which tails apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualCutStep {
    /// Element offset of the tile in the source, before the storage offset
    pub src_offset: u64,
    /// Element offset of the tile in the row-major output
    pub dst_offset: u64,
    pub case: TailCase,
}

/// Dual-cut tiling decisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualCutPlan {
    /// Element width in bytes
    pub width: usize,
    /// Per-core loop axes, least significant first; cut outers last
    pub outer_axis_num: usize,
    /// Trip count of each loop axis
    pub gm_loops: [u64; OUTER_SLOTS],
    /// Source step per loop trip, in elements
    pub gm_in_strides: [u64; OUTER_SLOTS],
    /// Output step per loop trip, in elements
    pub gm_out_strides: [u64; OUTER_SLOTS],
    /// Scratch-resident axes, right-aligned in output axis order
    pub inner_axis_num: usize,
    /// Main tile descriptor extents
    pub ub_loops: [u64; DMA_LEVELS],
    /// Source stride of each descriptor level
    pub ub_in_strides: [u64; DMA_LEVELS],
    /// Output stride of each descriptor level
    pub ub_out_strides: [u64; DMA_LEVELS],
    /// Scratch row length: the last level rounded up to the granule
    pub padded_row: u64,
    /// One or two
    pub cut_axis_num: usize,
    /// Descriptor level of each cut axis
    pub cut_slot: [usize; 2],
    /// Extent of each cut axis's last chunk
    pub cut_tail: [u64; 2],
    /// Tiles per core
    pub split: BlockSplit,
}

/// Run the dual-cut seeker over a normalized descriptor
///
/// Returns `None` when the seeker finds no two-axis tile; the caller then
/// keeps the single cut. Scratch rows are padded to the transfer
/// granularity of `hw`. A returned plan still has to pass
/// [`DualCutPlan::validate`].
pub fn seek_dual_cut(
    extents: &[u64],
    strides: &[u64],
    width: usize,
    capacity: u64,
    hw: &HardwareSpec,
) -> Option<DualCutPlan> {
    let rank = extents.len();
    if rank < 2 || rank > OUTER_SLOTS || width == 0 {
        return None;
    }
    let aligned = hw.block_elems(width);
    let final_axis = rank - 1;
    if extents[final_axis] <= aligned {
        debug!(
            last = extents[final_axis],
            aligned,
            "last axis below one granule, no dual cut"
        );
        return None;
    }

    let output: Vec<AxisInfo> = (0..rank)
        .map(|axis| AxisInfo {
            extent: extents[axis],
            stride: strides[axis],
            axis,
        })
        .collect();
    let mut input = output.clone();
    input.sort_by(|a, b| b.stride.cmp(&a.stride).then(b.extent.cmp(&a.extent)));

    let padded_final = extents[final_axis].div_ceil(aligned) * aligned;
    let set_prod = |set: u32| -> u64 {
        output
            .iter()
            .filter(|a| a.code() & set != 0)
            .fold(1u64, |acc, a| acc.saturating_mul(a.extent))
    };
    let remain = |set: u32| -> u64 {
        let final_code = 1u32 << final_axis;
        if set & final_code != 0 {
            let rows = set_prod(set ^ final_code).saturating_mul(padded_final);
            capacity / rows.max(1)
        } else {
            capacity / set_prod(set).max(1)
        }
    };

    let mut out_cutter = AxisCutter::new(&output, final_axis, aligned);
    let mut in_cutter = AxisCutter::new(&input, final_axis, aligned);
    let mut ub_set = 0u32;
    let mut join = 0u32;
    for _ in 0..SEEK_ROUNDS {
        let bound = isqrt(remain(ub_set));
        if bound == 0 {
            break;
        }
        out_cutter.find_cut(bound);
        in_cutter.find_cut(bound);
        join = out_cutter.ub_set | in_cutter.ub_set;
        let common_ub = (out_cutter.ub_set & in_cutter.ub_set)
            | (out_cutter.cut_set() & in_cutter.ub_set)
            | (in_cutter.cut_set() & out_cutter.ub_set);
        let merged = if common_ub != 0 {
            common_ub
        } else {
            let common_cut = out_cutter.cut_set() & in_cutter.cut_set();
            if common_cut == 0 || set_prod(join | ub_set | common_cut) >= capacity {
                break;
            }
            common_cut
        };
        ub_set |= merged;
        out_cutter.remove(merged);
        in_cutter.remove(merged);
    }
    ub_set |= join;
    let remain_elems = remain(ub_set);

    let (out_cut, in_cut) = (out_cutter.cut?, in_cutter.cut?);
    let clamp = |inner: u64, axis: usize| inner.min(extents[axis]);
    let align = |inner: u64| {
        if inner < aligned {
            aligned
        } else {
            inner / aligned * aligned
        }
    };

    // (axis, inner) per cut, output cutter first
    let cuts: Vec<(usize, u64)> = if out_cut.axis.axis != in_cut.axis.axis {
        let (mut o_inner, mut i_inner) = (out_cut.inner, in_cut.inner);
        if in_cutter.cut_final() {
            i_inner = align(i_inner);
            o_inner = remain_elems / i_inner;
        } else if out_cutter.cut_final() {
            o_inner = align(o_inner);
            i_inner = remain_elems / o_inner;
        }
        vec![
            (out_cut.axis.axis, clamp(o_inner, out_cut.axis.axis)),
            (in_cut.axis.axis, clamp(i_inner, in_cut.axis.axis)),
        ]
    } else {
        let inner = if in_cutter.cut_final() {
            remain_elems / aligned * aligned
        } else {
            remain_elems
        };
        vec![(in_cut.axis.axis, clamp(inner, in_cut.axis.axis))]
    };
    if cuts.iter().any(|&(_, inner)| inner == 0) {
        debug!(?cuts, "dual cut produced an empty chunk");
        return None;
    }

    let cut_codes = cuts.iter().fold(0u32, |acc, &(axis, _)| acc | (1 << axis));
    let mut ub_axes: Vec<AxisInfo> = output
        .iter()
        .copied()
        .filter(|a| a.code() & ub_set != 0)
        .collect();
    let mut gm_axes: Vec<AxisInfo> = output
        .iter()
        .copied()
        .filter(|a| a.code() & (ub_set | cut_codes) == 0)
        .collect();
    let mut inner_axes: Vec<AxisInfo> = cuts
        .iter()
        .map(|&(axis, inner)| AxisInfo {
            extent: inner,
            stride: strides[axis],
            axis,
        })
        .collect();

    // too many scratch axes: the largest-stride ones loop per core instead
    let overflow = (ub_axes.len() + inner_axes.len()).saturating_sub(DMA_LEVELS);
    if overflow > 0 {
        ub_axes.sort_by(|a, b| a.stride.cmp(&b.stride).then(b.extent.cmp(&a.extent)));
        let mut spilled = 0;
        while spilled < overflow {
            let Some(a) = ub_axes.pop() else { break };
            if a.axis == final_axis {
                inner_axes.push(a);
            } else {
                gm_axes.push(a);
                spilled += 1;
            }
        }
    }
    ub_axes.extend(inner_axes);
    gm_axes.sort_by_key(|a| a.axis);
    ub_axes.sort_by_key(|a| a.axis);

    let out_strides = row_major_strides(extents);
    let ub_inner = |axis: usize| {
        let found = ub_axes.iter().find(|a| a.axis == axis);
        found.map_or(1, |a| a.extent)
    };
    let mut gm_loops = [1u64; OUTER_SLOTS];
    let mut gm_in_strides = [0u64; OUTER_SLOTS];
    let mut gm_out_strides = [0u64; OUTER_SLOTS];
    let gm_count = gm_axes.len() + cuts.len();
    if gm_count > OUTER_SLOTS || ub_axes.len() > DMA_LEVELS {
        return None;
    }
    for (slot, a) in gm_axes.iter().enumerate() {
        gm_loops[slot] = a.extent;
        gm_in_strides[slot] = a.stride;
        gm_out_strides[slot] = out_strides[a.axis];
    }
    let mut cut_slot = [0usize; 2];
    let mut cut_tail = [0u64; 2];
    let base = DMA_LEVELS - ub_axes.len();
    for (c, &(axis, inner)) in cuts.iter().enumerate() {
        let slot = gm_axes.len() + c;
        let outer = extents[axis].div_ceil(inner);
        gm_loops[slot] = outer;
        gm_in_strides[slot] = inner * strides[axis];
        gm_out_strides[slot] = out_strides[axis] * ub_inner(axis);
        cut_slot[c] = base + ub_axes.iter().position(|a| a.axis == axis)?;
        cut_tail[c] = extents[axis] - (outer - 1) * inner;
    }

    let mut ub_loops = [1u64; DMA_LEVELS];
    let mut ub_in_strides = [0u64; DMA_LEVELS];
    let mut ub_out_strides = [0u64; DMA_LEVELS];
    for (k, a) in ub_axes.iter().enumerate() {
        ub_loops[base + k] = a.extent;
        ub_in_strides[base + k] = a.stride;
        ub_out_strides[base + k] = out_strides[a.axis];
    }
    let padded_row = ub_loops[DMA_LEVELS - 1].div_ceil(aligned) * aligned;

    let total: u64 = gm_loops.iter().product();
    let plan = DualCutPlan {
        width,
        outer_axis_num: gm_count,
        gm_loops,
        gm_in_strides,
        gm_out_strides,
        inner_axis_num: ub_axes.len(),
        ub_loops,
        ub_in_strides,
        ub_out_strides,
        padded_row,
        cut_axis_num: cuts.len(),
        cut_slot,
        cut_tail,
        split: BlockSplit::new(total, hw.cores.max(1) as u64),
    };
    debug!(
        cuts = plan.cut_axis_num,
        ub = ?plan.ub_loops,
        padded_row,
        gm = ?&plan.gm_loops[..plan.outer_axis_num],
        "dual cut found"
    );
    Some(plan)
}

fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r.saturating_mul(r) > n {
        r -= 1;
    }
    while (r + 1).saturating_mul(r + 1) <= n {
        r += 1;
    }
    r
}

impl DualCutPlan {
    /// Scratch-side strides of the padded tile
    pub fn ub_dst_strides(&self) -> [u64; DMA_LEVELS] {
        let mut dst = [0u64; DMA_LEVELS];
        let mut acc = 1;
        for lvl in (DMA_LEVELS - self.inner_axis_num..DMA_LEVELS).rev() {
            dst[lvl] = acc;
            acc *= if lvl == DMA_LEVELS - 1 {
                self.padded_row
            } else {
                self.ub_loops[lvl]
            };
        }
        dst
    }

    /// Scratch elements one tile occupies, padding included
    pub fn tile_capacity(&self) -> u64 {
        let rows: u64 = self.ub_loops[..DMA_LEVELS - 1].iter().product();
        rows * self.padded_row
    }

    pub fn total_iterations(&self) -> u64 {
        self.gm_loops.iter().product()
    }

    /// Decompose iteration `g` over the per-core loop axes
    pub fn locate(&self, g: u64) -> DualCutStep {
        let first_cut = self.outer_axis_num - self.cut_axis_num;
        let mut rem = g;
        let mut src = 0;
        let mut dst = 0;
        let mut tails = [false; 2];
        for slot in 0..self.outer_axis_num {
            let loops = self.gm_loops[slot];
            let idx = rem % loops;
            rem /= loops;
            src += idx * self.gm_in_strides[slot];
            dst += idx * self.gm_out_strides[slot];
            if slot >= first_cut {
                tails[slot - first_cut] = idx == loops - 1;
            }
        }
        DualCutStep {
            src_offset: src,
            dst_offset: dst,
            case: TailCase::from_flags(tails[0], tails[1]),
        }
    }

    /// Copy-in descriptor with the tail extents of `case` substituted
    pub fn descriptor(&self, case: TailCase) -> NdDma {
        let mut desc = NdDma {
            loops: self.ub_loops,
            src_strides: self.ub_in_strides,
            dst_strides: self.ub_dst_strides(),
        };
        let (tail01, tail02) = match case {
            TailCase::MainMain => (false, false),
            TailCase::TailMain => (true, false),
            TailCase::MainTail => (false, true),
            TailCase::TailTail => (true, true),
        };
        if tail01 {
            desc.loops[self.cut_slot[0]] = self.cut_tail[0];
        }
        if tail02 && self.cut_axis_num > 1 {
            desc.loops[self.cut_slot[1]] = self.cut_tail[1];
        }
        desc
    }

    /// Structural checks before a plan is trusted
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidTiling`] if any axis is covered zero or
    /// several times, a cut tail is out of range, or the tile does not fit.
    pub fn validate(&self, extents: &[u64], strides: &[u64], capacity: u64) -> Result<()> {
        let invalid = |why: String| Err(LayoutError::InvalidTiling(format!("dual cut: {why}")));
        let rank = extents.len();
        if !(1..=2).contains(&self.cut_axis_num)
            || self.inner_axis_num == 0
            || self.inner_axis_num > DMA_LEVELS
            || self.outer_axis_num < self.cut_axis_num
            || self.outer_axis_num > OUTER_SLOTS
        {
            return invalid(format!(
                "{} cuts, {} scratch axes, {} loop axes",
                self.cut_axis_num, self.inner_axis_num, self.outer_axis_num
            ));
        }
        if self.tile_capacity() > capacity {
            return invalid(format!("tile {} exceeds slot {capacity}", self.tile_capacity()));
        }
        if self.ub_out_strides[DMA_LEVELS - 1] != 1 {
            return invalid("last axis not in scratch".into());
        }
        if self.padded_row < self.ub_loops[DMA_LEVELS - 1] {
            return invalid(format!("scratch row of {} is too short", self.padded_row));
        }

        // every axis appears once in the scratch tile or the loops, cut
        // axes once in each, and the pieces multiply back to the extent
        let out_strides = row_major_strides(extents);
        let first_cut = self.outer_axis_num - self.cut_axis_num;
        let mut covered = vec![0u64; rank];
        let mut seen = vec![0u8; rank];
        let find_axis = |out_stride: u64, in_stride: u64, seen: &[u8]| {
            (0..rank).find(|&a| {
                seen[a] == 0 && out_strides[a] == out_stride && strides[a] == in_stride
            })
        };
        for lvl in DMA_LEVELS - self.inner_axis_num..DMA_LEVELS {
            let (out_stride, in_stride) = (self.ub_out_strides[lvl], self.ub_in_strides[lvl]);
            let Some(axis) = find_axis(out_stride, in_stride, &seen) else {
                return invalid(format!("scratch level {lvl} matches no axis"));
            };
            seen[axis] += 1;
            covered[axis] = self.ub_loops[lvl];
        }
        for slot in 0..first_cut {
            let (out_stride, in_stride) = (self.gm_out_strides[slot], self.gm_in_strides[slot]);
            let Some(axis) = find_axis(out_stride, in_stride, &seen) else {
                return invalid(format!("loop slot {slot} matches no axis"));
            };
            seen[axis] += 1;
            covered[axis] = self.gm_loops[slot];
        }
        for c in 0..self.cut_axis_num {
            let lvl = self.cut_slot[c];
            if lvl < DMA_LEVELS - self.inner_axis_num || lvl >= DMA_LEVELS {
                return invalid(format!("cut slot {lvl} outside scratch levels"));
            }
            let inner = self.ub_loops[lvl];
            let Some(axis) = (0..rank).find(|&a| {
                out_strides[a] == self.ub_out_strides[lvl] && strides[a] == self.ub_in_strides[lvl]
            }) else {
                return invalid(format!("cut slot {lvl} matches no axis"));
            };
            let outer = self.gm_loops[first_cut + c];
            let tail = self.cut_tail[c];
            let slot = first_cut + c;
            if tail == 0
                || tail > inner
                || (outer - 1) * inner + tail != extents[axis]
                || self.gm_in_strides[slot] != inner * strides[axis]
                || self.gm_out_strides[slot] != inner * out_strides[axis]
            {
                return invalid(format!("axis {axis}: {outer} x {inner} with tail {tail}"));
            }
            seen[axis] += 1;
            covered[axis] = extents[axis];
        }
        for axis in 0..rank {
            let expected = if (0..self.cut_axis_num).any(|c| {
                out_strides[axis] == self.ub_out_strides[self.cut_slot[c]]
                    && strides[axis] == self.ub_in_strides[self.cut_slot[c]]
            }) {
                2
            } else {
                1
            };
            if seen[axis] != expected || covered[axis] != extents[axis] {
                return invalid(format!("axis {axis} covered {} times", seen[axis]));
            }
        }
        Ok(())
    }

    /// Write the plan into the dual-cut fields of `block`
    pub fn encode(&self, block: &mut TilingParameterBlock) -> Result<()> {
        block.outer_axis_num = to_field(self.outer_axis_num as u64, "outer_axis_num")?;
        block.inner_axis_num = to_field(self.inner_axis_num as u64, "inner_axis_num")?;
        block.total_iterations = to_field(self.total_iterations(), "total_iterations")?;
        block.used_core_num = to_field(self.split.used, "used_core_num")?;
        block.loops_per_core = to_field(self.split.factor, "loops_per_core")?;
        block.loops_tail_core = to_field(self.split.tail, "loops_tail_core")?;
        for slot in 0..OUTER_SLOTS {
            block.out_loop_arr[slot] = to_field(self.gm_loops[slot], "out_loop_arr")?;
            block.out_stride_arr[slot] = to_field(self.gm_in_strides[slot], "out_stride_arr")?;
            block.gm_out_stride[slot] = to_field(self.gm_out_strides[slot], "gm_out_stride")?;
        }
        for lvl in 0..DMA_LEVELS {
            block.dma_loop[lvl] = to_field(self.ub_loops[lvl], "dma_loop")?;
            block.dma_src_stride[lvl] = to_field(self.ub_in_strides[lvl], "dma_src_stride")?;
            block.dma_dst_stride[lvl] = to_field(self.ub_out_strides[lvl], "dma_dst_stride")?;
        }
        block.cut_axis_num = to_field(self.cut_axis_num as u64, "cut_axis_num")?;
        for c in 0..2 {
            block.cut_axis_slot[c] = to_field(self.cut_slot[c] as u64, "cut_axis_slot")?;
            block.cut_axis_tail[c] = to_field(self.cut_tail[c], "cut_axis_tail")?;
        }
        block.padded_row = to_field(self.padded_row, "padded_row")?;
        block.ub_size = to_field(self.tile_capacity(), "ub_size")?;
        Ok(())
    }

    /// Read a plan back from `block`
    pub fn decode(block: &TilingParameterBlock) -> Result<Self> {
        let width = field(block.dtype_size, "dtype_size")? as usize;
        let mut gm_loops = [1u64; OUTER_SLOTS];
        let mut gm_in_strides = [0u64; OUTER_SLOTS];
        let mut gm_out_strides = [0u64; OUTER_SLOTS];
        for slot in 0..OUTER_SLOTS {
            gm_loops[slot] = field(block.out_loop_arr[slot], "out_loop_arr")?;
            gm_in_strides[slot] = field(block.out_stride_arr[slot], "out_stride_arr")?;
            gm_out_strides[slot] = field(block.gm_out_stride[slot], "gm_out_stride")?;
        }
        let mut ub_loops = [1u64; DMA_LEVELS];
        let mut ub_in_strides = [0u64; DMA_LEVELS];
        let mut ub_out_strides = [0u64; DMA_LEVELS];
        for lvl in 0..DMA_LEVELS {
            ub_loops[lvl] = field(block.dma_loop[lvl], "dma_loop")?;
            ub_in_strides[lvl] = field(block.dma_src_stride[lvl], "dma_src_stride")?;
            ub_out_strides[lvl] = field(block.dma_dst_stride[lvl], "dma_dst_stride")?;
        }
        let mut cut_slot = [0usize; 2];
        let mut cut_tail = [0u64; 2];
        for c in 0..2 {
            cut_slot[c] = field(block.cut_axis_slot[c], "cut_axis_slot")? as usize;
            cut_tail[c] = field(block.cut_axis_tail[c], "cut_axis_tail")?;
        }
        let total: u64 = gm_loops.iter().product();
        let split = BlockSplit {
            total,
            factor: field(block.loops_per_core, "loops_per_core")?,
            used: field(block.used_core_num, "used_core_num")?,
            tail: field(block.loops_tail_core, "loops_tail_core")?,
        };
        let plan = Self {
            width,
            outer_axis_num: field(block.outer_axis_num, "outer_axis_num")? as usize,
            gm_loops,
            gm_in_strides,
            gm_out_strides,
            inner_axis_num: field(block.inner_axis_num, "inner_axis_num")? as usize,
            ub_loops,
            ub_in_strides,
            ub_out_strides,
            padded_row: field(block.padded_row, "padded_row")?,
            cut_axis_num: field(block.cut_axis_num, "cut_axis_num")? as usize,
            cut_slot,
            cut_tail,
            split,
        };
        if gm_loops.contains(&0)
            || !(1..=2).contains(&plan.cut_axis_num)
            || plan.outer_axis_num > OUTER_SLOTS
            || plan.outer_axis_num < plan.cut_axis_num
            || plan.inner_axis_num == 0
            || plan.inner_axis_num > DMA_LEVELS
            || plan.padded_row < plan.ub_loops[DMA_LEVELS - 1]
            || plan.cut_slot[..plan.cut_axis_num]
                .iter()
                .any(|&s| s < DMA_LEVELS - plan.inner_axis_num || s >= DMA_LEVELS)
            || split.used.saturating_sub(1) * split.factor + split.tail != total
        {
            return Err(LayoutError::Abi(format!("inconsistent dual cut: {plan:?}")));
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shape (27, 37) u32 with strides (1, 27): both axes cut, gm loops of
    /// 7 and 5 chunks
    fn two_cut_plan(cores: u64) -> DualCutPlan {
        DualCutPlan {
            width: 4,
            outer_axis_num: 2,
            gm_loops: [7, 5, 1, 1, 1, 1, 1, 1, 1, 1],
            gm_in_strides: [4, 216, 0, 0, 0, 0, 0, 0, 0, 0],
            gm_out_strides: [148, 8, 0, 0, 0, 0, 0, 0, 0, 0],
            inner_axis_num: 2,
            ub_loops: [1, 1, 1, 4, 8],
            ub_in_strides: [0, 0, 0, 1, 27],
            ub_out_strides: [0, 0, 0, 37, 1],
            padded_row: 8,
            cut_axis_num: 2,
            cut_slot: [3, 4],
            cut_tail: [3, 5],
            split: BlockSplit::new(35, cores),
        }
    }

    /// Shape (10, 37) u32 with strides (1, 10): only axis 0 is cut, in five
    /// chunks of two rows
    fn one_cut_plan() -> DualCutPlan {
        DualCutPlan {
            width: 4,
            outer_axis_num: 1,
            gm_loops: [5, 1, 1, 1, 1, 1, 1, 1, 1, 1],
            gm_in_strides: [2, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            gm_out_strides: [74, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            inner_axis_num: 2,
            ub_loops: [1, 1, 1, 2, 37],
            ub_in_strides: [0, 0, 0, 1, 10],
            ub_out_strides: [0, 0, 0, 37, 1],
            padded_row: 40,
            cut_axis_num: 1,
            cut_slot: [3, 0],
            cut_tail: [2, 0],
            split: BlockSplit::new(5, 2),
        }
    }

    #[test]
    fn test_hand_built_plan_is_valid() {
        let plan = two_cut_plan(3);
        plan.validate(&[27, 37], &[1, 27], 64).unwrap();
        assert_eq!(plan.padded_row, 8);
        assert_eq!(plan.tile_capacity(), 32);
        assert_eq!(plan.ub_dst_strides(), [0, 0, 0, 8, 1]);
        assert_eq!((plan.split.factor, plan.split.used, plan.split.tail), (12, 3, 11));
    }

    #[test]
    fn test_single_cut_axis_plan() {
        let plan = one_cut_plan();
        plan.validate(&[10, 37], &[1, 10], 80).unwrap();
        assert_eq!(plan.tile_capacity(), 80);
        assert_eq!(plan.ub_dst_strides(), [0, 0, 0, 40, 1]);
        assert_eq!(plan.locate(3).src_offset, 6);
        assert_eq!(plan.locate(3).dst_offset, 222);
        assert_eq!(plan.locate(3).case, TailCase::MainMain);
        assert_eq!(plan.locate(4).case, TailCase::TailMain);
        // the second tail never applies with one cut axis
        assert_eq!(plan.descriptor(TailCase::TailTail).loops[3..], [2, 37]);

        let mut short = one_cut_plan();
        short.padded_row = 36;
        assert!(short.validate(&[10, 37], &[1, 10], 80).is_err());
    }

    #[test]
    fn test_tail_cases_fire_on_schedule() {
        let plan = two_cut_plan(3);
        for g in 0..plan.total_iterations() {
            let expected = match g {
                34 => TailCase::TailTail,
                28..=33 => TailCase::MainTail,
                6 | 13 | 20 | 27 => TailCase::TailMain,
                _ => TailCase::MainMain,
            };
            assert_eq!(plan.locate(g).case, expected, "iteration {g}");
        }
    }

    #[test]
    fn test_descriptor_substitutes_tails() {
        let plan = two_cut_plan(3);
        assert_eq!(plan.descriptor(TailCase::MainMain).loops[3..], [4, 8]);
        assert_eq!(plan.descriptor(TailCase::TailMain).loops[3..], [3, 8]);
        assert_eq!(plan.descriptor(TailCase::MainTail).loops[3..], [4, 5]);
        assert_eq!(plan.descriptor(TailCase::TailTail).loops[3..], [3, 5]);
    }

    #[test]
    fn test_locate_offsets() {
        let plan = two_cut_plan(3);
        let step = plan.locate(7 + 2);
        // chunk 2 of axis 0, chunk 1 of axis 1
        assert_eq!(step.src_offset, 2 * 4 + 216);
        assert_eq!(step.dst_offset, 2 * 148 + 8);
    }

    #[test]
    fn test_validation_rejects_bad_tail() {
        let mut plan = two_cut_plan(3);
        plan.cut_tail[1] = 6;
        assert!(matches!(
            plan.validate(&[27, 37], &[1, 27], 64),
            Err(LayoutError::InvalidTiling(_))
        ));
        let plan = two_cut_plan(3);
        assert!(plan.validate(&[27, 37], &[1, 27], 16).is_err());
    }

    #[test]
    fn test_seeker_on_square_transpose() {
        // (512, 512) f32 read column-major, slot of 31744 elements
        let hw = HardwareSpec::default();
        let plan = seek_dual_cut(&[512, 512], &[1, 512], 4, 31_744, &hw).unwrap();
        plan.validate(&[512, 512], &[1, 512], 31_744).unwrap();
        assert_eq!(plan.cut_axis_num, 2);
        assert_eq!(plan.ub_loops[3..], [180, 176]);
        assert_eq!(plan.tile_capacity(), 31_680);
        assert_eq!(plan.cut_tail, [160, 152]);
    }

    #[test]
    fn test_seeker_pads_rows_to_granularity() {
        // (200, 37) u32 read column-major: only the row axis is cut
        let hw = HardwareSpec::tiny();
        let plan = seek_dual_cut(&[200, 37], &[1, 200], 4, 4096, &hw).unwrap();
        plan.validate(&[200, 37], &[1, 200], 4096).unwrap();
        assert_eq!(plan.cut_axis_num, 1);
        assert_eq!(plan.ub_loops[3..], [102, 37]);
        assert_eq!(plan.padded_row, 40);
        assert_eq!(plan.cut_tail[0], 98);

        let hw = hw.with_granularity(64);
        let wide = seek_dual_cut(&[200, 37], &[1, 200], 4, 4096, &hw).unwrap();
        wide.validate(&[200, 37], &[1, 200], 4096).unwrap();
        assert_eq!(wide.cut_axis_num, 1);
        assert_eq!(wide.ub_loops[3..], [85, 37]);
        assert_eq!(wide.padded_row, 48);
        assert_eq!(wide.tile_capacity(), 4080);
        assert_eq!(wide.cut_tail[0], 30);
    }

    #[test]
    fn test_seeker_skips_narrow_last_axis() {
        let hw = HardwareSpec::tiny();
        assert!(seek_dual_cut(&[1000, 8], &[1, 1000], 4, 1024, &hw).is_none());
        let hw = hw.with_granularity(64);
        assert!(seek_dual_cut(&[1000, 16], &[1, 1000], 4, 1024, &hw).is_none());
    }

    #[test]
    fn test_block_round_trip() {
        let plan = two_cut_plan(3);
        let mut block = TilingParameterBlock {
            dtype_size: 4,
            ..TilingParameterBlock::default()
        };
        plan.encode(&mut block).unwrap();
        assert_eq!(block.padded_row, 8);
        assert_eq!(DualCutPlan::decode(&block).unwrap(), plan);

        block.padded_row = 7;
        assert!(matches!(DualCutPlan::decode(&block), Err(LayoutError::Abi(_))));
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(31_744), 178);
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(16), 4);
    }
}

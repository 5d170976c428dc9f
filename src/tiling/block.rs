//! Flat parameter block shipped from the planner to every core
//!
//! The layout is a strict ABI: field order and widths are fixed, there is no
//! version tag, and every field is an `i64` so the record has no padding. The
//! planner fills one block per invocation; device code only reads it.

use bytemuck::{Pod, Zeroable};

use crate::error::{LayoutError, Result};

/// Slots for outer (per-core loop) bookkeeping
pub const OUTER_SLOTS: usize = 10;
/// Levels of one strided-DMA descriptor
pub const DMA_LEVELS: usize = 5;

/// Serialized tiling decisions
///
/// Per-strategy parameter structs in [`crate::tiling::StrategyParams`] own
/// the meaning of each field; this record only transports them. Arrays are
/// right-aligned: a descriptor with fewer than five levels leaves its
/// leading slots at extent 1 / stride 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TilingParameterBlock {
    /// Encoded [`crate::tiling::StrategyKey`]
    pub key: i64,
    pub used_core_num: i64,
    /// Element width in bytes
    pub dtype_size: i64,
    /// Source elements skipped before the view starts
    pub storage_offset: i64,
    pub workspace_bytes: i64,
    /// Output elements
    pub numel: i64,

    /// Iterations across all cores
    pub total_iterations: i64,
    /// Iterations of every core but the last
    pub loops_per_core: i64,
    pub loops_tail_core: i64,

    /// Axis cut by the single-axis strategies
    pub tiling_axis_idx: i64,
    pub outer_axis_num: i64,
    pub inner_axis_num: i64,
    pub outer_axis_factor: i64,
    pub inner_axis_factor: i64,
    pub inner_axis_factor_tail: i64,
    pub ub_factor: i64,
    pub ub_factor_tail: i64,
    pub tile_elems: i64,
    pub ub_size: i64,
    pub in_ub_size: i64,
    /// 1 when scratch rows are padded to `padded_row`
    pub en_32b_aligned: i64,
    pub padded_row: i64,

    /// Outer loop extents
    pub out_loop_arr: [i64; OUTER_SLOTS],
    /// Source step of each outer loop
    pub out_stride_arr: [i64; OUTER_SLOTS],
    /// Output step of each outer loop
    pub gm_out_stride: [i64; OUTER_SLOTS],

    /// Main-tile descriptor extents
    pub dma_loop: [i64; DMA_LEVELS],
    /// Tail-tile descriptor extents
    pub dma_tail_loop: [i64; DMA_LEVELS],
    pub dma_src_stride: [i64; DMA_LEVELS],
    pub dma_dst_stride: [i64; DMA_LEVELS],

    pub cut_axis_num: i64,
    /// Descriptor level of each dual-cut axis
    pub cut_axis_slot: [i64; 2],
    /// Last-chunk extent of each dual-cut axis
    pub cut_axis_tail: [i64; 2],
}

impl Default for TilingParameterBlock {
    fn default() -> Self {
        Self {
            out_loop_arr: [1; OUTER_SLOTS],
            dma_loop: [1; DMA_LEVELS],
            dma_tail_loop: [1; DMA_LEVELS],
            ..Zeroable::zeroed()
        }
    }
}

impl TilingParameterBlock {
    /// Size of the serialized record in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Raw bytes for transport
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(self).to_vec()
    }

    /// Read a block back from transport bytes
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Abi`] when `bytes` is not exactly one record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(LayoutError::Abi(format!(
                "expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

/// Convert a non-negative block field to `u64`
pub(crate) fn field(value: i64, name: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| LayoutError::Abi(format!("{name} is negative: {value}")))
}

/// Convert a planner quantity to a block field
pub(crate) fn to_field(value: u64, name: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| LayoutError::Overflow(format!("{name} = {value}")))
}

//! Per-strategy parameter sets
//!
//! [`StrategyParams`] is the sum type the device matches on once per launch.
//! Each arm owns only the fields its kernel reads, and knows how to write
//! itself into and read itself back out of a [`TilingParameterBlock`].

use crate::error::{LayoutError, Result};
use crate::tiling::block::{field, to_field, TilingParameterBlock, OUTER_SLOTS};
use crate::tiling::dual_cut::DualCutPlan;
use crate::tiling::key::StrategyKind;
use crate::tiling::single_cut::SingleCut;
use crate::tiling::split::BlockSplit;

/// Block copy, one strided descriptor per iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectParams {
    /// Descriptor tiling shared by every iteration
    pub cut: SingleCut,
    /// Contiguous iteration ranges per core
    pub split: BlockSplit,
}

/// Block copy through padded scratch rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignParams {
    /// Tiling over at most four levels, last axis granule aligned
    pub cut: SingleCut,
    /// Iterations are dealt to cores round-robin
    pub used_cores: u64,
    /// Iterations of the busiest core
    pub loops_per_core: u64,
    /// Rows are not a whole number of granules; copy out row by row
    pub en_32b_aligned: bool,
    /// Scratch row pitch in elements
    pub padded_row: u64,
}

impl AlignParams {
    /// Iterations handled by `core` under round-robin assignment
    pub fn loops_of(&self, core: u64) -> u64 {
        if core >= self.used_cores {
            return 0;
        }
        (self.cut.total_iterations - core).div_ceil(self.used_cores)
    }
}

/// Index-buffer gather over a bulk-loaded source window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherParams {
    /// Output tiling; the innermost three levels shape the index buffer
    pub cut: SingleCut,
    pub split: BlockSplit,
    /// Source elements loaded into scratch once per core
    pub span: u64,
}

/// One lightweight thread per output element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerElementParams {
    /// Merged rank, at most 8
    pub rank: usize,
    /// View extents, padded with 1 past `rank`
    pub extents: [u64; OUTER_SLOTS],
    /// View strides in elements, padded with 0 past `rank`
    pub strides: [u64; OUTER_SLOTS],
    pub numel: u64,
    /// Contiguous element ranges per core
    pub split: BlockSplit,
}

impl PerElementParams {
    pub fn extents(&self) -> &[u64] {
        &self.extents[..self.rank]
    }

    pub fn strides(&self) -> &[u64] {
        &self.strides[..self.rank]
    }
}

/// Replicate the single source element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastParams {
    /// Output elements, all copies of one source element
    pub numel: u64,
    pub split: BlockSplit,
    /// Elements written per chunk
    pub ub_factor: u64,
}

/// Strategy-specific tiling, one arm per kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyParams {
    Empty,
    Direct(DirectParams),
    AlignmentAware(AlignParams),
    DualCut(DualCutPlan),
    Gather(GatherParams),
    PerElement(PerElementParams),
    Broadcast(BroadcastParams),
}

impl StrategyParams {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Empty => StrategyKind::Empty,
            Self::Direct(_) => StrategyKind::Direct,
            Self::AlignmentAware(_) => StrategyKind::AlignmentAware,
            Self::DualCut(_) => StrategyKind::DualCut,
            Self::Gather(_) => StrategyKind::Gather,
            Self::PerElement(_) => StrategyKind::PerElement,
            Self::Broadcast(_) => StrategyKind::Broadcast,
        }
    }

    /// Cores the launch dispatches
    pub fn used_cores(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::Direct(p) => p.split.used,
            Self::AlignmentAware(p) => p.used_cores,
            Self::DualCut(p) => p.split.used,
            Self::Gather(p) => p.split.used,
            Self::PerElement(p) => p.split.used,
            Self::Broadcast(p) => p.split.used,
        }
    }

    /// Write the strategy fields into `block`
    ///
    /// Shared fields (key, width, offset, workspace, numel) are the
    /// planner's responsibility.
    pub fn encode(&self, block: &mut TilingParameterBlock) -> Result<()> {
        block.used_core_num = to_field(self.used_cores(), "used_core_num")?;
        match self {
            Self::Empty => {}
            Self::Direct(p) => {
                p.cut.encode(block)?;
                encode_split(&p.split, block)?;
                block.ub_size = to_field(p.cut.ub_factor, "ub_size")?;
            }
            Self::AlignmentAware(p) => {
                p.cut.encode(block)?;
                block.loops_per_core = to_field(p.loops_per_core, "loops_per_core")?;
                let tail = p.loops_of(p.used_cores.saturating_sub(1));
                block.loops_tail_core = to_field(tail, "loops_tail_core")?;
                block.en_32b_aligned = i64::from(p.en_32b_aligned);
                block.padded_row = to_field(p.padded_row, "padded_row")?;
                block.ub_size = to_field(p.cut.main.dst_extent(), "ub_size")?;
            }
            Self::DualCut(p) => p.encode(block)?,
            Self::Gather(p) => {
                p.cut.encode(block)?;
                encode_split(&p.split, block)?;
                block.in_ub_size = to_field(p.span, "in_ub_size")?;
                block.ub_size = to_field(p.cut.ub_factor, "ub_size")?;
            }
            Self::PerElement(p) => {
                block.outer_axis_num = to_field(p.rank as u64, "outer_axis_num")?;
                for slot in 0..OUTER_SLOTS {
                    block.out_loop_arr[slot] = to_field(p.extents[slot], "out_loop_arr")?;
                    block.out_stride_arr[slot] = to_field(p.strides[slot], "out_stride_arr")?;
                }
                block.total_iterations = to_field(p.numel, "total_iterations")?;
                encode_split(&p.split, block)?;
            }
            Self::Broadcast(p) => {
                block.total_iterations = to_field(p.numel, "total_iterations")?;
                encode_split(&p.split, block)?;
                block.ub_factor = to_field(p.ub_factor, "ub_factor")?;
                block.ub_size = to_field(p.ub_factor, "ub_size")?;
            }
        }
        Ok(())
    }

    /// Read the parameters of `kind` back out of `block`
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Abi`] when fields are negative or inconsistent.
    pub fn decode(kind: StrategyKind, block: &TilingParameterBlock) -> Result<Self> {
        let params = match kind {
            StrategyKind::Empty => Self::Empty,
            StrategyKind::Direct => {
                let cut = SingleCut::decode(block)?;
                let split = decode_split(cut.total_iterations, block)?;
                Self::Direct(DirectParams { cut, split })
            }
            StrategyKind::AlignmentAware => {
                let cut = SingleCut::decode(block)?;
                let used_cores = field(block.used_core_num, "used_core_num")?;
                let loops_per_core = field(block.loops_per_core, "loops_per_core")?;
                if used_cores == 0 || loops_per_core != cut.total_iterations.div_ceil(used_cores) {
                    return Err(LayoutError::Abi(format!(
                        "{} iterations over {used_cores} cores in {loops_per_core} loops",
                        cut.total_iterations
                    )));
                }
                Self::AlignmentAware(AlignParams {
                    cut,
                    used_cores,
                    loops_per_core,
                    en_32b_aligned: block.en_32b_aligned != 0,
                    padded_row: field(block.padded_row, "padded_row")?,
                })
            }
            StrategyKind::DualCut => Self::DualCut(DualCutPlan::decode(block)?),
            StrategyKind::Gather => {
                let cut = SingleCut::decode(block)?;
                let split = decode_split(cut.total_iterations, block)?;
                Self::Gather(GatherParams {
                    cut,
                    split,
                    span: field(block.in_ub_size, "in_ub_size")?,
                })
            }
            StrategyKind::PerElement => {
                let rank = field(block.outer_axis_num, "outer_axis_num")? as usize;
                if rank == 0 || rank > OUTER_SLOTS {
                    return Err(LayoutError::Abi(format!("per-element rank {rank}")));
                }
                let mut extents = [1u64; OUTER_SLOTS];
                let mut strides = [0u64; OUTER_SLOTS];
                for slot in 0..OUTER_SLOTS {
                    extents[slot] = field(block.out_loop_arr[slot], "out_loop_arr")?;
                    strides[slot] = field(block.out_stride_arr[slot], "out_stride_arr")?;
                }
                let numel = field(block.total_iterations, "total_iterations")?;
                if extents[..rank].iter().product::<u64>() != numel {
                    return Err(LayoutError::Abi(format!(
                        "per-element extents {:?} do not multiply to {numel}",
                        &extents[..rank]
                    )));
                }
                let split = decode_split(numel, block)?;
                Self::PerElement(PerElementParams {
                    rank,
                    extents,
                    strides,
                    numel,
                    split,
                })
            }
            StrategyKind::Broadcast => {
                let numel = field(block.total_iterations, "total_iterations")?;
                let ub_factor = field(block.ub_factor, "ub_factor")?;
                if ub_factor == 0 {
                    return Err(LayoutError::Abi("broadcast chunk of 0 elements".into()));
                }
                Self::Broadcast(BroadcastParams {
                    numel,
                    split: decode_split(numel, block)?,
                    ub_factor,
                })
            }
        };
        Ok(params)
    }
}

fn encode_split(split: &BlockSplit, block: &mut TilingParameterBlock) -> Result<()> {
    block.used_core_num = to_field(split.used, "used_core_num")?;
    block.loops_per_core = to_field(split.factor, "loops_per_core")?;
    block.loops_tail_core = to_field(split.tail, "loops_tail_core")?;
    Ok(())
}

fn decode_split(total: u64, block: &TilingParameterBlock) -> Result<BlockSplit> {
    let split = BlockSplit {
        total,
        factor: field(block.loops_per_core, "loops_per_core")?,
        used: field(block.used_core_num, "used_core_num")?,
        tail: field(block.loops_tail_core, "loops_tail_core")?,
    };
    let consistent = if total == 0 {
        split.used == 0
    } else {
        split.used > 0
            && split.tail > 0
            && split.tail <= split.factor
            && (split.used - 1) * split.factor + split.tail == total
    };
    if !consistent {
        return Err(LayoutError::Abi(format!("core split {split:?} does not cover {total}")));
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::single_cut::plan_single_cut;

    fn round_trip(params: &StrategyParams) -> StrategyParams {
        let mut block = TilingParameterBlock {
            dtype_size: 4,
            ..TilingParameterBlock::default()
        };
        params.encode(&mut block).unwrap();
        StrategyParams::decode(params.kind(), &block).unwrap()
    }

    #[test]
    fn test_direct_round_trip() {
        let cut = plan_single_cut(&[37, 10], &[10, 1], 120, 5, None).unwrap();
        let split = BlockSplit::new(cut.total_iterations, 3);
        let params = StrategyParams::Direct(DirectParams { cut, split });
        assert_eq!(round_trip(&params), params);
        assert_eq!(params.used_cores(), 2);
    }

    #[test]
    fn test_align_round_robin_counts() {
        let cut = plan_single_cut(&[10, 5], &[1, 10], 16, 4, Some(8)).unwrap();
        let params = AlignParams {
            used_cores: 3,
            loops_per_core: cut.total_iterations.div_ceil(3),
            en_32b_aligned: true,
            padded_row: 8,
            cut,
        };
        assert_eq!(params.cut.total_iterations, 5);
        let loops: Vec<u64> = (0..4).map(|c| params.loops_of(c)).collect();
        assert_eq!(loops, vec![2, 2, 1, 0]);
        let wrapped = StrategyParams::AlignmentAware(params);
        assert_eq!(round_trip(&wrapped), wrapped);
    }

    #[test]
    fn test_per_element_rejects_bad_extents() {
        let mut extents = [1u64; OUTER_SLOTS];
        extents[..3].copy_from_slice(&[2, 3, 4]);
        let params = PerElementParams {
            rank: 3,
            extents,
            strides: [0; OUTER_SLOTS],
            numel: 24,
            split: BlockSplit::new(24, 4),
        };
        let mut block = TilingParameterBlock::default();
        let wrapped = StrategyParams::PerElement(params);
        wrapped.encode(&mut block).unwrap();
        assert_eq!(
            StrategyParams::decode(StrategyKind::PerElement, &block).unwrap(),
            wrapped
        );
        block.total_iterations = 25;
        assert!(StrategyParams::decode(StrategyKind::PerElement, &block).is_err());
    }

    #[test]
    fn test_broadcast_round_trip() {
        let params = StrategyParams::Broadcast(BroadcastParams {
            numel: 1000,
            split: BlockSplit::new(1000, 64),
            ub_factor: 16,
        });
        assert_eq!(round_trip(&params), params);
    }

    #[test]
    fn test_inconsistent_split_rejected() {
        let mut block = TilingParameterBlock {
            used_core_num: 2,
            loops_per_core: 3,
            loops_tail_core: 3,
            ..TilingParameterBlock::default()
        };
        assert!(decode_split(7, &block).is_err());
        block.loops_tail_core = 4;
        assert!(decode_split(7, &block).is_err());
        block.loops_per_core = 4;
        block.loops_tail_core = 3;
        assert!(decode_split(7, &block).is_ok());
    }
}

//! Host-side tiling
//!
//! Everything here runs before a launch: the single- and dual-cut searches,
//! per-strategy parameters, the strategy key and the flat parameter block the
//! device decodes. [`TilingPlanner`] ties them together.

pub mod block;
pub mod dual_cut;
pub mod key;
pub mod params;
pub mod planner;
pub mod single_cut;
pub mod split;

pub use block::{TilingParameterBlock, DMA_LEVELS, OUTER_SLOTS};
pub use dual_cut::{seek_dual_cut, DualCutPlan, DualCutStep, TailCase};
pub use key::{StrategyKey, StrategyKind};
pub use params::{
    AlignParams, BroadcastParams, DirectParams, GatherParams, PerElementParams, StrategyParams,
};
pub use planner::{ExecutionPlan, PlanRequest, TilingPlanner, PER_ELEMENT_MAX_RANK};
pub use single_cut::{plan_single_cut, SingleCut};
pub use split::BlockSplit;

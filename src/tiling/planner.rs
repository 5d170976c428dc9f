//! Host-side tiling planner
//!
//! [`TilingPlanner::plan`] turns one as-strided request into an
//! [`ExecutionPlan`]: validated and normalized view, a strategy, its
//! parameters, and the serialized [`TilingParameterBlock`] every core reads.
//!
//! Strategies are tried in a fixed order and the first feasible one wins:
//!
//! 1. empty view
//! 2. every stride zero (broadcast)
//! 3. alignment-aware copy, when the last axis is a long unit-stride run
//! 4. dual cut, when the single cut splits and leaves a short stride outside
//!    scratch
//! 5. direct copy, when the innermost run is granule aligned
//! 6. gather, when the whole source window fits in scratch
//! 7. per-element, for small payloads or high rank
//! 8. direct copy, which always fits

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::device::element::index_width;
use crate::dtype::DataType;
use crate::error::{LayoutError, Result};
use crate::hardware::HardwareSpec;
use crate::shape::ShapeDescriptor;
use crate::tiling::block::{to_field, TilingParameterBlock, DMA_LEVELS, OUTER_SLOTS};
use crate::tiling::dual_cut::seek_dual_cut;
use crate::tiling::key::{StrategyKey, StrategyKind};
use crate::tiling::params::{
    AlignParams, BroadcastParams, DirectParams, GatherParams, PerElementParams, StrategyParams,
};
use crate::tiling::single_cut::{plan_single_cut, SingleCut};
use crate::tiling::split::BlockSplit;

/// Last-axis bytes from which padded scratch rows pay off
const MOVE_ALIGN_BYTES: u64 = 128;
/// Minimum byte spread of the strides for padded rows
const MOVE_ALIGN_STRIDE_RANGE: u64 = 32;
/// Byte stride below which a dual cut is considered
const DUAL_CUT_STRIDE_BYTES: u64 = 64;
/// Largest byte stride on the tiling axis that still favors a dual cut
const DUAL_CUT_TILING_BYTES: u64 = 128;
/// Payload up to which per-element copy beats block copy
const PER_ELEMENT_BYTES: u64 = 64 * 1024;
/// Highest merged rank the per-element kernel unrolls
pub const PER_ELEMENT_MAX_RANK: usize = 8;
/// Merged rank above which per-element copy is preferred
const PER_ELEMENT_PREFERRED_RANK: usize = 5;
/// Descriptor levels the block strategies use inside a slot
const DIRECT_LEVELS: usize = 5;
const ALIGN_LEVELS: usize = 4;
const GATHER_LEVELS: usize = 3;

/// One as-strided invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    /// Layout of the source tensor; bounds the readable storage
    pub input: ShapeDescriptor,
    /// Requested view over the source storage
    pub view: ShapeDescriptor,
    /// Element type; only its width matters
    pub dtype: DataType,
}

impl PlanRequest {
    pub fn new(input: ShapeDescriptor, view: ShapeDescriptor, dtype: DataType) -> Self {
        Self { input, view, dtype }
    }

    /// Build from raw signed metadata
    ///
    /// # Errors
    ///
    /// Propagates descriptor validation failures.
    pub fn from_raw(
        input_shape: &[i64],
        input_strides: &[i64],
        out_shape: &[i64],
        out_strides: &[i64],
        storage_offset: i64,
        dtype: DataType,
    ) -> Result<Self> {
        Ok(Self {
            input: ShapeDescriptor::new(input_shape, input_strides, 0)?,
            view: ShapeDescriptor::new(out_shape, out_strides, storage_offset)?,
            dtype,
        })
    }

    pub fn width(&self) -> usize {
        self.dtype.size()
    }
}

/// Planner output for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub key: StrategyKey,
    /// Cores that receive work; zero for an empty view
    pub used_cores: u64,
    /// Workspace the launch must be given, in bytes
    pub workspace_bytes: usize,
    /// Normalized view the strategy was planned over
    pub view: ShapeDescriptor,
    /// Elements in the output
    pub numel: u64,
    /// Element width in bytes
    pub width: usize,
    #[serde(skip)]
    pub params: StrategyParams,
    /// Serialized form of `params` plus the launch header
    #[serde(skip)]
    pub block: TilingParameterBlock,
}

impl ExecutionPlan {
    pub fn kind(&self) -> StrategyKind {
        self.key.kind()
    }

    /// Serialized parameter block for [`crate::device::Device::launch`]
    pub fn tiling_bytes(&self) -> Vec<u8> {
        self.block.to_bytes()
    }

    /// Bytes of the row-major output
    pub fn output_bytes(&self) -> usize {
        self.numel as usize * self.width
    }
}

/// Validated request, ready for strategy selection
#[derive(Debug)]
struct Prepared {
    view: ShapeDescriptor,
    width: usize,
    numel: u64,
    capacity: u64,
}

impl Prepared {
    fn extents(&self) -> &[u64] {
        self.view.extents()
    }

    fn strides(&self) -> &[u64] {
        self.view.strides()
    }
}

/// Chooses and parameterizes a strategy for a given device
#[derive(Debug, Clone, Default)]
pub struct TilingPlanner {
    hw: HardwareSpec,
}

impl TilingPlanner {
    pub fn new(hw: HardwareSpec) -> Self {
        Self { hw }
    }

    pub fn hardware(&self) -> &HardwareSpec {
        &self.hw
    }

    /// Plan with automatic strategy selection
    ///
    /// # Errors
    ///
    /// - [`LayoutError::OutOfRange`] when the view reads past the input storage
    /// - [`LayoutError::Overflow`] when counts or offsets exceed 32 bits
    /// - [`LayoutError::NoFeasibleTiling`] when a slot cannot hold one granule
    /// - [`LayoutError::UnsupportedDataType`] for an unsupported width
    ///
    /// # Examples
    ///
    /// ```
    /// use trueno_strided::{DataType, HardwareSpec, ShapeDescriptor};
    /// use trueno_strided::tiling::{PlanRequest, StrategyKind, TilingPlanner};
    ///
    /// let input = ShapeDescriptor::contiguous(&[1000]).unwrap();
    /// let view = ShapeDescriptor::new(&[1000], &[0], 0).unwrap();
    /// let request = PlanRequest::new(input, view, DataType::Float32);
    /// let plan = TilingPlanner::new(HardwareSpec::default()).plan(&request).unwrap();
    /// assert_eq!(plan.kind(), StrategyKind::Broadcast);
    /// ```
    #[instrument(skip_all, fields(extents = ?request.view.extents(), width = request.width()))]
    pub fn plan(&self, request: &PlanRequest) -> Result<ExecutionPlan> {
        let Some(prep) = self.prepare(request)? else {
            return self.finish(request, StrategyParams::Empty, request.view.clone());
        };
        let params = self.select(&prep)?;
        self.finish(request, params, prep.view)
    }

    /// Plan a named strategy
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidTiling`] if `kind` cannot run this
    /// request, plus every error of [`TilingPlanner::plan`].
    #[instrument(skip_all, fields(extents = ?request.view.extents(), kind = kind.name()))]
    pub fn plan_with(&self, request: &PlanRequest, kind: StrategyKind) -> Result<ExecutionPlan> {
        let infeasible = |why: &str| LayoutError::InvalidTiling(format!("{}: {why}", kind.name()));
        let Some(prep) = self.prepare(request)? else {
            if kind != StrategyKind::Empty {
                return Err(infeasible("view is empty"));
            }
            return self.finish(request, StrategyParams::Empty, request.view.clone());
        };
        let params = match kind {
            StrategyKind::Empty => return Err(infeasible("view is not empty")),
            StrategyKind::Direct => self.direct(&prep)?,
            StrategyKind::AlignmentAware => self
                .align(&prep)
                .map_err(|e| infeasible(&e.to_string()))?,
            StrategyKind::DualCut => {
                let cut = self.single_cut(&prep)?;
                self.dual_cut(&prep, &cut)
                    .map_err(|e| infeasible(&e.to_string()))?
            }
            StrategyKind::Gather => self
                .gather(&prep)?
                .ok_or_else(|| infeasible("source window or index range too large"))?,
            StrategyKind::PerElement => self
                .per_element(&prep)
                .ok_or_else(|| infeasible("rank above 8"))?,
            StrategyKind::Broadcast => self
                .broadcast(&prep)
                .ok_or_else(|| infeasible("view has a non-zero stride"))?,
        };
        self.finish(request, params, prep.view)
    }

    /// Validate and normalize; `None` for an empty view
    fn prepare(&self, request: &PlanRequest) -> Result<Option<Prepared>> {
        let width = request.width();
        StrategyKey::new(StrategyKind::Direct, width)?;
        let view = &request.view;
        if view.is_empty() {
            debug!("empty view, nothing to dispatch");
            return Ok(None);
        }
        let required = view.storage_len();
        let available = request.input.storage_len();
        if required > available {
            return Err(LayoutError::OutOfRange {
                required,
                available,
            });
        }
        let numel = view.numel();
        if numel > u64::from(u32::MAX) {
            return Err(LayoutError::Overflow(format!("{numel} elements")));
        }
        if required > u64::from(u32::MAX) {
            return Err(LayoutError::Overflow(format!("source extent {required}")));
        }
        let capacity = self.hw.slot_capacity(width);
        if capacity < self.hw.block_elems(width).max(1) {
            return Err(LayoutError::NoFeasibleTiling(format!(
                "{} scratch bytes hold {capacity} elements per slot, below one {}-byte granule",
                self.hw.scratch_bytes, self.hw.granularity
            )));
        }
        Ok(Some(Prepared {
            view: view.normalized(),
            width,
            numel,
            capacity,
        }))
    }

    fn select(&self, prep: &Prepared) -> Result<StrategyParams> {
        if let Some(params) = self.broadcast(prep) {
            return Ok(params);
        }
        if self.wants_move_align(prep) {
            match self.align(prep) {
                Ok(params) => return Ok(params),
                Err(e) => debug!(error = %e, "alignment-aware layout infeasible"),
            }
        }

        let cut = self.single_cut(prep)?;
        if cut.split && self.wants_dual_cut(prep, cut.tiling_axis) {
            match self.dual_cut(prep, &cut) {
                Ok(params) => return Ok(params),
                Err(e) => warn!(error = %e, "dual cut rejected, keeping single cut"),
            }
        }

        if self.innermost_aligned(prep) {
            return Ok(self.direct_from(cut));
        }
        if let Some(params) = self.gather(prep)? {
            return Ok(params);
        }
        let payload = prep.numel * prep.width as u64;
        if payload <= PER_ELEMENT_BYTES || prep.view.rank() > PER_ELEMENT_PREFERRED_RANK {
            if let Some(params) = self.per_element(prep) {
                return Ok(params);
            }
        }
        Ok(self.direct_from(cut))
    }

    fn finish(
        &self,
        request: &PlanRequest,
        params: StrategyParams,
        view: ShapeDescriptor,
    ) -> Result<ExecutionPlan> {
        let width = request.width();
        let kind = params.kind();
        let key = StrategyKey::new(kind, width)?;
        let numel = if kind == StrategyKind::Empty {
            0
        } else {
            view.numel()
        };
        let workspace_bytes = if kind == StrategyKind::Empty {
            0
        } else {
            self.hw.system_workspace
        };
        let mut block = TilingParameterBlock {
            key: key.encode(),
            dtype_size: to_field(width as u64, "dtype_size")?,
            storage_offset: to_field(view.offset(), "storage_offset")?,
            workspace_bytes: to_field(workspace_bytes as u64, "workspace_bytes")?,
            numel: to_field(numel, "numel")?,
            ..TilingParameterBlock::default()
        };
        params.encode(&mut block)?;
        let used_cores = params.used_cores();
        debug!(
            strategy = kind.name(),
            key = key.encode(),
            used_cores,
            iterations = block.total_iterations,
            ub_size = block.ub_size,
            "tiling planned"
        );
        Ok(ExecutionPlan {
            key,
            used_cores,
            workspace_bytes,
            view,
            numel,
            width,
            params,
            block,
        })
    }

    fn cores(&self) -> u64 {
        self.hw.cores.max(1) as u64
    }

    fn broadcast(&self, prep: &Prepared) -> Option<StrategyParams> {
        if !prep.view.all_strides_zero() || prep.numel <= 1 {
            return None;
        }
        let split = BlockSplit::new(prep.numel, self.cores());
        Some(StrategyParams::Broadcast(BroadcastParams {
            numel: prep.numel,
            split,
            ub_factor: split.factor.min(prep.capacity),
        }))
    }

    /// Long unit-stride last axis, spread-out and distinct strides
    fn wants_move_align(&self, prep: &Prepared) -> bool {
        let (extents, strides) = (prep.extents(), prep.strides());
        let w = prep.width as u64;
        let last = extents.len() - 1;
        if strides[last] != 1 || extents[last] * w < MOVE_ALIGN_BYTES {
            return false;
        }
        let (min, max) = strides
            .iter()
            .fold((u64::MAX, 0), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        if (max - min) * w < MOVE_ALIGN_STRIDE_RANGE {
            return false;
        }
        let mut sorted = strides.to_vec();
        sorted.sort_unstable();
        sorted.windows(2).all(|pair| pair[0] != pair[1])
    }

    fn align(&self, prep: &Prepared) -> Result<StrategyParams> {
        let block = self.hw.block_elems(prep.width).max(1);
        let (extents, strides) = (prep.extents(), prep.strides());
        let cut = plan_single_cut(extents, strides, prep.capacity, ALIGN_LEVELS, Some(block))?;
        let row_len = cut.main.loops[DMA_LEVELS - 1];
        let padded_row = row_len.div_ceil(block) * block;
        let used_cores = cut.total_iterations.min(self.cores());
        let loops_per_core = cut.total_iterations.div_ceil(used_cores);
        debug!(
            row_len,
            padded_row,
            used_cores,
            loops_per_core,
            "alignment-aware layout"
        );
        Ok(StrategyParams::AlignmentAware(AlignParams {
            en_32b_aligned: padded_row != row_len,
            padded_row,
            used_cores,
            loops_per_core,
            cut,
        }))
    }

    /// A short source stride sits outside the single cut's scratch tile
    fn wants_dual_cut(&self, prep: &Prepared, tiling_axis: usize) -> bool {
        if prep.view.rank() < 2 {
            return false;
        }
        let w = prep.width as u64;
        let bytes: Vec<u64> = prep.strides().iter().map(|&s| s * w).collect();
        let smallest = bytes.iter().enumerate().min_by_key(|&(_, b)| *b);
        let Some((min_axis, &min_bytes)) = smallest else {
            return false;
        };
        if min_bytes >= DUAL_CUT_STRIDE_BYTES {
            return false;
        }
        let outside = &bytes[..tiling_axis];
        if outside.iter().any(|&b| b <= DUAL_CUT_STRIDE_BYTES) {
            return true;
        }
        min_axis == tiling_axis && min_bytes <= DUAL_CUT_TILING_BYTES
    }

    fn dual_cut(&self, prep: &Prepared, cut: &SingleCut) -> Result<StrategyParams> {
        if !cut.split {
            return Err(LayoutError::InvalidTiling("view fits one slot".into()));
        }
        let (extents, strides) = (prep.extents(), prep.strides());
        let plan = seek_dual_cut(extents, strides, prep.width, prep.capacity, &self.hw)
            .ok_or_else(|| LayoutError::InvalidTiling("seeker found no two-axis tile".into()))?;
        plan.validate(extents, strides, prep.capacity)?;
        Ok(StrategyParams::DualCut(plan))
    }

    fn innermost_aligned(&self, prep: &Prepared) -> bool {
        let last = prep.view.rank() - 1;
        let row_bytes = prep.extents()[last] * prep.width as u64;
        prep.strides()[last] == 1 && row_bytes % self.hw.granularity.max(1) as u64 == 0
    }

    fn single_cut(&self, prep: &Prepared) -> Result<SingleCut> {
        let (extents, strides) = (prep.extents(), prep.strides());
        plan_single_cut(extents, strides, prep.capacity, DIRECT_LEVELS, None)
    }

    fn direct(&self, prep: &Prepared) -> Result<StrategyParams> {
        Ok(self.direct_from(self.single_cut(prep)?))
    }

    fn direct_from(&self, cut: SingleCut) -> StrategyParams {
        let split = BlockSplit::new(cut.total_iterations, self.cores());
        StrategyParams::Direct(DirectParams { cut, split })
    }

    fn gather(&self, prep: &Prepared) -> Result<Option<StrategyParams>> {
        let w = prep.width as u64;
        let Some(idx_bytes) = index_width(prep.width) else {
            return Ok(None);
        };
        let idx_w = idx_bytes as u64;
        let span = prep.view.span();
        let index_max = u64::MAX >> (64 - 8 * idx_w);
        if span - 1 > index_max {
            return Ok(None);
        }
        let window = self.hw.align_up(span * w);
        let scratch = self.hw.scratch_bytes as u64;
        if window >= scratch {
            return Ok(None);
        }
        // output slots of ub elements plus one index buffer
        let slots = self.hw.buffer_num.max(1) as u64;
        let ub = (scratch - window) / (slots * w + idx_w);
        let lanes = (self.hw.vector_bytes / idx_bytes).max(1);
        if ub == 0 {
            return Ok(None);
        }
        let (extents, strides) = (prep.extents(), prep.strides());
        let cut = match plan_single_cut(extents, strides, ub, GATHER_LEVELS, None) {
            Ok(cut) => cut,
            Err(LayoutError::NoFeasibleTiling(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        debug!(span, ub, lanes, "gather window fits scratch");
        let split = BlockSplit::new(cut.total_iterations, self.cores());
        Ok(Some(StrategyParams::Gather(GatherParams { cut, split, span })))
    }

    fn per_element(&self, prep: &Prepared) -> Option<StrategyParams> {
        let rank = prep.view.rank();
        if rank > PER_ELEMENT_MAX_RANK {
            return None;
        }
        let mut extents = [1u64; OUTER_SLOTS];
        let mut strides = [0u64; OUTER_SLOTS];
        extents[..rank].copy_from_slice(prep.extents());
        strides[..rank].copy_from_slice(prep.strides());
        Some(StrategyParams::PerElement(PerElementParams {
            rank,
            extents,
            strides,
            numel: prep.numel,
            split: BlockSplit::new(prep.numel, self.cores()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(shape: &[i64], strides: &[i64], offset: i64, dtype: DataType) -> PlanRequest {
        let view = ShapeDescriptor::new(shape, strides, offset).unwrap();
        let input = ShapeDescriptor::contiguous(&[view.storage_len().max(1)]).unwrap();
        PlanRequest::new(input, view, dtype)
    }

    fn planner() -> TilingPlanner {
        TilingPlanner::new(HardwareSpec::default())
    }

    fn plan_for(shape: &[i64], strides: &[i64], offset: i64, dtype: DataType) -> ExecutionPlan {
        let req = request(shape, strides, offset, dtype);
        planner().plan(&req).unwrap()
    }

    #[test]
    fn test_empty_view() {
        let plan = plan_for(&[4, 0, 3], &[1, 1, 1], 0, DataType::Float32);
        assert_eq!(plan.kind(), StrategyKind::Empty);
        assert_eq!(plan.used_cores, 0);
        assert_eq!(plan.block.key, 0);
        assert_eq!(plan.output_bytes(), 0);
    }

    #[test]
    fn test_contiguous_is_direct() {
        let plan = plan_for(&[64, 64], &[64, 1], 0, DataType::Float32);
        assert_eq!(plan.kind(), StrategyKind::Direct);
        assert_eq!(plan.block.key, 4);
        assert_eq!(plan.view.extents(), &[4096]);
    }

    #[test]
    fn test_broadcast() {
        let plan = plan_for(&[1000], &[0], 3, DataType::Int16);
        assert_eq!(plan.kind(), StrategyKind::Broadcast);
        assert_eq!(plan.block.key, 502);
        assert_eq!(plan.used_cores, 63);
    }

    #[test]
    fn test_move_align_selected() {
        // rows of 40 f32 (160 bytes) picked every 48 elements
        let plan = plan_for(&[100, 40], &[48, 1], 0, DataType::Float32);
        assert_eq!(plan.kind(), StrategyKind::AlignmentAware);
        assert_eq!(plan.block.key, 104);
        assert_eq!(plan.block.padded_row, 40);
        assert_eq!(plan.block.en_32b_aligned, 0);
    }

    #[test]
    fn test_square_transpose_is_dual_cut() {
        let plan = plan_for(&[512, 512], &[1, 512], 0, DataType::Float32);
        assert_eq!(plan.kind(), StrategyKind::DualCut);
        assert_eq!(plan.block.key, 204);
        assert_eq!(plan.block.ub_size, 31_680);
    }

    #[test]
    fn test_dual_cut_rows_follow_granularity() {
        let hw = HardwareSpec::tiny().with_scratch_bytes(32 * 1024);
        let req = request(&[200, 37], &[1, 200], 0, DataType::Float32);
        for (granularity, padded_row, iterations) in [(32, 40, 2), (64, 48, 3)] {
            let planner = TilingPlanner::new(hw.clone().with_granularity(granularity));
            let plan = planner.plan(&req).unwrap();
            assert_eq!(plan.kind(), StrategyKind::DualCut);
            assert_eq!(plan.block.cut_axis_num, 1);
            assert_eq!(plan.block.padded_row, padded_row);
            assert_eq!(plan.block.total_iterations, iterations);
        }
    }

    #[test]
    fn test_gather_index_range_follows_width() {
        // u16 indices address at most 65536 elements of a byte window
        let hw = HardwareSpec::default().with_scratch_bytes(1 << 20);
        let planner = TilingPlanner::new(hw);
        let req = request(&[2, 30_000], &[1, 2], 0, DataType::UInt8);
        let plan = planner.plan_with(&req, StrategyKind::Gather).unwrap();
        assert_eq!(plan.kind(), StrategyKind::Gather);
        let req = request(&[2, 35_000], &[1, 2], 0, DataType::UInt8);
        assert!(planner.plan_with(&req, StrategyKind::Gather).is_err());
        let req = request(&[2, 35_000], &[1, 2], 0, DataType::Float32);
        assert!(planner.plan_with(&req, StrategyKind::Gather).is_ok());
    }

    #[test]
    fn test_small_transpose_is_gather() {
        let plan = plan_for(&[4, 3, 2], &[1, 4, 12], 0, DataType::Float32);
        assert_eq!(plan.kind(), StrategyKind::Gather);
        assert_eq!(plan.used_cores, 1);
    }

    #[test]
    fn test_out_of_range() {
        let view = ShapeDescriptor::new(&[10], &[2], 5).unwrap();
        let input = ShapeDescriptor::contiguous(&[20]).unwrap();
        let err = planner()
            .plan(&PlanRequest::new(input, view, DataType::Float32))
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::OutOfRange {
                required: 24,
                available: 20
            }
        );
    }

    #[test]
    fn test_overflow() {
        let view = ShapeDescriptor::new(&[1 << 20, 1 << 13], &[0, 0], 0).unwrap();
        let input = ShapeDescriptor::contiguous(&[1]).unwrap();
        let err = planner()
            .plan(&PlanRequest::new(input, view, DataType::UInt8))
            .unwrap_err();
        assert!(matches!(err, LayoutError::Overflow(_)));
    }

    #[test]
    fn test_scratch_too_small() {
        let hw = HardwareSpec::default().with_scratch_bytes(32);
        let err = TilingPlanner::new(hw)
            .plan(&request(&[10], &[1], 0, DataType::Float32))
            .unwrap_err();
        assert!(matches!(err, LayoutError::NoFeasibleTiling(_)));
    }

    #[test]
    fn test_forced_strategies() {
        let req = request(&[4, 5, 6], &[1, 4, 20], 0, DataType::Float32);
        let p = planner();
        for kind in [
            StrategyKind::Direct,
            StrategyKind::Gather,
            StrategyKind::PerElement,
        ] {
            assert_eq!(p.plan_with(&req, kind).unwrap().kind(), kind);
        }
        assert!(matches!(
            p.plan_with(&req, StrategyKind::Broadcast),
            Err(LayoutError::InvalidTiling(_))
        ));
        assert!(matches!(
            p.plan_with(&req, StrategyKind::Empty),
            Err(LayoutError::InvalidTiling(_))
        ));
    }

    #[test]
    fn test_plan_serializes() {
        let plan = plan_for(&[8], &[1], 0, DataType::Int64);
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"numel\":8"));
        assert!(json.contains("\"used_cores\":1"));
    }
}

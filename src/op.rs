//! Host-side convenience entry points
//!
//! These validate, plan, allocate device memory, launch, and copy the result
//! back. Callers that want to reuse a plan or inspect launch statistics go
//! through [`TilingPlanner`] and [`Device`] directly.

use tracing::instrument;

use crate::device::{Device, GlobalMemory, LaunchStats};
use crate::dtype::DataType;
use crate::error::{LayoutError, Result};
use crate::hardware::HardwareSpec;
use crate::shape::ShapeDescriptor;
use crate::tiling::{ExecutionPlan, PlanRequest, TilingPlanner};

/// Output bytes plus what the launch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridedOutput {
    /// Row-major view elements
    pub bytes: Vec<u8>,
    pub plan: ExecutionPlan,
    pub stats: LaunchStats,
}

/// Materialize `view` over the storage of `input` in row-major order
///
/// `input_bytes` backs `input_desc`; its length must cover the descriptor's
/// storage at `dtype`'s width.
///
/// # Errors
///
/// Every planning and launch error, plus [`LayoutError::OutOfRange`] when
/// `input_bytes` is shorter than `input_desc` claims.
///
/// # Examples
///
/// ```
/// use trueno_strided::{as_strided, DataType, HardwareSpec, ShapeDescriptor};
///
/// // transpose a 2x3 u8 matrix
/// let input = ShapeDescriptor::contiguous(&[2, 3]).unwrap();
/// let view = ShapeDescriptor::new(&[3, 2], &[1, 3], 0).unwrap();
/// let hw = HardwareSpec::default();
/// let out = as_strided(&[1, 2, 3, 4, 5, 6], &input, &view, DataType::UInt8, &hw).unwrap();
/// assert_eq!(out, vec![1, 4, 2, 5, 3, 6]);
/// ```
pub fn as_strided(
    input_bytes: &[u8],
    input_desc: &ShapeDescriptor,
    view: &ShapeDescriptor,
    dtype: DataType,
    hw: &HardwareSpec,
) -> Result<Vec<u8>> {
    let request = PlanRequest::new(input_desc.clone(), view.clone(), dtype);
    let plan = TilingPlanner::new(hw.clone()).plan(&request)?;
    execute(input_bytes, &request, plan, hw).map(|out| out.bytes)
}

/// Launch an already planned request
///
/// # Errors
///
/// Same as [`as_strided`].
#[instrument(skip_all, fields(strategy = plan.kind().name(), numel = plan.numel))]
pub fn execute(
    input_bytes: &[u8],
    request: &PlanRequest,
    plan: ExecutionPlan,
    hw: &HardwareSpec,
) -> Result<StridedOutput> {
    let width = request.width() as u64;
    let available = input_bytes.len() as u64 / width;
    let required = request.input.storage_len();
    if available < required {
        return Err(LayoutError::OutOfRange {
            required,
            available,
        });
    }
    let input = GlobalMemory::from_bytes(input_bytes);
    let output = GlobalMemory::zeroed(plan.output_bytes());
    let mut workspace = vec![0u8; plan.workspace_bytes];
    let device = Device::new(hw.clone());
    let stats = device.launch(&input, &output, &mut workspace, &plan.tiling_bytes())?;
    Ok(StridedOutput {
        bytes: output.to_vec(),
        plan,
        stats,
    })
}

/// Row-major copy of a strided tensor
///
/// # Errors
///
/// Same as [`as_strided`].
pub fn contiguous(
    input_bytes: &[u8],
    tensor: &ShapeDescriptor,
    dtype: DataType,
    hw: &HardwareSpec,
) -> Result<Vec<u8>> {
    let storage = ShapeDescriptor::contiguous(&[tensor.storage_len()])?;
    as_strided(input_bytes, &storage, tensor, dtype, hw)
}

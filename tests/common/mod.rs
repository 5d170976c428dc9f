//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::ops::Range;

use bytemuck::Pod;
use trueno_strided::device::{Device, GlobalMemory, LaunchStats};
use trueno_strided::tiling::{PlanRequest, StrategyKind, TilingPlanner};
use trueno_strided::{DataType, ExecutionPlan, HardwareSpec, ShapeDescriptor};

/// Result of one audited launch
pub struct Run<T> {
    pub output: Vec<T>,
    pub stats: LaunchStats,
    pub plan: ExecutionPlan,
    pub writes: Vec<Range<usize>>,
}

/// Element `i` of the row-major output, computed directly from the view
pub fn reference<T: Copy>(src: &[T], view: &ShapeDescriptor) -> Vec<T> {
    (0..view.numel())
        .map(|i| src[(view.offset() + view.offset_of(i)) as usize])
        .collect()
}

pub fn iota_u32(n: u64) -> Vec<u32> {
    (0..n as u32).map(|v| v.wrapping_mul(2_654_435_761)).collect()
}

pub fn dtype_for<T: Pod>() -> DataType {
    DataType::from_width(std::mem::size_of::<T>()).expect("supported width")
}

/// Plan (optionally forcing `kind`) and launch with a write audit
pub fn launch<T: Pod>(
    src: &[T],
    view: &ShapeDescriptor,
    hw: &HardwareSpec,
    kind: Option<StrategyKind>,
) -> trueno_strided::Result<Run<T>> {
    let input = ShapeDescriptor::contiguous(&[src.len() as u64])?;
    let request = PlanRequest::new(input, view.clone(), dtype_for::<T>());
    let planner = TilingPlanner::new(hw.clone());
    let plan = match kind {
        Some(kind) => planner.plan_with(&request, kind)?,
        None => planner.plan(&request)?,
    };
    let input = GlobalMemory::from_slice(src);
    let output = GlobalMemory::zeroed(plan.output_bytes()).with_audit();
    let mut workspace = vec![0u8; plan.workspace_bytes];
    let device = Device::new(hw.clone());
    let stats = device.launch(&input, &output, &mut workspace, &plan.tiling_bytes())?;
    Ok(Run {
        output: output.to_typed(),
        stats,
        writes: output.audit_log().unwrap_or_default(),
        plan,
    })
}

/// True when `writes` tile `0..len` exactly once
pub fn covers_exactly_once(writes: &[Range<usize>], len: usize) -> bool {
    let mut sorted: Vec<Range<usize>> = writes.iter().filter(|r| !r.is_empty()).cloned().collect();
    sorted.sort_by_key(|r| r.start);
    let mut next = 0;
    for range in sorted {
        if range.start != next {
            return false;
        }
        next = range.end;
    }
    next == len
}

pub fn view(extents: &[i64], strides: &[i64], offset: i64) -> ShapeDescriptor {
    ShapeDescriptor::new(extents, strides, offset).expect("valid view")
}

//! Kernel launch over simulated cores
//!
//! A launch decodes the parameter block, picks the kernel for the strategy
//! key and element width, and runs one [`CoreKernel::run_core`] per used
//! core. Cores share the input and output [`GlobalMemory`] and write disjoint
//! output ranges; with the `parallel` feature they run on the rayon pool.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use super::element::Element;
use super::memory::GlobalMemory;
use crate::error::{LayoutError, Result};
use crate::hardware::HardwareSpec;
use crate::kernels::{
    AlignKernel, BroadcastKernel, DirectKernel, DualCutKernel, GatherKernel, PerElementKernel,
};
use crate::tiling::block::{field, TilingParameterBlock};
use crate::tiling::{StrategyKey, StrategyKind, StrategyParams};

/// What one core sees while it runs
#[derive(Debug, Clone, Copy)]
pub struct CoreContext<'a> {
    /// Index of this core, below `used_cores`
    pub core_idx: u64,
    pub used_cores: u64,
    /// Source tensor storage, shared by every core
    pub input: &'a GlobalMemory,
    pub output: &'a GlobalMemory,
    pub hw: &'a HardwareSpec,
}

impl CoreContext<'_> {
    /// Scratch elements of `width` bytes one slot may hold
    pub fn slot_capacity(&self, width: usize) -> u64 {
        self.hw.slot_capacity(width)
    }

    /// Reject a slot request larger than scratch allows
    pub fn check_slot(&self, elems: u64, width: usize) -> Result<usize> {
        let capacity = self.slot_capacity(width);
        if elems > capacity {
            return Err(LayoutError::InnerNull(format!(
                "core {} asks for a {elems}-element slot, scratch holds {capacity}",
                self.core_idx
            )));
        }
        usize::try_from(elems).map_err(|_| LayoutError::Overflow(format!("slot of {elems}")))
    }
}

/// Per-core work counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStats {
    /// Tiles moved
    pub iterations: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl CoreStats {
    /// Count one transfer of `elems` elements in each direction
    pub fn record(&mut self, elems: u64, width: usize) {
        self.iterations += 1;
        self.bytes_read += elems * width as u64;
        self.bytes_written += elems * width as u64;
    }
}

/// Totals over every core of one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaunchStats {
    pub strategy: StrategyKind,
    pub used_cores: u64,
    /// Tiles moved, summed over cores
    pub iterations: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl LaunchStats {
    fn empty() -> Self {
        Self {
            strategy: StrategyKind::Empty,
            used_cores: 0,
            iterations: 0,
            bytes_read: 0,
            bytes_written: 0,
        }
    }
}

/// Device-side program for one strategy
pub trait CoreKernel: Sync {
    fn name(&self) -> &'static str;

    fn used_cores(&self) -> u64;

    /// Run the share of core `ctx.core_idx`
    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats>;
}

fn run_one<K: CoreKernel>(kernel: &K, ctx: &CoreContext<'_>) -> Result<CoreStats> {
    let stats = kernel.run_core(ctx)?;
    trace!(
        kernel = kernel.name(),
        core = ctx.core_idx,
        iterations = stats.iterations,
        bytes = stats.bytes_written,
        "core done"
    );
    Ok(stats)
}

/// Simulated accelerator
#[derive(Debug, Clone, Default)]
pub struct Device {
    hw: HardwareSpec,
}

impl Device {
    pub fn new(hw: HardwareSpec) -> Self {
        Self { hw }
    }

    pub fn hardware(&self) -> &HardwareSpec {
        &self.hw
    }

    /// Execute the plan serialized in `tiling`
    ///
    /// `output` must hold the row-major result. `workspace` must be at least
    /// as large as the block's workspace field.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::Abi`] for a malformed block or unknown key
    /// - [`LayoutError::WorkspaceTooSmall`] for an undersized workspace
    /// - [`LayoutError::InnerNull`] when a transfer leaves its buffers
    #[instrument(skip_all, fields(tiling_bytes = tiling.len()))]
    pub fn launch(
        &self,
        input: &GlobalMemory,
        output: &GlobalMemory,
        workspace: &mut [u8],
        tiling: &[u8],
    ) -> Result<LaunchStats> {
        let block = TilingParameterBlock::from_bytes(tiling)?;
        let key = StrategyKey::decode(block.key)?;
        let params = StrategyParams::decode(key.kind(), &block)?;
        let required = field(block.workspace_bytes, "workspace_bytes")? as usize;
        if workspace.len() < required {
            return Err(LayoutError::WorkspaceTooSmall {
                required,
                actual: workspace.len(),
            });
        }
        if key.kind() == StrategyKind::Empty {
            debug!("empty launch");
            return Ok(LaunchStats::empty());
        }
        let width = field(block.dtype_size, "dtype_size")? as usize;
        if width != key.width() {
            return Err(LayoutError::Abi(format!(
                "key {} carries width {}, block says {width}",
                block.key,
                key.width()
            )));
        }
        let storage_offset = field(block.storage_offset, "storage_offset")?;
        match width {
            1 => self.dispatch::<u8>(&params, storage_offset, input, output),
            2 => self.dispatch::<u16>(&params, storage_offset, input, output),
            4 => self.dispatch::<u32>(&params, storage_offset, input, output),
            8 => self.dispatch::<u64>(&params, storage_offset, input, output),
            other => Err(LayoutError::UnsupportedDataType(other)),
        }
    }

    fn dispatch<T: Element>(
        &self,
        params: &StrategyParams,
        storage_offset: u64,
        input: &GlobalMemory,
        output: &GlobalMemory,
    ) -> Result<LaunchStats> {
        match params {
            StrategyParams::Empty => Ok(LaunchStats::empty()),
            StrategyParams::Direct(p) => {
                let kernel = DirectKernel::<T>::new(p, storage_offset);
                self.run(&kernel, params, input, output)
            }
            StrategyParams::AlignmentAware(p) => {
                let kernel = AlignKernel::<T>::new(p, storage_offset);
                self.run(&kernel, params, input, output)
            }
            StrategyParams::DualCut(p) => {
                let kernel = DualCutKernel::<T>::new(p, storage_offset);
                self.run(&kernel, params, input, output)
            }
            StrategyParams::Gather(p) => {
                let kernel = GatherKernel::<T>::new(p, storage_offset);
                self.run(&kernel, params, input, output)
            }
            StrategyParams::PerElement(p) => {
                let kernel = PerElementKernel::<T>::new(p, storage_offset);
                self.run(&kernel, params, input, output)
            }
            StrategyParams::Broadcast(p) => {
                let kernel = BroadcastKernel::<T>::new(p, storage_offset);
                self.run(&kernel, params, input, output)
            }
        }
    }

    /// Run `kernel` once per used core and collect per-core counters
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Abi`] when the kernel wants more cores than the
    /// device has, or the first error any core reports.
    pub fn run_cores<K: CoreKernel>(
        &self,
        kernel: &K,
        input: &GlobalMemory,
        output: &GlobalMemory,
    ) -> Result<Vec<CoreStats>> {
        let used_cores = kernel.used_cores();
        if used_cores > self.hw.cores as u64 {
            return Err(LayoutError::Abi(format!(
                "{used_cores} cores requested, device has {}",
                self.hw.cores
            )));
        }
        let context = |core_idx| CoreContext {
            core_idx,
            used_cores,
            input,
            output,
            hw: &self.hw,
        };

        #[cfg(feature = "parallel")]
        let per_core = (0..used_cores)
            .into_par_iter()
            .map(|core| run_one(kernel, &context(core)))
            .collect::<Result<Vec<_>>>();

        #[cfg(not(feature = "parallel"))]
        let per_core = (0..used_cores)
            .map(|core| run_one(kernel, &context(core)))
            .collect::<Result<Vec<_>>>();

        per_core
    }

    fn run<K: CoreKernel>(
        &self,
        kernel: &K,
        params: &StrategyParams,
        input: &GlobalMemory,
        output: &GlobalMemory,
    ) -> Result<LaunchStats> {
        let used_cores = kernel.used_cores();
        let per_core = self.run_cores(kernel, input, output)?;
        let stats = per_core.iter().fold(
            LaunchStats {
                strategy: params.kind(),
                used_cores,
                ..LaunchStats::empty()
            },
            |acc, core| LaunchStats {
                iterations: acc.iterations + core.iterations,
                bytes_read: acc.bytes_read + core.bytes_read,
                bytes_written: acc.bytes_written + core.bytes_written,
                ..acc
            },
        );
        debug!(
            kernel = kernel.name(),
            used_cores,
            iterations = stats.iterations,
            bytes = stats.bytes_written,
            "launch complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DataType;
    use crate::shape::ShapeDescriptor;
    use crate::tiling::{PlanRequest, TilingPlanner};

    fn plan_bytes(hw: &HardwareSpec, shape: &[i64], strides: &[i64]) -> Vec<u8> {
        let view = ShapeDescriptor::new(shape, strides, 0).unwrap();
        let input = ShapeDescriptor::contiguous(&[view.storage_len()]).unwrap();
        let request = PlanRequest::new(input, view, DataType::Float32);
        TilingPlanner::new(hw.clone())
            .plan(&request)
            .unwrap()
            .tiling_bytes()
    }

    #[test]
    fn test_workspace_too_small() {
        let hw = HardwareSpec::default().with_system_workspace(64);
        let tiling = plan_bytes(&hw, &[8], &[1]);
        let input = GlobalMemory::from_slice(&[0u32; 8]);
        let output = GlobalMemory::zeroed(32);
        let err = Device::new(hw)
            .launch(&input, &output, &mut [0u8; 16], &tiling)
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::WorkspaceTooSmall {
                required: 64,
                actual: 16
            }
        );
    }

    #[test]
    fn test_malformed_block() {
        let device = Device::new(HardwareSpec::tiny());
        let mem = GlobalMemory::zeroed(4);
        assert!(matches!(
            device.launch(&mem, &mem, &mut [], &[0u8; 12]),
            Err(LayoutError::Abi(_))
        ));
        let mut block = TilingParameterBlock {
            key: 607,
            ..TilingParameterBlock::default()
        };
        let bytes = block.to_bytes();
        assert!(device.launch(&mem, &mem, &mut [], &bytes).is_err());
        block.key = 4;
        block.dtype_size = 2;
        assert!(matches!(
            device.launch(&mem, &mem, &mut [], &block.to_bytes()),
            Err(LayoutError::Abi(_))
        ));
    }

    #[test]
    fn test_stats_cover_output() {
        let hw = HardwareSpec::tiny();
        let tiling = plan_bytes(&hw, &[40, 10], &[1, 40]);
        let input = GlobalMemory::from_slice(&(0..400u32).collect::<Vec<_>>());
        let output = GlobalMemory::zeroed(1600);
        let stats = Device::new(hw)
            .launch(&input, &output, &mut [], &tiling)
            .unwrap();
        assert_eq!(stats.bytes_written, 1600);
        assert!(stats.used_cores >= 1 && stats.used_cores <= 4);
        let out = output.to_typed::<u32>();
        for i in 0..40 {
            for j in 0..10 {
                assert_eq!(out[i * 10 + j], (i + 40 * j) as u32);
            }
        }
    }

    #[test]
    fn test_core_limit_enforced() {
        // broadcast over 1000 elements spreads across 63 cores
        let hw = HardwareSpec::default().with_system_workspace(0);
        let tiling = plan_bytes(&hw, &[1000], &[0]);
        let input = GlobalMemory::from_slice(&[5u32]);
        let output = GlobalMemory::zeroed(4000);
        let err = Device::new(hw.with_cores(8))
            .launch(&input, &output, &mut [], &tiling)
            .unwrap_err();
        assert!(matches!(err, LayoutError::Abi(_)));
    }
}

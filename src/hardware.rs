//! Hardware capacity facts
//!
//! The planner never queries a device; callers describe it with a
//! [`HardwareSpec`]. Defaults describe a 64-core part with 248 KiB of scratch
//! per core.
//!
//! # Examples
//!
//! ```
//! use trueno_strided::HardwareSpec;
//!
//! let hw = HardwareSpec::new().with_cores(8).with_scratch_bytes(16 * 1024);
//! assert_eq!(hw.cores, 8);
//! assert_eq!(hw.slot_capacity(4), 2048);
//! ```

use serde::{Deserialize, Serialize};

use crate::device::element::VECTOR_BYTES;

/// Scratch bytes per core on the reference part
pub const DEFAULT_SCRATCH_BYTES: usize = 253_952;
/// System workspace the runtime reserves per launch
pub const DEFAULT_SYSTEM_WORKSPACE: usize = 16 * 1024 * 1024;

/// Capacity description of the target device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSpec {
    /// Compute cores available to one launch
    pub cores: usize,
    /// Scratch memory per core, in bytes
    pub scratch_bytes: usize,
    /// Minimum transfer granularity, in bytes; scratch rows pad to it
    pub granularity: usize,
    /// Vector register width, in bytes; sets the gather lane count
    pub vector_bytes: usize,
    /// Lightweight threads per core for the per-element strategy
    pub simt_threads: usize,
    /// Scratch slots per queue (2 = double buffering)
    pub buffer_num: usize,
    /// Workspace the launch must be given, in bytes
    pub system_workspace: usize,
}

impl Default for HardwareSpec {
    fn default() -> Self {
        Self {
            cores: 64,
            scratch_bytes: DEFAULT_SCRATCH_BYTES,
            granularity: 32,
            vector_bytes: VECTOR_BYTES,
            simt_threads: 512,
            buffer_num: 2,
            system_workspace: DEFAULT_SYSTEM_WORKSPACE,
        }
    }
}

impl HardwareSpec {
    /// Default 64-core description
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset matching the reference accelerator
    pub fn ascend_like() -> Self {
        Self::default()
    }

    /// Small device used to force multi-iteration tilings on small tensors
    ///
    /// Four cores, 1 KiB scratch and no system workspace.
    pub fn tiny() -> Self {
        Self {
            cores: 4,
            scratch_bytes: 1024,
            simt_threads: 8,
            system_workspace: 0,
            ..Self::default()
        }
    }

    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    pub fn with_scratch_bytes(mut self, bytes: usize) -> Self {
        self.scratch_bytes = bytes;
        self
    }

    pub fn with_granularity(mut self, bytes: usize) -> Self {
        self.granularity = bytes;
        self
    }

    pub fn with_vector_bytes(mut self, bytes: usize) -> Self {
        self.vector_bytes = bytes;
        self
    }

    pub fn with_simt_threads(mut self, threads: usize) -> Self {
        self.simt_threads = threads;
        self
    }

    /// Set scratch slots per queue (clamped to at least 1)
    pub fn with_buffer_num(mut self, slots: usize) -> Self {
        self.buffer_num = slots.max(1);
        self
    }

    pub fn with_system_workspace(mut self, bytes: usize) -> Self {
        self.system_workspace = bytes;
        self
    }

    /// Elements of `width` bytes one scratch slot holds
    pub fn slot_capacity(&self, width: usize) -> u64 {
        (self.scratch_bytes / self.buffer_num.max(1) / width.max(1)) as u64
    }

    /// Elements of `width` bytes per transfer granule
    pub fn block_elems(&self, width: usize) -> u64 {
        (self.granularity / width.max(1)).max(1) as u64
    }

    /// Round `bytes` up to the transfer granularity
    pub fn align_up(&self, bytes: u64) -> u64 {
        let g = self.granularity.max(1) as u64;
        bytes.div_ceil(g) * g
    }
}

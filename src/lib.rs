//! Trueno Strided: as-strided layout engine for many-core vector accelerators
//!
//! **trueno-strided** moves tensor elements from arbitrary shape/stride/offset
//! views into dense row-major output. A host-side planner picks one of several
//! copy strategies and serializes its decisions into a flat parameter block;
//! an emulated device decodes the block and runs one kernel instance per core.
//!
//! # Strategies
//!
//! - **Direct**: strided block copy, one descriptor per iteration
//! - **Alignment-aware**: block copy through granule-padded scratch rows
//! - **Dual cut**: two axes tiled at once, for transposes with short strides
//! - **Gather**: bulk-load the source window, gather through an index buffer
//! - **Per-element**: one lightweight thread per output element
//! - **Broadcast**: every stride zero, replicate a single element
//!
//! # Quick Start
//!
//! ```rust
//! use trueno_strided::{as_strided, DataType, HardwareSpec, ShapeDescriptor};
//!
//! let data: Vec<u32> = (0..6).collect();
//! let input = ShapeDescriptor::contiguous(&[2, 3]).unwrap();
//! let transposed = ShapeDescriptor::new(&[3, 2], &[1, 3], 0).unwrap();
//!
//! let bytes = as_strided(
//!     bytemuck::cast_slice(&data),
//!     &input,
//!     &transposed,
//!     DataType::UInt32,
//!     &HardwareSpec::default(),
//! )
//! .unwrap();
//! let out: Vec<u32> = bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect();
//! assert_eq!(out, vec![0, 3, 1, 4, 2, 5]);
//! ```
//!
//! # Planning and launching separately
//!
//! ```rust
//! use trueno_strided::device::{Device, GlobalMemory};
//! use trueno_strided::tiling::{PlanRequest, StrategyKind, TilingPlanner};
//! use trueno_strided::{DataType, HardwareSpec, ShapeDescriptor};
//!
//! let hw = HardwareSpec::tiny();
//! let input = ShapeDescriptor::contiguous(&[1]).unwrap();
//! let view = ShapeDescriptor::new(&[100], &[0], 0).unwrap();
//! let plan = TilingPlanner::new(hw.clone())
//!     .plan(&PlanRequest::new(input, view, DataType::Int16))
//!     .unwrap();
//! assert_eq!(plan.kind(), StrategyKind::Broadcast);
//!
//! let src = GlobalMemory::from_slice(&[7u16]);
//! let dst = GlobalMemory::zeroed(plan.output_bytes());
//! let stats = Device::new(hw).launch(&src, &dst, &mut [], &plan.tiling_bytes()).unwrap();
//! assert_eq!(stats.bytes_written, 200);
//! assert!(dst.to_typed::<u16>().iter().all(|&v| v == 7));
//! ```

pub mod concat;
pub mod device;
pub mod dtype;
pub mod error;
pub mod hardware;
pub mod kernels;
pub mod op;
pub mod shape;
pub mod tiling;

pub use concat::{concat, ConcatInput, ConcatOutput};
pub use device::{Device, GlobalMemory, LaunchStats};
pub use dtype::DataType;
pub use error::{LayoutError, Result};
pub use hardware::HardwareSpec;
pub use op::{as_strided, contiguous, execute, StridedOutput};
pub use shape::{ShapeDescriptor, MAX_RANK};
pub use tiling::{ExecutionPlan, PlanRequest, StrategyKey, StrategyKind, TilingPlanner};

//! Simulated accelerator
//!
//! Global memory, per-core scratch slots, block transfers and the launcher
//! that runs one kernel instance per core.

pub mod dma;
pub mod element;
pub mod launch;
pub mod magic;
pub mod memory;
pub mod queue;

pub use dma::{NdDma, RowCopy};
pub use element::{Element, IndexLane, VECTOR_BYTES};
pub use launch::{CoreContext, CoreKernel, CoreStats, Device, LaunchStats};
pub use magic::{DefaultDivisor, Divisor, FastDivisor, PlainDivisor};
pub use memory::GlobalMemory;
pub use queue::{pipeline, DrainSlot, FillSlot, SlotQueue};

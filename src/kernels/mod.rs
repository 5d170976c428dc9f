//! Device programs, one per strategy
//!
//! Each kernel borrows its decoded parameters and implements
//! [`CoreKernel`](crate::device::CoreKernel) generically over the element
//! storage type.

mod align;
mod broadcast;
mod direct;
mod dual_cut;
pub mod gather;
mod simt;

pub use align::AlignKernel;
pub use broadcast::BroadcastKernel;
pub use direct::DirectKernel;
pub use dual_cut::DualCutKernel;
pub use gather::GatherKernel;
pub use simt::PerElementKernel;

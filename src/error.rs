//! Error types for strided layout planning and execution

use thiserror::Error;

/// Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors that can occur while planning or executing a layout transform
///
/// Planning errors (`InvalidShape` through `InvalidTiling`) are raised before any
/// core is dispatched. `InnerNull` and `SlotExhausted` come from device code and
/// abort the whole launch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// Shape metadata is malformed
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Rank exceeds what the descriptor can carry
    #[error("Rank {rank} exceeds maximum {max}")]
    RankTooLarge {
        /// Requested rank
        rank: usize,
        /// Supported maximum
        max: usize,
    },

    /// Extent, stride or offset is negative
    #[error("Negative {what}: {value}")]
    NegativeValue {
        /// Which quantity was negative
        what: &'static str,
        /// Offending value
        value: i64,
    },

    /// The view reads past the end of the input storage
    #[error("View out of input range: needs {required} elements, input has {available}")]
    OutOfRange {
        /// `storage_offset + span` of the view
        required: u64,
        /// Elements backing the input
        available: u64,
    },

    /// A 32-bit intermediate would overflow
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Element width has no kernel specialization
    #[error("Unsupported data type width: {0} bytes")]
    UnsupportedDataType(usize),

    /// Scratch budget cannot hold one minimal transfer
    #[error("No feasible tiling: {0}")]
    NoFeasibleTiling(String),

    /// Tiling parameters are inconsistent or the forced strategy cannot run
    #[error("Invalid tiling: {0}")]
    InvalidTiling(String),

    /// Serialized parameter block has the wrong size or key
    #[error("Parameter block ABI mismatch: {0}")]
    Abi(String),

    /// Workspace handed to the launch is smaller than the plan requires
    #[error("Workspace too small: required {required} bytes, got {actual}")]
    WorkspaceTooSmall {
        /// Bytes the plan asked for
        required: usize,
        /// Bytes provided
        actual: usize,
    },

    /// A block-transfer primitive rejected its parameters
    #[error("Inner null in {0}")]
    InnerNull(String),

    /// Scratch slot acquired while none was free
    #[error("No free scratch slot (capacity {0})")]
    SlotExhausted(usize),
}

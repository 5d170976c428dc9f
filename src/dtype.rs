//! Element data types and their storage widths

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// Tensor element type accepted by the layout operators
///
/// Layout transforms never look at element values, only at their width, so
/// every type maps onto one of four storage classes (1, 2, 4 or 8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    UInt64,
    Complex64,
    Float32,
    Int32,
    UInt32,
    Complex32,
    Float16,
    BFloat16,
    Int16,
    UInt16,
    UInt8,
    Int8,
    Bool,
    HiFloat8,
    Float8E5M2,
    Float8E4M3Fn,
}

impl DataType {
    /// Storage width in bytes
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Int64 | Self::UInt64 | Self::Complex64 => 8,
            Self::Float32 | Self::Int32 | Self::UInt32 | Self::Complex32 => 4,
            Self::Float16 | Self::BFloat16 | Self::Int16 | Self::UInt16 => 2,
            Self::UInt8
            | Self::Int8
            | Self::Bool
            | Self::HiFloat8
            | Self::Float8E5M2
            | Self::Float8E4M3Fn => 1,
        }
    }

    /// Representative type for a raw width, used when only the byte size is known
    pub fn from_width(width: usize) -> Result<Self> {
        match width {
            1 => Ok(Self::UInt8),
            2 => Ok(Self::UInt16),
            4 => Ok(Self::UInt32),
            8 => Ok(Self::UInt64),
            other => Err(LayoutError::UnsupportedDataType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_classes() {
        assert_eq!(DataType::Complex64.size(), 8);
        assert_eq!(DataType::Complex32.size(), 4);
        assert_eq!(DataType::BFloat16.size(), 2);
        assert_eq!(DataType::Float8E4M3Fn.size(), 1);
        assert_eq!(DataType::Bool.size(), 1);
    }

    #[test]
    fn test_from_width() {
        assert_eq!(DataType::from_width(4).unwrap().size(), 4);
        assert_eq!(
            DataType::from_width(3),
            Err(LayoutError::UnsupportedDataType(3))
        );
    }
}

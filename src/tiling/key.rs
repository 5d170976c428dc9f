//! Strategy selector key
//!
//! The device dispatches on a single integer. Its ones digit is the element
//! width class (1/2/4/8) and its hundreds digit the strategy family; the empty
//! tensor uses 0.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// Execution strategy family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Zero-element tensor, nothing to do
    Empty,
    /// 5-level strided DMA per iteration
    Direct,
    /// Direct copy with padded, granule-aligned scratch rows
    AlignmentAware,
    /// Two independently tiled axes per iteration
    DualCut,
    /// Lane-parallel index buffer + vector gather
    Gather,
    /// One lightweight thread per output element
    PerElement,
    /// Every source stride is zero
    Broadcast,
}

impl StrategyKind {
    const fn family(self) -> i64 {
        match self {
            Self::Empty | Self::Direct => 0,
            Self::AlignmentAware => 100,
            Self::DualCut => 200,
            Self::Gather => 300,
            Self::PerElement => 400,
            Self::Broadcast => 500,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Direct => "direct",
            Self::AlignmentAware => "alignment-aware",
            Self::DualCut => "dual-cut",
            Self::Gather => "gather",
            Self::PerElement => "per-element",
            Self::Broadcast => "broadcast",
        }
    }
}

/// Strategy kind plus element width, encoded as one integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyKey {
    kind: StrategyKind,
    width: usize,
}

impl StrategyKey {
    /// The empty-tensor key
    pub const EMPTY: Self = Self {
        kind: StrategyKind::Empty,
        width: 0,
    };

    /// Key for `kind` over `width`-byte elements
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnsupportedDataType`] for widths other than 1, 2, 4, 8.
    pub fn new(kind: StrategyKind, width: usize) -> Result<Self> {
        if kind == StrategyKind::Empty {
            return Ok(Self::EMPTY);
        }
        match width {
            1 | 2 | 4 | 8 => Ok(Self { kind, width }),
            other => Err(LayoutError::UnsupportedDataType(other)),
        }
    }

    pub fn kind(self) -> StrategyKind {
        self.kind
    }

    pub fn width(self) -> usize {
        self.width
    }

    /// Integer form carried in the parameter block
    ///
    /// ```
    /// use trueno_strided::tiling::{StrategyKey, StrategyKind};
    ///
    /// let key = StrategyKey::new(StrategyKind::DualCut, 4).unwrap();
    /// assert_eq!(key.encode(), 204);
    /// assert_eq!(StrategyKey::decode(204).unwrap(), key);
    /// ```
    pub fn encode(self) -> i64 {
        self.kind.family() + self.width as i64
    }

    /// Parse the integer form
    pub fn decode(raw: i64) -> Result<Self> {
        if raw == 0 {
            return Ok(Self::EMPTY);
        }
        let width = usize::try_from(raw.rem_euclid(100))
            .map_err(|_| LayoutError::Abi(format!("bad key {raw}")))?;
        let kind = match raw - raw.rem_euclid(100) {
            0 => StrategyKind::Direct,
            100 => StrategyKind::AlignmentAware,
            200 => StrategyKind::DualCut,
            300 => StrategyKind::Gather,
            400 => StrategyKind::PerElement,
            500 => StrategyKind::Broadcast,
            _ => return Err(LayoutError::Abi(format!("unknown strategy key {raw}"))),
        };
        Self::new(kind, width).map_err(|_| LayoutError::Abi(format!("bad width in key {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_key_is_width() {
        for w in [1, 2, 4, 8] {
            let key = StrategyKey::new(StrategyKind::Direct, w).unwrap();
            assert_eq!(key.encode(), w as i64);
        }
    }

    #[test]
    fn test_every_kind_decodes() {
        let kinds = [
            StrategyKind::Direct,
            StrategyKind::AlignmentAware,
            StrategyKind::DualCut,
            StrategyKind::Gather,
            StrategyKind::PerElement,
            StrategyKind::Broadcast,
        ];
        for kind in kinds {
            let key = StrategyKey::new(kind, 2).unwrap();
            assert_eq!(StrategyKey::decode(key.encode()).unwrap().kind(), kind);
        }
    }

    #[test]
    fn test_empty_key() {
        assert_eq!(StrategyKey::EMPTY.encode(), 0);
        assert_eq!(
            StrategyKey::new(StrategyKind::Empty, 4).unwrap(),
            StrategyKey::EMPTY
        );
        assert_eq!(StrategyKey::decode(0).unwrap().kind(), StrategyKind::Empty);
    }

    #[test]
    fn test_invalid_keys() {
        assert!(StrategyKey::decode(103).is_err());
        assert!(StrategyKey::decode(600 + 4).is_err());
        assert!(StrategyKey::decode(-4).is_err());
        assert_eq!(
            StrategyKey::new(StrategyKind::Gather, 16),
            Err(LayoutError::UnsupportedDataType(16))
        );
    }
}

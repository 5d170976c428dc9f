//! Shape/stride/offset descriptors
//!
//! A [`ShapeDescriptor`] is the leaf data model of the crate: an ordered list of
//! `(extent, stride)` pairs plus a storage offset, all in elements. It is built
//! once per invocation and never mutated; normalization returns a new value.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// Maximum rank carried by a descriptor
pub const MAX_RANK: usize = 10;

/// Normalized shape/stride/offset triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    extents: Vec<u64>,
    strides: Vec<u64>,
    offset: u64,
}

impl ShapeDescriptor {
    /// Build a descriptor from caller-provided signed metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the lengths differ, the rank exceeds [`MAX_RANK`],
    /// or any value is negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use trueno_strided::ShapeDescriptor;
    ///
    /// let view = ShapeDescriptor::new(&[4, 3, 2], &[1, 4, 12], 0).unwrap();
    /// assert_eq!(view.numel(), 24);
    /// assert_eq!(view.span(), 24);
    /// ```
    pub fn new(extents: &[i64], strides: &[i64], offset: i64) -> Result<Self> {
        if extents.len() != strides.len() {
            return Err(LayoutError::InvalidShape(format!(
                "{} extents but {} strides",
                extents.len(),
                strides.len()
            )));
        }
        let extents = to_unsigned(extents, "extent")?;
        let strides = to_unsigned(strides, "stride")?;
        let offset = u64::try_from(offset).map_err(|_| LayoutError::NegativeValue {
            what: "storage offset",
            value: offset,
        })?;
        Self::from_parts(extents, strides, offset)
    }

    /// Build a descriptor from unsigned parts
    pub fn from_parts(extents: Vec<u64>, strides: Vec<u64>, offset: u64) -> Result<Self> {
        if extents.len() != strides.len() {
            return Err(LayoutError::InvalidShape(format!(
                "{} extents but {} strides",
                extents.len(),
                strides.len()
            )));
        }
        if extents.len() > MAX_RANK {
            return Err(LayoutError::RankTooLarge {
                rank: extents.len(),
                max: MAX_RANK,
            });
        }
        Ok(Self {
            extents,
            strides,
            offset,
        })
    }

    /// Row-major descriptor with zero offset
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::RankTooLarge`] above [`MAX_RANK`].
    pub fn contiguous(extents: &[u64]) -> Result<Self> {
        Self::from_parts(extents.to_vec(), row_major_strides(extents), 0)
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[u64] {
        &self.extents
    }

    pub fn strides(&self) -> &[u64] {
        &self.strides
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total element count (1 for rank 0)
    pub fn numel(&self) -> u64 {
        self.extents
            .iter()
            .fold(1u64, |acc, &e| acc.saturating_mul(e))
    }

    /// True when any extent is zero
    pub fn is_empty(&self) -> bool {
        self.extents.iter().any(|&e| e == 0)
    }

    /// True when every axis with more than one element has stride 0
    pub fn all_strides_zero(&self) -> bool {
        self.extents
            .iter()
            .zip(&self.strides)
            .all(|(&e, &s)| e <= 1 || s == 0)
    }

    /// Elements of backing storage touched, `1 + Σ (extent-1)·stride`
    ///
    /// Excludes the storage offset; zero for an empty descriptor.
    pub fn span(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.extents
            .iter()
            .zip(&self.strides)
            .fold(1u64, |acc, (&e, &s)| {
                acc.saturating_add((e - 1).saturating_mul(s))
            })
    }

    /// Storage elements required to back this view, offset included
    pub fn storage_len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.offset.saturating_add(self.span())
        }
    }

    /// True when strides equal the row-major strides of the extents
    pub fn is_row_major(&self) -> bool {
        self.normalized().strides == [1]
    }

    /// Source offset (relative to the storage offset) of the `linear`-th
    /// element in row-major order
    pub fn offset_of(&self, mut linear: u64) -> u64 {
        let mut offset = 0;
        for (&e, &s) in self.extents.iter().zip(&self.strides).rev() {
            if e == 0 {
                return 0;
            }
            offset += (linear % e) * s;
            linear /= e;
        }
        offset
    }

    /// Drop unit axes and merge axes that are contiguous with their right neighbour
    ///
    /// Element order (row-major over the view) is preserved, so the output
    /// layout of a transform is unchanged by normalization. A descriptor that
    /// normalizes to nothing becomes the single axis `[1]` with stride 1.
    ///
    /// ```
    /// use trueno_strided::ShapeDescriptor;
    ///
    /// let view = ShapeDescriptor::new(&[2, 1, 3, 4], &[12, 99, 4, 1], 5).unwrap();
    /// let merged = view.normalized();
    /// assert_eq!(merged.extents(), &[24]);
    /// assert_eq!(merged.strides(), &[1]);
    /// assert_eq!(merged.offset(), 5);
    /// ```
    #[must_use]
    pub fn normalized(&self) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        let mut extents: Vec<u64> = Vec::with_capacity(self.rank());
        let mut strides: Vec<u64> = Vec::with_capacity(self.rank());
        for (&e, &s) in self.extents.iter().zip(&self.strides) {
            if e == 1 {
                continue;
            }
            match (extents.last_mut(), strides.last_mut()) {
                (Some(prev_e), Some(prev_s)) if *prev_s == e * s => {
                    *prev_e *= e;
                    *prev_s = s;
                }
                _ => {
                    extents.push(e);
                    strides.push(s);
                }
            }
        }
        if extents.is_empty() {
            extents.push(1);
            strides.push(1);
        }
        Self {
            extents,
            strides,
            offset: self.offset,
        }
    }
}

/// Row-major strides for `extents`
pub fn row_major_strides(extents: &[u64]) -> Vec<u64> {
    let mut strides = vec![1u64; extents.len()];
    for i in (0..extents.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * extents[i + 1].max(1);
    }
    strides
}

fn to_unsigned(values: &[i64], what: &'static str) -> Result<Vec<u64>> {
    values
        .iter()
        .map(|&v| u64::try_from(v).map_err(|_| LayoutError::NegativeValue { what, value: v }))
        .collect()
}

//! Device global memory
//!
//! Every core of a launch shares one input and one output region and writes
//! disjoint slices of the output concurrently. The region is built from
//! atomic bytes so it can be shared across rayon workers without `unsafe`;
//! relaxed ordering is enough because the launch joins all cores before the
//! host reads results back.

use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use bytemuck::Pod;

use crate::error::{LayoutError, Result};

/// Byte-addressed memory shared by all cores of a launch
#[derive(Debug)]
pub struct GlobalMemory {
    bytes: Box<[AtomicU8]>,
    audit: Option<Mutex<Vec<Range<usize>>>>,
}

impl GlobalMemory {
    /// `len` zero bytes
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: (0..len).map(|_| AtomicU8::new(0)).collect(),
            audit: None,
        }
    }

    /// Copy of `bytes`
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().map(|&b| AtomicU8::new(b)).collect(),
            audit: None,
        }
    }

    /// Copy of a typed slice
    #[must_use]
    pub fn from_slice<T: Pod>(values: &[T]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(values))
    }

    /// Record every written byte range for later inspection
    #[must_use]
    pub fn with_audit(mut self) -> Self {
        self.audit = Some(Mutex::new(Vec::new()));
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn range(&self, offset: usize, len: usize) -> Result<Range<usize>> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len());
        end.map(|end| offset..end).ok_or_else(|| {
            LayoutError::InnerNull(format!(
                "global access {offset}+{len} beyond {} bytes",
                self.bytes.len()
            ))
        })
    }

    /// Read `dst.len()` bytes starting at byte `offset`
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let range = self.range(offset, dst.len())?;
        for (d, s) in dst.iter_mut().zip(&self.bytes[range]) {
            *d = s.load(Ordering::Relaxed);
        }
        Ok(())
    }

    /// Write `src` starting at byte `offset`
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<()> {
        let range = self.range(offset, src.len())?;
        for (d, &s) in self.bytes[range.clone()].iter().zip(src) {
            d.store(s, Ordering::Relaxed);
        }
        if let Some(audit) = &self.audit {
            audit
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(range);
        }
        Ok(())
    }

    /// Read `dst.len()` elements starting at element index `elem`
    pub fn read_elems<T: Pod>(&self, elem: u64, dst: &mut [T]) -> Result<()> {
        let width = std::mem::size_of::<T>();
        self.read_bytes(byte_offset(elem, width)?, bytemuck::cast_slice_mut(dst))
    }

    /// Write `src` starting at element index `elem`
    pub fn write_elems<T: Pod>(&self, elem: u64, src: &[T]) -> Result<()> {
        let width = std::mem::size_of::<T>();
        self.write_bytes(byte_offset(elem, width)?, bytemuck::cast_slice(src))
    }

    /// Read a single element
    pub fn read<T: Pod>(&self, elem: u64) -> Result<T> {
        let mut value = [<T as bytemuck::Zeroable>::zeroed()];
        self.read_elems(elem, &mut value)?;
        Ok(value[0])
    }

    /// Write a single element
    pub fn write<T: Pod>(&self, elem: u64, value: T) -> Result<()> {
        self.write_elems(elem, &[value])
    }

    /// Snapshot of the contents
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    /// Snapshot of the contents as `T` (trailing partial element dropped)
    pub fn to_typed<T: Pod>(&self) -> Vec<T> {
        let width = std::mem::size_of::<T>();
        let bytes = self.to_vec();
        bytes
            .chunks_exact(width)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// Written byte ranges in write order, if auditing is on
    pub fn audit_log(&self) -> Option<Vec<Range<usize>>> {
        self.audit
            .as_ref()
            .map(|audit| audit.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

fn byte_offset(elem: u64, width: usize) -> Result<usize> {
    usize::try_from(elem)
        .ok()
        .and_then(|e| e.checked_mul(width))
        .ok_or_else(|| LayoutError::Overflow(format!("element offset {elem}")))
}

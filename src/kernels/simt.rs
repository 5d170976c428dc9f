//! One lightweight thread per output element
//!
//! Each core owns a contiguous range of output indices and runs
//! `hw.simt_threads` threads over it, thread `t` taking every element
//! congruent to `t`. A thread turns its linear output index into a source
//! offset by dividing through the row-major sizes of the view; the divisions
//! use precomputed [`Divisor`]s and the loop is unrolled per rank.

use std::marker::PhantomData;

use crate::device::element::Element;
use crate::device::launch::{CoreContext, CoreKernel, CoreStats};
use crate::device::magic::{DefaultDivisor, Divisor};
use crate::error::{LayoutError, Result};
use crate::shape::row_major_strides;
use crate::tiling::PerElementParams;

pub struct PerElementKernel<'p, T> {
    params: &'p PerElementParams,
    storage_offset: u64,
    _elem: PhantomData<T>,
}

impl<'p, T: Element> PerElementKernel<'p, T> {
    pub fn new(params: &'p PerElementParams, storage_offset: u64) -> Self {
        Self {
            params,
            storage_offset,
            _elem: PhantomData,
        }
    }

    fn run_rank<const R: usize>(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        let extents = self.params.extents();
        let sizes = row_major_strides(extents);
        let mut divisors = [DefaultDivisor::new(1); R];
        let mut strides = [0u64; R];
        for k in 0..R {
            divisors[k] = DefaultDivisor::new(to_u32(sizes[k])?);
            strides[k] = self.params.strides[k];
        }

        let split = &self.params.split;
        let first = split.start_of(ctx.core_idx);
        let end = first + split.len_of(ctx.core_idx);
        let threads = ctx.hw.simt_threads.max(1);
        let mut stats = CoreStats::default();
        for thread in 0..threads as u64 {
            for linear in (first + thread..end).step_by(threads) {
                let mut rem = to_u32(linear)?;
                let mut offset = 0u64;
                for k in 0..R {
                    let (q, r) = divisors[k].div_rem(rem);
                    offset += u64::from(q) * strides[k];
                    rem = r;
                }
                let value: T = ctx.input.read(self.storage_offset + offset)?;
                ctx.output.write(linear, value)?;
                stats.bytes_read += T::WIDTH as u64;
                stats.bytes_written += T::WIDTH as u64;
            }
        }
        stats.iterations = end - first;
        Ok(stats)
    }
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| LayoutError::Overflow(format!("{value} exceeds u32")))
}

impl<T: Element> CoreKernel for PerElementKernel<'_, T> {
    fn name(&self) -> &'static str {
        "per-element"
    }

    fn used_cores(&self) -> u64 {
        self.params.split.used
    }

    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        match self.params.rank {
            1 => self.run_rank::<1>(ctx),
            2 => self.run_rank::<2>(ctx),
            3 => self.run_rank::<3>(ctx),
            4 => self.run_rank::<4>(ctx),
            5 => self.run_rank::<5>(ctx),
            6 => self.run_rank::<6>(ctx),
            7 => self.run_rank::<7>(ctx),
            8 => self.run_rank::<8>(ctx),
            rank => Err(LayoutError::Abi(format!("no rank-{rank} per-element kernel"))),
        }
    }
}

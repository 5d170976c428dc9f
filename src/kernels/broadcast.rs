//! Replicate one source element across the output
//!
//! A core reads the element once, fills a single slot with copies and
//! stores that slot over its output range in chunks of at most `ub_factor`.

use std::marker::PhantomData;

use crate::device::dma::RowCopy;
use crate::device::element::Element;
use crate::device::launch::{CoreContext, CoreKernel, CoreStats};
use crate::device::queue::SlotQueue;
use crate::error::Result;
use crate::tiling::BroadcastParams;

pub struct BroadcastKernel<'p, T> {
    params: &'p BroadcastParams,
    storage_offset: u64,
    _elem: PhantomData<T>,
}

impl<'p, T: Element> BroadcastKernel<'p, T> {
    pub fn new(params: &'p BroadcastParams, storage_offset: u64) -> Self {
        Self {
            params,
            storage_offset,
            _elem: PhantomData,
        }
    }
}

impl<T: Element> CoreKernel for BroadcastKernel<'_, T> {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn used_cores(&self) -> u64 {
        self.params.split.used
    }

    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        let chunk = self.params.ub_factor;
        let slot_len = ctx.check_slot(chunk, T::WIDTH)?;
        let queue: SlotQueue<T> = SlotQueue::new(1, slot_len);

        let value: T = ctx.input.read(self.storage_offset)?;
        let mut slot = queue.alloc()?;
        slot.fill(value);
        slot.enque();
        let filled = queue.deque()?;

        let split = &self.params.split;
        let first = split.start_of(ctx.core_idx);
        let end = first + split.len_of(ctx.core_idx);
        let mut stats = CoreStats {
            bytes_read: T::WIDTH as u64,
            ..CoreStats::default()
        };
        for start in (first..end).step_by(chunk as usize) {
            let elems = chunk.min(end - start);
            let moved = RowCopy::contiguous(elems).copy_out(&filled, 0, ctx.output, start)?;
            stats.bytes_written += moved * T::WIDTH as u64;
            stats.iterations += 1;
        }
        Ok(stats)
    }
}

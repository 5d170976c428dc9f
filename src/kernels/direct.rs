//! Plain block copy
//!
//! Each core takes a contiguous range of iterations. An iteration issues the
//! single-cut descriptor into a slot and writes the dense slot back as one
//! contiguous run; the slot ring overlaps the next load with the store.

use std::marker::PhantomData;

use crate::device::dma::RowCopy;
use crate::device::element::Element;
use crate::device::launch::{CoreContext, CoreKernel, CoreStats};
use crate::device::queue::{pipeline, SlotQueue};
use crate::error::Result;
use crate::tiling::DirectParams;

pub struct DirectKernel<'p, T> {
    params: &'p DirectParams,
    storage_offset: u64,
    _elem: PhantomData<T>,
}

impl<'p, T: Element> DirectKernel<'p, T> {
    pub fn new(params: &'p DirectParams, storage_offset: u64) -> Self {
        Self {
            params,
            storage_offset,
            _elem: PhantomData,
        }
    }
}

impl<T: Element> CoreKernel for DirectKernel<'_, T> {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn used_cores(&self) -> u64 {
        self.params.split.used
    }

    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        let cut = &self.params.cut;
        let split = &self.params.split;
        let slot_len = ctx.check_slot(cut.main.dst_extent(), T::WIDTH)?;
        let queue: SlotQueue<T> = SlotQueue::new(ctx.hw.buffer_num, slot_len);

        let first = split.start_of(ctx.core_idx);
        let iterations = first..first + split.len_of(ctx.core_idx);
        let mut stats = CoreStats::default();
        pipeline(
            &queue,
            iterations,
            |&g, slot| {
                let (desc, _) = cut.transfer(g);
                desc.copy_in(ctx.input, self.storage_offset + cut.src_offset(g), slot)?;
                Ok(())
            },
            |&g, slot| {
                let (_, elems) = cut.transfer(g);
                RowCopy::contiguous(elems).copy_out(slot, 0, ctx.output, cut.dst_offset(g))?;
                stats.record(elems, T::WIDTH);
                Ok(())
            },
        )?;
        Ok(stats)
    }
}

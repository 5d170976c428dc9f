//! Block copy through granule-padded scratch rows
//!
//! Iterations are dealt round-robin: core `c` runs `c, c + used, c + 2·used`
//! and so on. Rows land in scratch at a padded pitch; when the pitch differs
//! from the row length the copy-out strips the padding row by row.

use std::marker::PhantomData;

use crate::device::dma::RowCopy;
use crate::device::element::Element;
use crate::device::launch::{CoreContext, CoreKernel, CoreStats};
use crate::device::queue::{pipeline, SlotQueue};
use crate::error::Result;
use crate::tiling::{AlignParams, DMA_LEVELS};

pub struct AlignKernel<'p, T> {
    params: &'p AlignParams,
    storage_offset: u64,
    _elem: PhantomData<T>,
}

impl<'p, T: Element> AlignKernel<'p, T> {
    pub fn new(params: &'p AlignParams, storage_offset: u64) -> Self {
        Self {
            params,
            storage_offset,
            _elem: PhantomData,
        }
    }

    fn copy_out_rows(&self, ctx: &CoreContext<'_>, g: u64, slot: &[T]) -> Result<u64> {
        let cut = &self.params.cut;
        let (desc, elems) = cut.transfer(g);
        let dst = cut.dst_offset(g);
        if !self.params.en_32b_aligned {
            return RowCopy::contiguous(elems).copy_out(slot, 0, ctx.output, dst);
        }
        let row_len = desc.loops[DMA_LEVELS - 1];
        let rows = elems / row_len.max(1);
        let padded = self.params.padded_row;
        let rows_out = RowCopy {
            block_count: rows,
            block_len: row_len,
            src_pitch: if rows == 1 { row_len } else { padded },
            dst_pitch: row_len,
        };
        rows_out.copy_out(slot, 0, ctx.output, dst)
    }
}

impl<T: Element> CoreKernel for AlignKernel<'_, T> {
    fn name(&self) -> &'static str {
        "alignment-aware"
    }

    fn used_cores(&self) -> u64 {
        self.params.used_cores
    }

    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        let cut = &self.params.cut;
        let slot_len = ctx.check_slot(cut.main.dst_extent(), T::WIDTH)?;
        let queue: SlotQueue<T> = SlotQueue::new(ctx.hw.buffer_num, slot_len);

        let core = ctx.core_idx;
        let used = self.params.used_cores;
        let iterations = (0..self.params.loops_of(core)).map(|lp| lp * used + core);
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
                let elems = self.copy_out_rows(ctx, g, slot)?;
                stats.record(elems, T::WIDTH);
                Ok(())
            },
        )?;
        Ok(stats)
    }
}

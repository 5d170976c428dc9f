//! Two-axis tiled copy
//!
//! A scratch tile covers a chunk of each cut axis plus every axis kept
//! whole. Copy-in reads the tile in output order with padded rows; copy-out
//! writes it back one row block per combination of the three outer
//! descriptor levels.

use std::marker::PhantomData;

use crate::device::dma::{NdDma, RowCopy};
use crate::device::element::Element;
use crate::device::launch::{CoreContext, CoreKernel, CoreStats};
use crate::device::queue::{pipeline, SlotQueue};
use crate::error::Result;
use crate::tiling::{DualCutPlan, DualCutStep};

pub struct DualCutKernel<'p, T> {
    plan: &'p DualCutPlan,
    storage_offset: u64,
    _elem: PhantomData<T>,
}

impl<'p, T: Element> DualCutKernel<'p, T> {
    pub fn new(plan: &'p DualCutPlan, storage_offset: u64) -> Self {
        Self {
            plan,
            storage_offset,
            _elem: PhantomData,
        }
    }

    fn copy_out(
        &self,
        ctx: &CoreContext<'_>,
        step: &DualCutStep,
        desc: &NdDma,
        slot: &[T],
    ) -> Result<u64> {
        let out = &self.plan.ub_out_strides;
        let ub = &desc.dst_strides;
        let rows = RowCopy {
            block_count: desc.loops[3],
            block_len: desc.loops[4],
            src_pitch: ub[3],
            dst_pitch: out[3],
        };
        let mut moved = 0;
        for i0 in 0..desc.loops[0] {
            for i1 in 0..desc.loops[1] {
                for i2 in 0..desc.loops[2] {
                    let ub_base = i0 * ub[0] + i1 * ub[1] + i2 * ub[2];
                    let dst = step.dst_offset + i0 * out[0] + i1 * out[1] + i2 * out[2];
                    moved += rows.copy_out(slot, ub_base as usize, ctx.output, dst)?;
                }
            }
        }
        Ok(moved)
    }
}

impl<T: Element> CoreKernel for DualCutKernel<'_, T> {
    fn name(&self) -> &'static str {
        "dual-cut"
    }

    fn used_cores(&self) -> u64 {
        self.plan.split.used
    }

    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        let slot_len = ctx.check_slot(self.plan.tile_capacity(), T::WIDTH)?;
        let queue: SlotQueue<T> = SlotQueue::new(ctx.hw.buffer_num, slot_len);

        let split = &self.plan.split;
        let first = split.start_of(ctx.core_idx);
        let steps = (first..first + split.len_of(ctx.core_idx)).map(|g| {
            let step = self.plan.locate(g);
            (step, self.plan.descriptor(step.case))
        });
        let mut stats = CoreStats::default();
        pipeline(
            &queue,
            steps,
            |(step, desc), slot| {
                desc.copy_in(ctx.input, self.storage_offset + step.src_offset, slot)?;
                Ok(())
            },
            |(step, desc), slot| {
                let elems = self.copy_out(ctx, step, desc, slot)?;
                stats.record(elems, T::WIDTH);
                Ok(())
            },
        )?;
        Ok(stats)
    }
}

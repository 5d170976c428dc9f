//! N-way concatenation of row-major tensors
//!
//! Every input is viewed as `rows × cols_i`, where `rows` is the product of
//! the extents before `dim` and `cols_i` the product from `dim` on. Output
//! row `r` is input row `r` of each input laid end to end. Rows are split
//! across cores with [`BlockSplit`]; a core streams each input's row through
//! its slot queue in chunks of at most one slot.

use std::marker::PhantomData;

use tracing::{debug, instrument};

use crate::device::dma::RowCopy;
use crate::device::element::Element;
use crate::device::launch::{CoreContext, CoreKernel, CoreStats};
use crate::device::queue::{pipeline, SlotQueue};
use crate::device::{Device, GlobalMemory};
use crate::dtype::DataType;
use crate::error::{LayoutError, Result};
use crate::hardware::HardwareSpec;
use crate::shape::MAX_RANK;
use crate::tiling::BlockSplit;

/// One row-major input
#[derive(Debug, Clone, Copy)]
pub struct ConcatInput<'a> {
    /// Packed element bytes
    pub bytes: &'a [u8],
    pub extents: &'a [u64],
}

/// Row/column decomposition shared by every core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatPlan {
    /// Axis the inputs are joined along
    pub dim: usize,
    /// Element width in bytes
    pub width: usize,
    pub out_extents: Vec<u64>,
    /// Product of the extents before `dim`
    pub rows: u64,
    /// Columns contributed by each input, in input order
    pub cols: Vec<u64>,
    /// Column where each input starts inside an output row
    pub col_offsets: Vec<u64>,
    /// Length of one output row, in elements
    pub out_cols: u64,
    /// Elements per copy chunk
    pub chunk: u64,
    /// Rows per core
    pub split: BlockSplit,
}

impl ConcatPlan {
    /// Validate shapes and decompose
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidShape`] for no inputs, a rank mismatch,
    /// `dim` out of range, or inputs that differ outside `dim`.
    pub fn new(extents: &[&[u64]], dim: usize, dtype: DataType, hw: &HardwareSpec) -> Result<Self> {
        let Some(first) = extents.first() else {
            return Err(LayoutError::InvalidShape("concat of zero tensors".into()));
        };
        let rank = first.len();
        if rank > MAX_RANK {
            return Err(LayoutError::RankTooLarge {
                rank,
                max: MAX_RANK,
            });
        }
        if dim >= rank {
            return Err(LayoutError::InvalidShape(format!(
                "concat dim {dim} out of range for rank {rank}"
            )));
        }
        for (i, shape) in extents.iter().enumerate() {
            let matches = shape.len() == rank
                && shape
                    .iter()
                    .zip(first.iter())
                    .enumerate()
                    .all(|(axis, (a, b))| axis == dim || a == b);
            if !matches {
                return Err(LayoutError::InvalidShape(format!(
                    "input {i} has extents {shape:?}, expected {first:?} outside dim {dim}"
                )));
            }
        }

        let mut out_extents = first.to_vec();
        out_extents[dim] = extents.iter().map(|shape| shape[dim]).sum();
        let rows: u64 = first[..dim].iter().product();
        let inner: u64 = first[dim + 1..].iter().product();
        let cols: Vec<u64> = extents.iter().map(|shape| shape[dim] * inner).collect();
        let col_offsets = cols
            .iter()
            .scan(0, |acc, &c| {
                let start = *acc;
                *acc += c;
                Some(start)
            })
            .collect();
        let out_cols: u64 = cols.iter().sum();
        let width = dtype.size();
        let numel = rows.saturating_mul(out_cols);
        if numel > u64::from(u32::MAX) {
            return Err(LayoutError::Overflow(format!("{numel} concat elements")));
        }
        let chunk = hw.slot_capacity(width);
        if chunk == 0 {
            return Err(LayoutError::NoFeasibleTiling(format!(
                "{} scratch bytes hold no {width}-byte element",
                hw.scratch_bytes
            )));
        }
        let split = if out_cols == 0 {
            BlockSplit::default()
        } else {
            BlockSplit::new(rows, hw.cores as u64)
        };
        Ok(Self {
            dim,
            width,
            out_extents,
            rows,
            cols,
            col_offsets,
            out_cols,
            chunk,
            split,
        })
    }

    pub fn used_cores(&self) -> u64 {
        self.split.used
    }

    pub fn output_elems(&self) -> u64 {
        self.rows * self.out_cols
    }
}

/// One chunk of one input row
#[derive(Debug, Clone, Copy)]
struct Piece {
    input: usize,
    src: u64,
    dst: u64,
    len: u64,
}

struct ConcatKernel<'a, T> {
    plan: &'a ConcatPlan,
    inputs: &'a [GlobalMemory],
    _elem: PhantomData<T>,
}

impl<T: Element> ConcatKernel<'_, T> {
    fn pieces(&self, rows: std::ops::Range<u64>) -> impl Iterator<Item = Piece> + '_ {
        let plan = self.plan;
        rows.flat_map(move |row| {
            (0..plan.cols.len()).flat_map(move |input| {
                let cols = plan.cols[input];
                let dst_row = row * plan.out_cols + plan.col_offsets[input];
                (0..cols).step_by(plan.chunk as usize).map(move |start| Piece {
                    input,
                    src: row * cols + start,
                    dst: dst_row + start,
                    len: plan.chunk.min(cols - start),
                })
            })
        })
    }
}

impl<T: Element> CoreKernel for ConcatKernel<'_, T> {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn used_cores(&self) -> u64 {
        self.plan.split.used
    }

    fn run_core(&self, ctx: &CoreContext<'_>) -> Result<CoreStats> {
        let slot_len = ctx.check_slot(self.plan.chunk, T::WIDTH)?;
        let queue: SlotQueue<T> = SlotQueue::new(ctx.hw.buffer_num, slot_len);
        let split = &self.plan.split;
        let first = split.start_of(ctx.core_idx);
        let rows = first..first + split.len_of(ctx.core_idx);
        let mut stats = CoreStats::default();
        pipeline(
            &queue,
            self.pieces(rows),
            |piece, slot| {
                let src = &self.inputs[piece.input];
                RowCopy::contiguous(piece.len).copy_in(src, piece.src, slot, 0)?;
                Ok(())
            },
            |piece, slot| {
                RowCopy::contiguous(piece.len).copy_out(slot, 0, ctx.output, piece.dst)?;
                stats.record(piece.len, T::WIDTH);
                Ok(())
            },
        )?;
        Ok(stats)
    }
}

/// Concatenated tensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatOutput {
    pub extents: Vec<u64>,
    pub bytes: Vec<u8>,
    /// Cores that copied at least one row
    pub used_cores: u64,
}

/// Concatenate row-major `inputs` along `dim`
///
/// # Errors
///
/// Shape errors from [`ConcatPlan::new`], [`LayoutError::InvalidShape`] when
/// an input's byte length is not a whole number of elements,
/// [`LayoutError::OutOfRange`] when its element count does not match its
/// extents, and any device error.
///
/// # Examples
///
/// ```
/// use trueno_strided::concat::{concat, ConcatInput};
/// use trueno_strided::{DataType, HardwareSpec};
///
/// let a = ConcatInput { bytes: &[1, 2, 3, 4], extents: &[2, 2] };
/// let b = ConcatInput { bytes: &[9, 9], extents: &[2, 1] };
/// let out = concat(&[a, b], 1, DataType::UInt8, &HardwareSpec::default()).unwrap();
/// assert_eq!(out.extents, vec![2, 3]);
/// assert_eq!(out.bytes, vec![1, 2, 9, 3, 4, 9]);
/// ```
#[instrument(skip(inputs, hw), fields(n = inputs.len()))]
pub fn concat(
    inputs: &[ConcatInput<'_>],
    dim: usize,
    dtype: DataType,
    hw: &HardwareSpec,
) -> Result<ConcatOutput> {
    let extents: Vec<&[u64]> = inputs.iter().map(|input| input.extents).collect();
    let plan = ConcatPlan::new(&extents, dim, dtype, hw)?;
    for (i, (input, &cols)) in inputs.iter().zip(&plan.cols).enumerate() {
        let len = input.bytes.len();
        if len % plan.width != 0 {
            return Err(LayoutError::InvalidShape(format!(
                "input {i} has {len} bytes, not a multiple of {}",
                plan.width
            )));
        }
        let required = plan.rows * cols;
        let available = (len / plan.width) as u64;
        if available != required {
            return Err(LayoutError::OutOfRange {
                required,
                available,
            });
        }
    }
    debug!(
        rows = plan.rows,
        out_cols = plan.out_cols,
        chunk = plan.chunk,
        used_cores = plan.used_cores(),
        "concat planned"
    );

    let memories: Vec<GlobalMemory> = inputs
        .iter()
        .map(|input| GlobalMemory::from_bytes(input.bytes))
        .collect();
    let output = GlobalMemory::zeroed(plan.output_elems() as usize * plan.width);
    let device = Device::new(hw.clone());
    let placeholder = GlobalMemory::zeroed(0);
    match plan.width {
        1 => run::<u8>(&device, &plan, &memories, &placeholder, &output)?,
        2 => run::<u16>(&device, &plan, &memories, &placeholder, &output)?,
        4 => run::<u32>(&device, &plan, &memories, &placeholder, &output)?,
        8 => run::<u64>(&device, &plan, &memories, &placeholder, &output)?,
        other => return Err(LayoutError::UnsupportedDataType(other)),
    };
    Ok(ConcatOutput {
        extents: plan.out_extents.clone(),
        bytes: output.to_vec(),
        used_cores: plan.used_cores(),
    })
}

fn run<T: Element>(
    device: &Device,
    plan: &ConcatPlan,
    inputs: &[GlobalMemory],
    placeholder: &GlobalMemory,
    output: &GlobalMemory,
) -> Result<Vec<CoreStats>> {
    let kernel = ConcatKernel::<T> {
        plan,
        inputs,
        _elem: PhantomData,
    };
    device.run_cores(&kernel, placeholder, output)
}

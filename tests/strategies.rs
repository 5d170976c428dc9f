//! One scenario per copy strategy, plus the error surface

mod common;

use common::{covers_exactly_once, iota_u32, launch, reference, view};
use trueno_strided::device::{Device, GlobalMemory};
use trueno_strided::tiling::{
    BlockSplit, DualCutPlan, PlanRequest, StrategyKey, StrategyKind, StrategyParams,
    TilingParameterBlock, TilingPlanner,
};
use trueno_strided::{
    as_strided, concat, ConcatInput, DataType, HardwareSpec, LayoutError, ShapeDescriptor,
};

#[test]
fn test_hand_built_dual_cut_launch() {
    // (27, 37) u32 read with strides (1, 27); tiles of 4 x 8, tails 3 and 5
    let plan = DualCutPlan {
        width: 4,
        outer_axis_num: 2,
        gm_loops: [7, 5, 1, 1, 1, 1, 1, 1, 1, 1],
        gm_in_strides: [4, 216, 0, 0, 0, 0, 0, 0, 0, 0],
        gm_out_strides: [148, 8, 0, 0, 0, 0, 0, 0, 0, 0],
        inner_axis_num: 2,
        ub_loops: [1, 1, 1, 4, 8],
        ub_in_strides: [0, 0, 0, 1, 27],
        ub_out_strides: [0, 0, 0, 37, 1],
        padded_row: 8,
        cut_axis_num: 2,
        cut_slot: [3, 4],
        cut_tail: [3, 5],
        split: BlockSplit::new(35, 3),
    };
    let mut block = TilingParameterBlock {
        key: StrategyKey::new(StrategyKind::DualCut, 4).unwrap().encode(),
        dtype_size: 4,
        numel: 999,
        ..TilingParameterBlock::default()
    };
    StrategyParams::DualCut(plan).encode(&mut block).unwrap();

    let src = iota_u32(999);
    let input = GlobalMemory::from_slice(&src);
    let output = GlobalMemory::zeroed(999 * 4).with_audit();
    let stats = Device::new(HardwareSpec::tiny())
        .launch(&input, &output, &mut [], &block.to_bytes())
        .unwrap();

    assert_eq!(stats.strategy, StrategyKind::DualCut);
    assert_eq!(stats.used_cores, 3);
    assert_eq!(stats.iterations, 35);
    assert_eq!(stats.bytes_written, 999 * 4);
    let out: Vec<u32> = output.to_typed();
    for i in 0..27 {
        for j in 0..37 {
            assert_eq!(out[i * 37 + j], src[i + 27 * j], "element ({i}, {j})");
        }
    }
}

#[test]
fn test_hand_built_single_axis_dual_cut_launch() {
    // (10, 37) u32 read with strides (1, 10); only the outer axis is cut,
    // two rows per tile padded from 37 to 40 elements
    let plan = DualCutPlan {
        width: 4,
        outer_axis_num: 1,
        gm_loops: [5, 1, 1, 1, 1, 1, 1, 1, 1, 1],
        gm_in_strides: [2, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        gm_out_strides: [74, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        inner_axis_num: 2,
        ub_loops: [1, 1, 1, 2, 37],
        ub_in_strides: [0, 0, 0, 1, 10],
        ub_out_strides: [0, 0, 0, 37, 1],
        padded_row: 40,
        cut_axis_num: 1,
        cut_slot: [3, 0],
        cut_tail: [2, 0],
        split: BlockSplit::new(5, 2),
    };
    let mut block = TilingParameterBlock {
        key: StrategyKey::new(StrategyKind::DualCut, 4).unwrap().encode(),
        dtype_size: 4,
        numel: 370,
        ..TilingParameterBlock::default()
    };
    StrategyParams::DualCut(plan).encode(&mut block).unwrap();
    assert_eq!(DualCutPlan::decode(&block).unwrap().cut_axis_num, 1);

    let src = iota_u32(370);
    let input = GlobalMemory::from_slice(&src);
    let output = GlobalMemory::zeroed(370 * 4).with_audit();
    let stats = Device::new(HardwareSpec::tiny())
        .launch(&input, &output, &mut [], &block.to_bytes())
        .unwrap();

    assert_eq!(stats.strategy, StrategyKind::DualCut);
    assert_eq!(stats.used_cores, 2);
    assert_eq!(stats.iterations, 5);
    assert_eq!(stats.bytes_written, 370 * 4);
    let writes = output.audit_log().unwrap();
    assert!(covers_exactly_once(&writes, 370 * 4));
    let out: Vec<u32> = output.to_typed();
    for i in 0..10 {
        for j in 0..37 {
            assert_eq!(out[i * 37 + j], src[i + 10 * j], "element ({i}, {j})");
        }
    }
}

#[test]
fn test_planned_single_axis_dual_cut_matches_reference() {
    let src = iota_u32(200 * 37);
    let v = view(&[200, 37], &[1, 200], 0);
    for granularity in [32, 64] {
        let hw = HardwareSpec::tiny()
            .with_scratch_bytes(32 * 1024)
            .with_granularity(granularity);
        let run = launch(&src, &v, &hw, None).unwrap();
        assert_eq!(run.plan.kind(), StrategyKind::DualCut);
        assert_eq!(run.plan.block.cut_axis_num, 1);
        assert_eq!(run.output, reference(&src, &v));
        assert!(covers_exactly_once(&run.writes, 200 * 37 * 4));
    }
}

#[test]
fn test_square_transpose_plans_dual_cut() {
    let src = iota_u32(512 * 512);
    let v = view(&[512, 512], &[1, 512], 0);
    let run = launch(&src, &v, &HardwareSpec::default(), None).unwrap();
    assert_eq!(run.plan.kind(), StrategyKind::DualCut);
    assert_eq!(run.output, reference(&src, &v));
    assert!(covers_exactly_once(&run.writes, 512 * 512 * 4));
}

#[test]
fn test_alignment_aware_pads_short_rows() {
    // rows of 37 u32 (148 bytes) padded to 40 in scratch
    let src = iota_u32(900);
    let v = view(&[20, 37], &[40, 1], 5);
    let run = launch(&src, &v, &HardwareSpec::tiny(), None).unwrap();
    assert_eq!(run.plan.kind(), StrategyKind::AlignmentAware);
    match &run.plan.params {
        StrategyParams::AlignmentAware(p) => {
            assert!(p.en_32b_aligned);
            assert_eq!(p.padded_row, 40);
        }
        other => panic!("unexpected params {other:?}"),
    }
    assert!(run.stats.iterations > 1);
    assert_eq!(run.output, reference(&src, &v));
    assert!(covers_exactly_once(&run.writes, 20 * 37 * 4));
}

#[test]
fn test_alignment_aware_exact_rows() {
    let src = iota_u32(100 * 48);
    let v = view(&[100, 40], &[48, 1], 0);
    for hw in [HardwareSpec::default(), HardwareSpec::tiny()] {
        let run = launch(&src, &v, &hw, None).unwrap();
        assert_eq!(run.plan.kind(), StrategyKind::AlignmentAware);
        assert_eq!(run.output, reference(&src, &v));
    }
}

#[test]
fn test_gather_with_tail_tile() {
    let src: Vec<u16> = (0..240u16).map(|v| v.wrapping_mul(7919)).collect();
    let v = view(&[20, 3, 4], &[1, 20, 60], 0);
    let run = launch(&src, &v, &HardwareSpec::tiny(), None).unwrap();
    assert_eq!(run.plan.kind(), StrategyKind::Gather);
    match &run.plan.params {
        StrategyParams::Gather(p) => {
            assert_eq!(p.span, 240);
            assert!(p.cut.split);
        }
        other => panic!("unexpected params {other:?}"),
    }
    assert_eq!(run.output, reference(&src, &v));
    assert!(covers_exactly_once(&run.writes, 240 * 2));
}

#[test]
fn test_per_element_high_rank() {
    let hw = HardwareSpec::tiny();
    for rank in 6..=8usize {
        let extents = vec![2i64; rank];
        let strides: Vec<i64> = (0..rank).map(|d| 1 << d).collect();
        let v = view(&extents, &strides, 1);
        let numel = 1usize << rank;

        let src = iota_u32(numel as u64 + 1);
        let run = launch(&src, &v, &hw, Some(StrategyKind::PerElement)).unwrap();
        assert_eq!(run.plan.view.rank(), rank);
        assert_eq!(run.output, reference(&src, &v));
        assert!(covers_exactly_once(&run.writes, numel * 4));

        let bytes: Vec<u8> = (0..=255).cycle().take(numel + 1).collect();
        let run = launch(&bytes, &v, &hw, Some(StrategyKind::PerElement)).unwrap();
        assert_eq!(run.output, reference(&bytes, &v));

        let wide: Vec<u64> = (0..numel as u64 + 1).map(|v| v << 33 | v).collect();
        let run = launch(&wide, &v, &hw, Some(StrategyKind::PerElement)).unwrap();
        assert_eq!(run.output, reference(&wide, &v));
    }
}

#[test]
fn test_per_element_rejects_rank_nine() {
    let extents = vec![2i64; 9];
    let strides: Vec<i64> = (0..9).map(|d| 1 << d).collect();
    let v = view(&extents, &strides, 0);
    let src = iota_u32(512);
    let err = launch(&src, &v, &HardwareSpec::tiny(), Some(StrategyKind::PerElement))
        .err()
        .unwrap();
    assert!(matches!(err, LayoutError::InvalidTiling(_)));

    // automatic selection still finds a block strategy
    let run = launch(&src, &v, &HardwareSpec::tiny(), None).unwrap();
    assert_ne!(run.plan.kind(), StrategyKind::PerElement);
    assert_eq!(run.output, reference(&src, &v));
}

#[test]
fn test_concat_matches_manual_interleave() {
    let a: Vec<u32> = (0..3 * 50).collect();
    let b: Vec<u32> = (1000..1000 + 3 * 200).collect();
    let inputs = [
        ConcatInput {
            bytes: bytemuck::cast_slice(&a),
            extents: &[3, 50],
        },
        ConcatInput {
            bytes: bytemuck::cast_slice(&b),
            extents: &[3, 200],
        },
    ];
    let out = concat(&inputs, 1, DataType::Float32, &HardwareSpec::tiny()).unwrap();
    assert_eq!(out.extents, vec![3, 250]);
    let values: Vec<u32> = out
        .bytes
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    let expected: Vec<u32> = (0..3)
        .flat_map(|r| {
            let row_a = &a[r * 50..(r + 1) * 50];
            let row_b = &b[r * 200..(r + 1) * 200];
            row_a.iter().chain(row_b).copied()
        })
        .collect();
    assert_eq!(values, expected);

    let stacked = concat(&inputs[..1], 0, DataType::Float32, &HardwareSpec::tiny()).unwrap();
    assert_eq!(stacked.bytes, bytemuck::cast_slice::<u32, u8>(&a));
}

#[test]
fn test_view_past_input_is_out_of_range() {
    let input = ShapeDescriptor::contiguous(&[2, 3]).unwrap();
    let v = ShapeDescriptor::new(&[3, 3], &[2, 1], 1).unwrap();
    let hw = HardwareSpec::default();
    let err = as_strided(&[0u8; 6], &input, &v, DataType::Int8, &hw).unwrap_err();
    assert_eq!(
        err,
        LayoutError::OutOfRange {
            required: 8,
            available: 6
        }
    );
}

#[test]
fn test_negative_metadata_rejected() {
    assert!(matches!(
        ShapeDescriptor::new(&[2, 2], &[-1, 1], 0),
        Err(LayoutError::NegativeValue { what: "stride", .. })
    ));
    assert!(matches!(
        ShapeDescriptor::new(&[2, -2], &[2, 1], 0),
        Err(LayoutError::NegativeValue { what: "extent", .. })
    ));
    assert!(matches!(
        PlanRequest::from_raw(&[4], &[1], &[2], &[1], -1, DataType::Int8),
        Err(LayoutError::NegativeValue { .. })
    ));
}

#[test]
fn test_rank_limit() {
    let extents = [1i64; 11];
    let strides = [1i64; 11];
    assert!(matches!(
        ShapeDescriptor::new(&extents, &strides, 0),
        Err(LayoutError::RankTooLarge { rank: 11, max: 10 })
    ));
}

#[test]
fn test_unsupported_width() {
    assert_eq!(DataType::from_width(3), Err(LayoutError::UnsupportedDataType(3)));
}

#[test]
fn test_launch_rejects_short_workspace_and_bad_block() {
    let hw = HardwareSpec::default();
    let input = ShapeDescriptor::contiguous(&[64]).unwrap();
    let v = ShapeDescriptor::new(&[8, 8], &[1, 8], 0).unwrap();
    let plan = TilingPlanner::new(hw.clone())
        .plan(&PlanRequest::new(input, v, DataType::Float32))
        .unwrap();
    let src = GlobalMemory::from_slice(&iota_u32(64));
    let dst = GlobalMemory::zeroed(plan.output_bytes());
    let device = Device::new(hw);

    let mut small = vec![0u8; 16];
    assert_eq!(
        device.launch(&src, &dst, &mut small, &plan.tiling_bytes()),
        Err(LayoutError::WorkspaceTooSmall {
            required: plan.workspace_bytes,
            actual: 16
        })
    );

    let mut workspace = vec![0u8; plan.workspace_bytes];
    let bytes = plan.tiling_bytes();
    assert!(matches!(
        device.launch(&src, &dst, &mut workspace, &bytes[..bytes.len() - 8]),
        Err(LayoutError::Abi(_))
    ));

    let mut block = plan.block;
    block.key = 7;
    assert!(matches!(
        device.launch(&src, &dst, &mut workspace, &block.to_bytes()),
        Err(LayoutError::Abi(_))
    ));
}

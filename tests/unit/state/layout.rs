use super::*;
use crate::state::schema::ElementSizes;

#[test]
fn every_offset_is_16_byte_aligned() {
    let schemas = [
        StateSchema::default(),
        StateSchema {
            debug_data: true,
            ..StateSchema::default()
        },
        StateSchema {
            sizes: ElementSizes {
                ray: 33,
                intersection: 13,
                shader_closure: 7,
                shader_data_base: 101,
                ..ElementSizes::default()
            },
            debug_data: true,
        },
    ];
    for schema in schemas {
        for lanes in [0u64, 1, 3, 17, 1024, 4096] {
            for closures in [0u32, 1, 5, 64] {
                for aux in [0u64, 1, 3, 12, 100] {
                    let layout = schema.compute_layout(lanes, closures, aux).unwrap();
                    for e in layout.entries() {
                        assert_eq!(e.offset % 16, 0, "{:?} lanes={lanes}", e.field);
                    }
                    assert_eq!(layout.total_size % 16, 0);
                }
            }
        }
    }
}

#[test]
fn sub_arrays_are_contiguous_and_sized_per_lane() {
    let layout = compute_layout(100, 8, 12).unwrap();
    let mut expected_offset = 0;
    for e in layout.entries() {
        assert_eq!(e.offset, expected_offset);
        assert_eq!(e.count, 100 * e.per_lane);
        assert!(e.reserved >= e.used());
        assert!(e.reserved - e.used() < 16);
        expected_offset = e.end();
    }
    assert_eq!(layout.total_size, expected_offset);
}

#[test]
fn total_is_monotonic_in_each_input() {
    let base = compute_layout(256, 4, 8).unwrap().total_size;
    assert!(compute_layout(257, 4, 8).unwrap().total_size >= base);
    assert!(compute_layout(512, 4, 8).unwrap().total_size >= base);
    assert!(compute_layout(256, 5, 8).unwrap().total_size >= base);
    assert!(compute_layout(256, 4, 9).unwrap().total_size >= base);

    let mut prev = 0;
    for lanes in 0..200u64 {
        let t = compute_layout(lanes, 3, 5).unwrap().total_size;
        assert!(t >= prev);
        prev = t;
    }
    let mut prev = 0;
    for c in 0..64u32 {
        let t = compute_layout(33, c, 5).unwrap().total_size;
        assert!(t >= prev);
        prev = t;
    }
}

#[test]
fn shader_data_blocks_scale_with_closures_and_shadow_is_doubled() {
    let sizes = ElementSizes::default();
    let layout = compute_layout(10, 6, 0).unwrap();
    let sd = layout.field(StateField::ShaderData).unwrap();
    let shadow = layout.field(StateField::ShadowShaderData).unwrap();
    assert_eq!(layout.shader_data_size, sizes.shader_data_base + 6 * sizes.shader_closure);
    assert_eq!(sd.stride, layout.shader_data_size);
    assert_eq!(sd.count, 10);
    assert_eq!(shadow.count, 20);
}

#[test]
fn zero_lanes_gives_an_empty_buffer() {
    let layout = compute_layout(0, 16, 64).unwrap();
    assert_eq!(layout.total_size, 0);
}

#[test]
fn debug_block_only_when_enabled() {
    assert!(compute_layout(4, 1, 0).unwrap().field(StateField::DebugData).is_none());
    let schema = StateSchema {
        debug_data: true,
        ..StateSchema::default()
    };
    let layout = schema.compute_layout(4, 1, 0).unwrap();
    assert!(layout.field(StateField::DebugData).is_some());
    assert!(layout.total_size > compute_layout(4, 1, 0).unwrap().total_size);
}

#[test]
fn queue_data_and_shadow_isect_multiplicity() {
    let layout = compute_layout(7, 0, 0).unwrap();
    let q = layout.field(StateField::QueueData).unwrap();
    assert_eq!(q.per_lane, crate::state::schema::NUM_QUEUES * 2);
    let s = layout.field(StateField::IsectShadow).unwrap();
    assert_eq!(s.per_lane, 2);
}

#[test]
fn lane_slices_do_not_overlap_neighbors() {
    let layout = compute_layout(4, 1, 8).unwrap();
    let mut arena = vec![0u8; layout.total_size as usize];
    layout
        .lane_slice_mut(StateField::PerThreadOutput, &mut arena, 2)
        .unwrap()
        .fill(0xAB);
    let out = layout.slice(StateField::PerThreadOutput, &arena).unwrap();
    assert_eq!(out.len(), 32);
    assert!(out[..16].iter().all(|&b| b == 0));
    assert!(out[16..24].iter().all(|&b| b == 0xAB));
    assert!(out[24..].iter().all(|&b| b == 0));
}

#[test]
fn short_arena_and_bad_lane_are_rejected() {
    let layout = compute_layout(4, 1, 8).unwrap();
    let mut short = vec![0u8; 16];
    assert!(layout.slice_mut(StateField::Ray, &mut short).is_err());
    let mut arena = vec![0u8; layout.total_size as usize];
    assert!(layout.lane_slice_mut(StateField::Ray, &mut arena, 4).is_err());
}

#[test]
fn bytes_per_lane_matches_large_layouts() {
    let schema = StateSchema::default();
    let per_lane = schema.bytes_per_lane(8, 16).unwrap();
    let big = schema.compute_layout(1 << 16, 8, 16).unwrap().total_size;
    assert_eq!(big / (1 << 16), per_lane);
}

#[test]
fn oversized_lane_counts_are_rejected() {
    let err = compute_layout(1u64 << 60, 64, 0).unwrap_err();
    assert!(matches!(err, SplitError::Validation(_)));
    assert!(err.to_string().contains("overflows"));
    assert!(compute_layout(u64::MAX, 0, 0).is_err());
}

#[test]
fn oversized_aux_output_is_rejected() {
    let err = compute_layout(2, 1, u64::MAX / 2).unwrap_err();
    assert!(err.to_string().contains("per_thread_output"));
}

#[test]
fn oversized_closure_size_is_rejected() {
    let schema = StateSchema {
        sizes: ElementSizes {
            shader_closure: u64::MAX / 2,
            ..ElementSizes::default()
        },
        debug_data: false,
    };
    assert!(schema.compute_layout(1, 64, 0).is_err());
    assert!(schema.bytes_per_lane(64, 0).is_err());
}

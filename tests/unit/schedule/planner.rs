use super::*;

#[test]
fn reference_tile_plans_to_itself() {
    let p = plan(Int2::new(8, 8), Int2::new(64, 64)).unwrap();
    assert_eq!(p.global_size, Int2::new(64, 64));
    assert_eq!(p.num_global_elements(), 4096);
    assert_eq!(p.global_size_shadow, Int2::new(128, 64));
}

#[test]
fn global_size_is_smallest_covering_multiple() {
    for lx in 1..=9u32 {
        for ly in 1..=5u32 {
            for rx in 0..=40u32 {
                for ry in [0u32, 1, 7, 16, 33] {
                    let p = plan(Int2::new(lx, ly), Int2::new(rx, ry)).unwrap();
                    let g = p.global_size;
                    assert_eq!(g.x % lx, 0);
                    assert_eq!(g.y % ly, 0);
                    assert!(g.x >= rx && g.x < rx + lx);
                    assert!(g.y >= ry && g.y < ry + ly);
                    assert_eq!(p.global_size_shadow.x, 2 * g.x);
                    assert_eq!(p.global_size_shadow.y, g.y);
                }
            }
        }
    }
}

#[test]
fn dims_share_local_size() {
    let p = plan(Int2::new(32, 1), Int2::new(100, 3)).unwrap();
    assert_eq!(p.dims().global_size, Int2::new(128, 3));
    assert_eq!(p.shadow_dims().global_size, Int2::new(256, 3));
    assert_eq!(p.shadow_dims().local_size, Int2::new(32, 1));
}

#[test]
fn grids_past_u32_are_rejected() {
    let err = plan(Int2::new(32, 1), Int2::new(3_000_000_000, 1)).unwrap_err();
    assert!(matches!(err, SplitError::Validation(_)));
    assert!(err.to_string().contains("shadow global size"));

    let err = plan(Int2::new(8, 8), Int2::new(64, u32::MAX)).unwrap_err();
    assert!(err.to_string().contains("global size"));

    let p = plan(Int2::new(1, 1), Int2::new(u32::MAX / 2, u32::MAX)).unwrap();
    assert_eq!(p.global_size_shadow, Int2::new(u32::MAX - 1, u32::MAX));
}

#[test]
fn zero_local_size_is_rejected() {
    assert!(plan(Int2::new(0, 8), Int2::new(64, 64)).is_err());
    assert!(validate_local_size(Int2::new(0, 1)).is_err());
    assert!(validate_local_size(Int2::new(1, 0)).is_err());
    assert!(validate_local_size(Int2::new(1, 1)).is_ok());
}

#[test]
fn memory_budget_grid_is_aligned_and_fits() {
    let schema = StateSchema::default();
    let free = 512 * 1024 * 1024;
    let g = global_size_for_memory_budget(&schema, 8, 0, free).unwrap();
    assert_eq!(g.x % 32, 0);
    assert_eq!(g.y % 16, 0);
    let per_lane = schema.bytes_per_lane(8, 0).unwrap();
    assert!(g.area() * per_lane <= free / 2);
}

#[test]
fn tiny_budget_is_a_device_error() {
    let err = global_size_for_memory_budget(&StateSchema::default(), 8, 0, 4096).unwrap_err();
    assert!(err.to_string().contains("not enough device memory"));
}

#[test]
fn max_elements_divides_by_lane_size() {
    let schema = StateSchema::default();
    let per_lane = schema.bytes_per_lane(2, 4).unwrap();
    assert_eq!(
        max_elements_for_max_buffer_size(&schema, 2, 4, per_lane * 10 + 1).unwrap(),
        10
    );
}

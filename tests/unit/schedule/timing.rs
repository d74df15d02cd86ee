use super::*;

#[test]
fn first_observation_is_taken_directly() {
    let mut avg = RollingAverage::new(0.1);
    assert!(!avg.is_warm());
    assert_eq!(avg.get(), 0.0);
    avg.observe(0.25);
    assert_eq!(avg.get(), 0.25);
}

#[test]
fn later_observations_blend_with_alpha() {
    let mut avg = RollingAverage::new(0.1);
    avg.observe(1.0);
    avg.observe(2.0);
    assert!((avg.get() - 1.1).abs() < 1e-12);
}

#[test]
fn constant_stream_converges() {
    let mut avg = RollingAverage::new(0.1);
    avg.observe(5.0);
    for _ in 0..300 {
        avg.observe(0.02);
    }
    assert!((avg.get() - 0.02).abs() < 1e-6);
}

#[test]
fn cold_start_uses_initial_guess() {
    let sizer = BatchSizer::new(1, 10);
    assert_eq!(sizer.samples_per_batch(&RollingAverage::new(0.1)), 1);
    let sizer = BatchSizer::new(3, 10);
    assert_eq!(sizer.samples_per_batch(&RollingAverage::new(0.1)), 3);
}

#[test]
fn warm_batches_follow_multiplier_over_average() {
    let mut avg = RollingAverage::new(0.1);
    avg.observe(0.25);
    let mut sizer = BatchSizer::new(1, 10);
    // int(1 / 0.25) + 1
    assert_eq!(sizer.samples_per_batch(&avg), 5);
    sizer.ramp();
    assert_eq!(sizer.samples_per_batch(&avg), 9);
}

#[test]
fn tiny_average_saturates_instead_of_overflowing() {
    let mut avg = RollingAverage::new(0.1);
    avg.observe(1e-300);
    let sizer = BatchSizer::new(1, 10);
    assert_eq!(sizer.samples_per_batch(&avg), u32::MAX);
}

#[test]
fn ramp_doubles_and_caps_at_ten() {
    let mut sizer = BatchSizer::new(1, 10);
    let mut seen = vec![sizer.time_multiplier()];
    for _ in 0..8 {
        sizer.ramp();
        seen.push(sizer.time_multiplier());
    }
    assert_eq!(seen, vec![1, 2, 4, 8, 10, 10, 10, 10, 10]);
    assert!(seen.iter().all(|&m| m <= 10));
}

#[test]
fn manual_clock_moves_only_when_advanced() {
    let c = ManualClock::new();
    assert_eq!(c.now_secs(), 0.0);
    c.advance(1.5);
    c.advance(0.5);
    assert_eq!(c.now_secs(), 2.0);
}

#[test]
fn monotonic_clock_never_goes_back() {
    let c = MonotonicClock::default();
    let a = c.now_secs();
    let b = c.now_secs();
    assert!(b >= a);
}

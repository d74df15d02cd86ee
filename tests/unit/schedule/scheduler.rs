use super::*;
use crate::device::host::HostDevice;
use crate::device::synthetic::SyntheticPipeline;
use crate::schedule::task::TileTask;
use crate::schedule::timing::ManualClock;

fn device() -> HostDevice {
    let mut d = HostDevice::new("sched").with_local_size(Int2::new(8, 8));
    SyntheticPipeline::new(2).install(&mut d);
    d
}

#[test]
fn allocation_sizes_every_buffer() {
    let mut d = device().with_work_pool_size(64);
    let tile = RenderTile::new(0, 0, 64, 64, 0, 1);
    let mut alloc = SplitAllocation::allocate(&mut d, &SchedulerOpts::default(), 4, &tile).unwrap();

    assert_eq!(alloc.plan.global_size, Int2::new(64, 64));
    assert_eq!(alloc.layout.lanes, 4096);
    assert_eq!(alloc.ray_state.size_bytes(), 4096);
    assert_eq!(alloc.work_pool_wgs.size_bytes(), (4096 / 64 + 1) * 4);
    assert_eq!(alloc.queue_index.size_bytes(), NUM_QUEUES * 4);
    assert_eq!(alloc.use_queues_flag.size_bytes(), 1);
    assert_eq!(alloc.split_data.size_bytes(), alloc.layout.total_size);
    assert_eq!(alloc.status.len(), 4096);
    assert_eq!(d.live_buffers(), 5);

    alloc.free(&mut d);
    assert_eq!(d.live_buffers(), 0);
    assert_eq!(d.stats().live_bytes, 0);
}

#[test]
fn failed_allocation_releases_partial_buffers() {
    let mut d = device().with_memory_limit(1024);
    let tile = RenderTile::new(0, 0, 64, 64, 0, 1);
    let err = SplitAllocation::allocate(&mut d, &SchedulerOpts::default(), 4, &tile).unwrap_err();
    assert!(matches!(err, SplitError::Device(_)));
    assert_eq!(d.live_buffers(), 0);
}

#[test]
fn opts_work_pool_size_overrides_device() {
    let mut d = device().with_work_pool_size(64);
    let opts = SchedulerOpts {
        work_pool_size: Some(1),
        ..SchedulerOpts::default()
    };
    let tile = RenderTile::new(0, 0, 8, 8, 0, 1);
    let alloc = SplitAllocation::allocate(&mut d, &opts, 4, &tile).unwrap();
    assert_eq!(alloc.work_pool_wgs.size_bytes(), (64 + 1) * 4);
}

#[test]
fn build_rejects_invalid_opts() {
    let opts = SchedulerOpts {
        path_iterations_per_burst: 0,
        ..SchedulerOpts::default()
    };
    let err = SchedulerBuilder::new(device()).opts(opts).build().err().unwrap();
    assert!(matches!(err, SplitError::Config(_)));
}

#[test]
fn build_resolves_stages_without_allocating() {
    let s = SchedulerBuilder::new(device()).build().unwrap();
    assert!(!s.is_allocated());
    assert!(s.layout().is_none());
    assert!(s.global_size().is_none());
    assert_eq!(s.avg_time_per_sample(), 0.0);
    assert_eq!(s.device().stats().allocs, 0);
}

#[test]
fn reload_cannot_outgrow_allocated_closures() {
    let features = RequestedFeatures {
        max_closure: 4,
        ..RequestedFeatures::default()
    };
    let mut s = SchedulerBuilder::new(device())
        .features(features.clone())
        .clock(Arc::new(ManualClock::new()))
        .build()
        .unwrap();
    let mut tile = RenderTile::new(0, 0, 8, 8, 0, 1);
    s.path_trace(&mut TileTask::new(), &mut tile, StageBuffers::default())
        .unwrap();

    let bigger = RequestedFeatures {
        max_closure: 8,
        ..RequestedFeatures::default()
    };
    assert!(matches!(
        s.reload_stages(&bigger),
        Err(SplitError::Validation(_))
    ));
    assert_eq!(s.registry().max_closure(), 4);

    let smaller = RequestedFeatures {
        max_closure: 2,
        ..features
    };
    s.reload_stages(&smaller).unwrap();
    assert_eq!(s.registry().max_closure(), 2);
}

#[test]
fn failed_reload_keeps_current_stages() {
    let mut s = SchedulerBuilder::new(device()).build().unwrap();
    let before = s.registry().handle(SplitStage::PathInit).clone();
    s.device_mut().remove_program("direct_lighting");
    assert!(matches!(
        s.reload_stages(&RequestedFeatures::default()),
        Err(SplitError::Unsupported(_))
    ));
    assert_eq!(s.registry().handle(SplitStage::PathInit), &before);
}

#[test]
fn cancel_window_without_grace_stops_at_first_check() {
    let clock = ManualClock::new();
    let task = TileTask::new();
    let avg = RollingAverage::new(0.1);
    let mut w = CancelWindow::new(0.0);
    assert!(!w.should_stop(&task, &clock, &avg));
    task.cancel();
    assert!(w.should_stop(&task, &clock, &avg));
}

#[test]
fn cancel_window_waits_for_grace_period() {
    let clock = ManualClock::new();
    let task = TileTask::new();
    let mut avg = RollingAverage::new(0.1);
    avg.observe(0.5);
    let mut w = CancelWindow::new(2.0);
    task.cancel();
    assert!(!w.should_stop(&task, &clock, &avg));
    clock.advance(0.75);
    assert!(!w.should_stop(&task, &clock, &avg));
    clock.advance(0.25);
    assert!(w.should_stop(&task, &clock, &avg));
}

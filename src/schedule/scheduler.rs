use std::sync::Arc;

use crate::device::capability::{
    DataInitArgs, GridRequest, KernelDimensions, MemFlags, SplitDevice, StageBuffers,
    check_device,
};
use crate::device::memory::DeviceMemory;
use crate::foundation::core::Int2;
use crate::foundation::error::{SplitError, SplitResult};
use crate::kernel::features::RequestedFeatures;
use crate::kernel::registry::StageRegistry;
use crate::kernel::stage::SplitStage;
use crate::schedule::opts::SchedulerOpts;
use crate::schedule::planner::{GlobalSizePlan, plan};
use crate::schedule::task::{RenderTask, RenderTile};
use crate::schedule::timing::{BatchSizer, Clock, MonotonicClock, RollingAverage};
use crate::state::layout::StateLayout;
use crate::state::ray_state::{Convergence, StatusSnapshot};
use crate::state::schema::NUM_QUEUES;

/// Counters of one `path_trace` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct TraceStats {
    /// Sample batches fully rendered.
    pub batches: u32,
    /// Groups of path iterations dispatched between status readbacks.
    pub bursts: u64,
    pub samples_rendered: u32,
    /// The task was cancelled; the tile holds partial progress.
    pub cancelled: bool,
}

/// Device buffers shared by all lanes, allocated on the first tile.
#[derive(Debug)]
struct SplitAllocation {
    requested: Int2,
    plan: GlobalSizePlan,
    layout: StateLayout,
    split_data: DeviceMemory,
    ray_state: DeviceMemory,
    queue_index: DeviceMemory,
    use_queues_flag: DeviceMemory,
    work_pool_wgs: DeviceMemory,
    status: StatusSnapshot,
}

impl SplitAllocation {
    #[tracing::instrument(skip_all, fields(w = tile.w, h = tile.h))]
    fn allocate<D: SplitDevice + ?Sized>(
        device: &mut D,
        opts: &SchedulerOpts,
        max_closures: u32,
        tile: &RenderTile,
    ) -> SplitResult<Self> {
        let local_size = device.split_kernel_local_size();
        let schema = opts.schema();
        let requested = device.split_kernel_global_size(&GridRequest {
            tile,
            schema: &schema,
            max_closures,
            aux_per_lane: opts.per_thread_output_size,
        })?;
        let plan = plan(local_size, requested)?;
        let lanes = plan.num_global_elements();
        let lanes_usize = usize::try_from(lanes)
            .map_err(|_| SplitError::validation(format!("{lanes} lanes exceed host memory")))?;
        let layout = schema.compute_layout(lanes, max_closures, opts.per_thread_output_size)?;

        let work_pool_size = opts
            .work_pool_size
            .unwrap_or_else(|| device.work_pool_size())
            .max(1);
        let max_work_groups = lanes / u64::from(work_pool_size) + 1;

        let mut alloc = Self {
            requested,
            plan,
            layout,
            split_data: DeviceMemory::new("split_data", MemFlags::ReadWrite),
            ray_state: DeviceMemory::new("ray_state", MemFlags::ReadWrite),
            queue_index: DeviceMemory::new("queue_index", MemFlags::ReadWrite),
            use_queues_flag: DeviceMemory::new("use_queues_flag", MemFlags::ReadWrite),
            work_pool_wgs: DeviceMemory::new("work_pool_wgs", MemFlags::ReadWrite),
            status: StatusSnapshot::new(lanes_usize),
        };

        if let Err(e) = alloc.alloc_buffers(device, max_work_groups) {
            alloc.free(device);
            return Err(e);
        }

        tracing::info!(
            global_size = %alloc.plan.global_size,
            local_size = %alloc.plan.local_size,
            lanes,
            shader_data_size = alloc.layout.shader_data_size,
            state_bytes = alloc.layout.total_size,
            work_groups = max_work_groups,
            "allocated split kernel state"
        );
        Ok(alloc)
    }

    fn alloc_buffers<D: SplitDevice + ?Sized>(
        &mut self,
        device: &mut D,
        max_work_groups: u64,
    ) -> SplitResult<()> {
        self.work_pool_wgs.alloc(device, max_work_groups * 4)?;
        self.queue_index.alloc(device, NUM_QUEUES * 4)?;
        self.use_queues_flag.alloc(device, 1)?;
        self.split_data.alloc(device, self.layout.total_size)?;
        self.ray_state.alloc(device, self.plan.num_global_elements())
    }

    fn free<D: SplitDevice + ?Sized>(&mut self, device: &mut D) {
        self.split_data.free(device);
        self.ray_state.free(device);
        self.queue_index.free(device);
        self.use_queues_flag.free(device);
        self.work_pool_wgs.free(device);
    }

    fn reset<D: SplitDevice + ?Sized>(&self, device: &mut D) -> SplitResult<()> {
        self.work_pool_wgs.zero(device)?;
        self.split_data.zero(device)?;
        self.ray_state.zero(device)
    }

    /// Blocking copy of the status array into the host snapshot.
    fn read_status<D: SplitDevice + ?Sized>(&mut self, device: &mut D) -> SplitResult<Convergence> {
        self.ray_state
            .copy_from(device, 0, self.status.as_mut_bytes())?;
        self.status.convergence()
    }
}

enum Lifecycle {
    Uninitialized,
    Allocated(Box<SplitAllocation>),
}

/// Builder for [`SplitKernelScheduler`]. Device allocation is deferred to the first tile.
pub struct SchedulerBuilder<D: SplitDevice> {
    device: D,
    opts: SchedulerOpts,
    features: RequestedFeatures,
    clock: Option<Arc<dyn Clock>>,
}

impl<D: SplitDevice> SchedulerBuilder<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            opts: SchedulerOpts::default(),
            features: RequestedFeatures::default(),
            clock: None,
        }
    }

    pub fn opts(mut self, opts: SchedulerOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn features(mut self, features: RequestedFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate options and resolve every stage. Fails closed on any missing stage.
    pub fn build(mut self) -> SplitResult<SplitKernelScheduler<D>> {
        self.opts.validate()?;
        check_device(&self.device)?;
        let registry = StageRegistry::load(&mut self.device, &self.features)?;
        let avg = RollingAverage::new(self.opts.rolling_alpha);
        Ok(SplitKernelScheduler {
            device: self.device,
            opts: self.opts,
            registry,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::default())),
            avg_time_per_sample: avg,
            lifecycle: Lifecycle::Uninitialized,
        })
    }
}

/// Host-side driver of the wavefront path tracer.
///
/// Renders a tile in sample batches. Each batch resets the shared state, runs data-init and
/// path-init, then dispatches bursts of path iterations until every lane reads inactive. Batch
/// size follows a rolling average of the observed time per sample.
pub struct SplitKernelScheduler<D: SplitDevice> {
    device: D,
    opts: SchedulerOpts,
    registry: StageRegistry,
    clock: Arc<dyn Clock>,
    avg_time_per_sample: RollingAverage,
    lifecycle: Lifecycle,
}

impl<D: SplitDevice> SplitKernelScheduler<D> {
    pub fn builder(device: D) -> SchedulerBuilder<D> {
        SchedulerBuilder::new(device)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn opts(&self) -> &SchedulerOpts {
        &self.opts
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Rolling average of seconds per sample, `0.0` before the first batch.
    pub fn avg_time_per_sample(&self) -> f64 {
        self.avg_time_per_sample.get()
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Allocated(_))
    }

    pub fn layout(&self) -> Option<&StateLayout> {
        match &self.lifecycle {
            Lifecycle::Allocated(a) => Some(&a.layout),
            Lifecycle::Uninitialized => None,
        }
    }

    pub fn global_size(&self) -> Option<GlobalSizePlan> {
        match &self.lifecycle {
            Lifecycle::Allocated(a) => Some(a.plan),
            Lifecycle::Uninitialized => None,
        }
    }

    /// Re-resolve every stage for `features`. The current stages stay in place on failure.
    ///
    /// Once the state buffer exists its shading blocks are sized for the original closure
    /// count, so a larger `max_closure` needs a new scheduler.
    pub fn reload_stages(&mut self, features: &RequestedFeatures) -> SplitResult<()> {
        if let Lifecycle::Allocated(a) = &self.lifecycle
            && features.max_closure > a.layout.max_closures
        {
            return Err(SplitError::validation(format!(
                "state buffer was laid out for {} closures, {} requested",
                a.layout.max_closures, features.max_closure
            )));
        }
        self.registry = StageRegistry::load(&mut self.device, features)?;
        Ok(())
    }

    /// Render every remaining sample of `tile`.
    ///
    /// Returns `Ok` with `cancelled == true` when the task is cancelled; `tile.sample` then
    /// marks the last completed batch. Device failures abort immediately without retry.
    #[tracing::instrument(
        skip(self, task, tile, buffers),
        fields(x = tile.x, y = tile.y, w = tile.w, h = tile.h, samples = tile.num_samples)
    )]
    pub fn path_trace(
        &mut self,
        task: &mut dyn RenderTask,
        tile: &mut RenderTile,
        buffers: StageBuffers,
    ) -> SplitResult<TraceStats> {
        check_device(&self.device)?;
        tile.validate()?;

        let Self {
            device,
            opts,
            registry,
            clock,
            avg_time_per_sample,
            lifecycle,
        } = self;

        if let Lifecycle::Uninitialized = lifecycle {
            let alloc = SplitAllocation::allocate(device, opts, registry.max_closure(), tile)?;
            *lifecycle = Lifecycle::Allocated(Box::new(alloc));
        }
        let Lifecycle::Allocated(alloc) = lifecycle else {
            return Err(SplitError::device("split kernel state is not allocated"));
        };
        warn_on_grid_change(device, opts, registry.max_closure(), alloc, tile);

        let dims = alloc.plan.dims();
        let shadow_dims = alloc.plan.shadow_dims();
        let num_global_elements = alloc.plan.num_global_elements();

        let mut stats = TraceStats::default();
        let mut sizer = BatchSizer::new(opts.initial_num_samples, opts.max_time_multiplier);
        let mut cancel = CancelWindow::new(opts.cancel_grace_factor);
        let end_sample = tile.end_sample();
        tile.sample = tile.start_sample;

        while tile.sample < end_sample {
            let start_time = clock.now_secs();

            let mut num_samples = sizer.samples_per_batch(avg_time_per_sample);
            if let Some(adaptive) = task.adaptive_sampling() {
                num_samples = adaptive.align_samples(tile.sample, num_samples);
            }
            num_samples = num_samples.min(end_sample - tile.sample);
            let subtile = tile.subtile(tile.sample, num_samples);
            tracing::debug!(
                sample = tile.sample,
                num_samples,
                time_multiplier = sizer.time_multiplier(),
                avg_time_per_sample = avg_time_per_sample.get(),
                "starting sample batch"
            );

            check_device(device)?;
            // Data-init does not necessarily cover the whole allocation.
            alloc.reset(device)?;

            device.enqueue_data_init(
                dims,
                &DataInitArgs {
                    subtile: &subtile,
                    num_global_elements,
                    queue_size: num_global_elements,
                    layout: &alloc.layout,
                    split_data: alloc.split_data.handle()?,
                    ray_state: alloc.ray_state.handle()?,
                    queue_index: alloc.queue_index.handle()?,
                    use_queues_flag: alloc.use_queues_flag.handle()?,
                    work_pool_wgs: alloc.work_pool_wgs.handle()?,
                    buffers,
                },
            )?;
            check_device(device)?;
            enqueue_stage(device, registry, SplitStage::PathInit, dims, buffers)?;

            let mut active_rays = true;
            while active_rays {
                for _ in 0..opts.path_iterations_per_burst {
                    for stage in SplitStage::PATH_ITERATION {
                        let d = if stage.uses_shadow_grid() {
                            shadow_dims
                        } else {
                            dims
                        };
                        enqueue_stage(device, registry, stage, d, buffers)?;
                    }
                }
                stats.bursts += 1;
                if cancel.should_stop(task, &**clock, avg_time_per_sample) {
                    stats.cancelled = true;
                    return Ok(stats);
                }

                active_rays = match alloc.read_status(device)? {
                    Convergence::Converged => false,
                    Convergence::Pending { .. } => true,
                };
                if cancel.should_stop(task, &**clock, avg_time_per_sample) {
                    stats.cancelled = true;
                    return Ok(stats);
                }
            }

            let time_per_sample = (clock.now_secs() - start_time) / f64::from(num_samples);
            avg_time_per_sample.observe(time_per_sample);

            tile.sample += num_samples;
            task.update_progress(tile, tile.pixels() * u64::from(num_samples));
            stats.batches += 1;
            stats.samples_rendered += num_samples;

            sizer.ramp();

            if task.get_cancel() {
                stats.cancelled = true;
                return Ok(stats);
            }
        }

        Ok(stats)
    }
}

impl<D: SplitDevice> Drop for SplitKernelScheduler<D> {
    fn drop(&mut self) {
        if let Lifecycle::Allocated(alloc) = &mut self.lifecycle {
            alloc.free(&mut self.device);
        }
    }
}

fn enqueue_stage<D: SplitDevice + ?Sized>(
    device: &mut D,
    registry: &StageRegistry,
    stage: SplitStage,
    dims: KernelDimensions,
    buffers: StageBuffers,
) -> SplitResult<()> {
    check_device(device)?;
    registry.handle(stage).enqueue(device, dims, buffers)?;
    check_device(device)
}

/// Later tiles reuse the first tile's grid; the work pool spreads any size over it.
fn warn_on_grid_change<D: SplitDevice + ?Sized>(
    device: &mut D,
    opts: &SchedulerOpts,
    max_closures: u32,
    alloc: &SplitAllocation,
    tile: &RenderTile,
) {
    let schema = opts.schema();
    let requested = device.split_kernel_global_size(&GridRequest {
        tile,
        schema: &schema,
        max_closures,
        aux_per_lane: opts.per_thread_output_size,
    });
    if let Ok(requested) = requested
        && requested != alloc.requested
    {
        tracing::warn!(
            allocated = %alloc.requested,
            requested = %requested,
            "tile requests a different split grid; reusing the allocated one"
        );
    }
}

/// Cancellation with an optional grace period measured in average sample times.
struct CancelWindow {
    grace_factor: f64,
    deadline: Option<f64>,
}

impl CancelWindow {
    fn new(grace_factor: f64) -> Self {
        Self {
            grace_factor,
            deadline: None,
        }
    }

    fn should_stop(&mut self, task: &dyn RenderTask, clock: &dyn Clock, avg: &RollingAverage) -> bool {
        if self.deadline.is_none() && task.get_cancel() {
            self.deadline = Some(clock.now_secs() + self.grace_factor * avg.get());
        }
        self.deadline.is_some_and(|d| clock.now_secs() >= d)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::device::capability::{
    BufferHandle, DataInitArgs, GridRequest, KernelDimensions, KernelStageHandle, MemFlags,
    SplitDevice, StageBuffers,
};
use crate::foundation::core::Int2;
use crate::foundation::error::{SplitError, SplitResult};
use crate::kernel::features::RequestedFeatures;
use crate::schedule::planner::global_size_for_memory_budget;
use crate::schedule::task::RenderTile;
use crate::state::layout::StateLayout;
use crate::state::ray_state::RayState;
use crate::state::schema::WORK_POOL_SIZE_CPU;

/// Body of a host stage. Errors become the device's sticky error.
pub type HostProgram = Arc<dyn Fn(&mut HostLaunch<'_>) -> Result<(), String> + Send + Sync>;

/// Wrap a closure as a [`HostProgram`].
pub fn host_program<F>(f: F) -> HostProgram
where
    F: Fn(&mut HostLaunch<'_>) -> Result<(), String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How [`HostDevice`] answers `split_kernel_global_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridPolicy {
    /// One lane per tile pixel.
    TilePixels,
    /// Size the grid from a memory budget, half of which goes to the state buffer.
    MemoryBudget { free_bytes: u64 },
}

/// Counters recorded by [`HostDevice`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct HostDeviceStats {
    pub allocs: u64,
    pub frees: u64,
    pub zeroes: u64,
    pub copies_from: u64,
    pub data_inits: u64,
    pub enqueues: u64,
    pub live_bytes: u64,
    pub peak_bytes: u64,
    pub enqueues_by_kernel: BTreeMap<String, u64>,
    /// Names passed to `mem_alloc`, in call order.
    pub alloc_names: Vec<String>,
}

#[derive(Debug)]
struct HostBuffer {
    name: String,
    bytes: Vec<u8>,
}

/// Buffers and batch parameters bound by the last data-init.
#[derive(Clone, Debug)]
struct Binding {
    subtile: RenderTile,
    num_global_elements: u64,
    layout: StateLayout,
    split_data: BufferHandle,
    ray_state: BufferHandle,
    queue_index: BufferHandle,
    use_queues_flag: BufferHandle,
    work_pool_wgs: BufferHandle,
}

impl Binding {
    fn from_args(args: &DataInitArgs<'_>) -> Self {
        Self {
            subtile: args.subtile.clone(),
            num_global_elements: args.num_global_elements,
            layout: args.layout.clone(),
            split_data: args.split_data,
            ray_state: args.ray_state,
            queue_index: args.queue_index,
            use_queues_flag: args.use_queues_flag,
            work_pool_wgs: args.work_pool_wgs,
        }
    }
}

/// Mutable views a host stage gets over the bound state.
pub struct LaneViews<'b> {
    /// One status byte per lane.
    pub ray_state: &'b mut [u8],
    /// The whole split state arena; carve it with `layout`.
    pub arena: &'b mut [u8],
    pub layout: &'b StateLayout,
    pub subtile: &'b RenderTile,
    pub num_global_elements: u64,
}

/// Execution context of one host dispatch.
pub struct HostLaunch<'a> {
    kernel: &'a str,
    dims: KernelDimensions,
    binding: &'a Binding,
    buffers: &'a mut HashMap<BufferHandle, HostBuffer>,
}

impl<'a> HostLaunch<'a> {
    pub fn kernel(&self) -> &str {
        self.kernel
    }

    pub fn dims(&self) -> KernelDimensions {
        self.dims
    }

    pub fn subtile(&self) -> &RenderTile {
        &self.binding.subtile
    }

    pub fn layout(&self) -> &StateLayout {
        &self.binding.layout
    }

    pub fn num_global_elements(&self) -> u64 {
        self.binding.num_global_elements
    }

    fn buffer_mut(&mut self, h: BufferHandle) -> Result<&mut [u8], String> {
        self.buffers
            .get_mut(&h)
            .map(|b| b.bytes.as_mut_slice())
            .ok_or_else(|| format!("{}: unknown buffer {h:?}", self.kernel))
    }

    pub fn ray_state_mut(&mut self) -> Result<&mut [u8], String> {
        self.buffer_mut(self.binding.ray_state)
    }

    pub fn queue_index_mut(&mut self) -> Result<&mut [u8], String> {
        self.buffer_mut(self.binding.queue_index)
    }

    pub fn use_queues_flag_mut(&mut self) -> Result<&mut [u8], String> {
        self.buffer_mut(self.binding.use_queues_flag)
    }

    pub fn work_pool_mut(&mut self) -> Result<&mut [u8], String> {
        self.buffer_mut(self.binding.work_pool_wgs)
    }

    /// Status bytes and state arena at once.
    pub fn lanes_mut(&mut self) -> Result<LaneViews<'_>, String> {
        let binding: &'a Binding = self.binding;
        let [ray_state, arena] = self
            .buffers
            .get_disjoint_mut([&binding.ray_state, &binding.split_data]);
        let (Some(ray_state), Some(arena)) = (ray_state, arena) else {
            return Err(format!("{}: state buffers are not allocated", self.kernel));
        };
        Ok(LaneViews {
            ray_state: &mut ray_state.bytes,
            arena: &mut arena.bytes,
            layout: &binding.layout,
            subtile: &binding.subtile,
            num_global_elements: binding.num_global_elements,
        })
    }
}

/// In-process [`SplitDevice`] that runs stages as host programs.
///
/// Used as the reference device by the CLI and by tests: it records every memory and dispatch
/// call, and can inject allocation limits and stage failures.
pub struct HostDevice {
    name: String,
    buffers: HashMap<BufferHandle, HostBuffer>,
    next_buffer: u64,
    programs: BTreeMap<String, HostProgram>,
    issued: HashMap<u64, String>,
    next_kernel: u64,
    data_init: HostProgram,
    supported: RequestedFeatures,
    error: Option<String>,
    stats: HostDeviceStats,
    memory_limit: Option<u64>,
    local_size: Int2,
    grid: GridPolicy,
    work_pool_size: u32,
    binding: Option<Binding>,
    fail_after: Option<(String, u64)>,
}

impl std::fmt::Debug for HostDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostDevice")
            .field("name", &self.name)
            .field("buffers", &self.buffers.len())
            .field("programs", &self.programs.keys().collect::<Vec<_>>())
            .field("error", &self.error)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new("host")
    }
}

/// Default data-init: every lane starts active, queues empty, queue mode off.
fn default_data_init(launch: &mut HostLaunch<'_>) -> Result<(), String> {
    launch.ray_state_mut()?.fill(RayState::Active.as_byte());
    launch.queue_index_mut()?.fill(0);
    launch.use_queues_flag_mut()?.fill(0);
    Ok(())
}

impl HostDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffers: HashMap::new(),
            next_buffer: 1,
            programs: BTreeMap::new(),
            issued: HashMap::new(),
            next_kernel: 1,
            data_init: host_program(default_data_init),
            supported: RequestedFeatures::all(),
            error: None,
            stats: HostDeviceStats::default(),
            memory_limit: None,
            local_size: Int2::new(32, 1),
            grid: GridPolicy::TilePixels,
            work_pool_size: WORK_POOL_SIZE_CPU,
            binding: None,
            fail_after: None,
        }
    }

    pub fn with_program(mut self, name: impl Into<String>, program: HostProgram) -> Self {
        self.programs.insert(name.into(), program);
        self
    }

    pub fn with_data_init(mut self, program: HostProgram) -> Self {
        self.data_init = program;
        self
    }

    pub fn with_supported_features(mut self, supported: RequestedFeatures) -> Self {
        self.supported = supported;
        self
    }

    /// Reject allocations that would push live bytes above `bytes`.
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_local_size(mut self, local: Int2) -> Self {
        self.local_size = local;
        self
    }

    pub fn with_grid_policy(mut self, grid: GridPolicy) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_work_pool_size(mut self, size: u32) -> Self {
        self.work_pool_size = size;
        self
    }

    /// Make the `n`-th enqueue (1-based) of `kernel` fail.
    pub fn fail_kernel_on(mut self, kernel: impl Into<String>, n: u64) -> Self {
        self.fail_after = Some((kernel.into(), n));
        self
    }

    pub fn register_program(&mut self, name: impl Into<String>, program: HostProgram) {
        self.programs.insert(name.into(), program);
    }

    pub fn remove_program(&mut self, name: &str) -> Option<HostProgram> {
        self.programs.remove(name)
    }

    pub fn stats(&self) -> &HostDeviceStats {
        &self.stats
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Host copy of a live buffer.
    pub fn read_buffer(&self, h: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&h).map(|b| b.bytes.as_slice())
    }

    fn buffer_mut(&mut self, h: BufferHandle) -> SplitResult<&mut HostBuffer> {
        self.buffers
            .get_mut(&h)
            .ok_or_else(|| SplitError::device(format!("unknown buffer {h:?}")))
    }

    fn fail(&mut self, msg: String) -> SplitError {
        tracing::debug!(device = %self.name, error = %msg, "host device error");
        if self.error.is_none() {
            self.error = Some(msg.clone());
        }
        SplitError::device(msg)
    }

    fn run(
        &mut self,
        kernel: &str,
        program: &HostProgram,
        dims: KernelDimensions,
    ) -> SplitResult<()> {
        let result = match self.binding.as_ref() {
            Some(binding) => {
                let mut launch = HostLaunch {
                    kernel,
                    dims,
                    binding,
                    buffers: &mut self.buffers,
                };
                program(&mut launch)
            }
            None => Err(format!("{kernel}: enqueued before data init")),
        };
        result.map_err(|msg| self.fail(msg))
    }
}

impl SplitDevice for HostDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn mem_alloc(
        &mut self,
        name: &str,
        size_bytes: u64,
        _flags: MemFlags,
    ) -> SplitResult<BufferHandle> {
        self.stats.allocs += 1;
        self.stats.alloc_names.push(name.to_string());
        if let Some(limit) = self.memory_limit
            && self.stats.live_bytes.saturating_add(size_bytes) > limit
        {
            return Err(self.fail(format!(
                "out of memory allocating '{name}' ({size_bytes} bytes, limit {limit})"
            )));
        }
        let len = usize::try_from(size_bytes)
            .map_err(|_| SplitError::device(format!("'{name}' is too large for host memory")))?;

        let h = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(
            h,
            HostBuffer {
                name: name.to_string(),
                bytes: vec![0; len],
            },
        );
        self.stats.live_bytes += size_bytes;
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);
        Ok(h)
    }

    fn mem_free(&mut self, buffer: BufferHandle) {
        if let Some(b) = self.buffers.remove(&buffer) {
            self.stats.frees += 1;
            self.stats.live_bytes = self.stats.live_bytes.saturating_sub(b.bytes.len() as u64);
            tracing::trace!(name = %b.name, "freed host buffer");
        }
    }

    fn mem_zero(&mut self, buffer: BufferHandle) -> SplitResult<()> {
        self.stats.zeroes += 1;
        self.buffer_mut(buffer)?.bytes.fill(0);
        Ok(())
    }

    fn mem_copy_from(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        dst: &mut [u8],
    ) -> SplitResult<()> {
        self.stats.copies_from += 1;
        let b = self.buffer_mut(buffer)?;
        let start = offset as usize;
        let Some(src) = b.bytes.get(start..start + dst.len()) else {
            let msg = format!("copy out of range for '{}'", b.name);
            return Err(self.fail(msg));
        };
        dst.copy_from_slice(src);
        Ok(())
    }

    fn have_error(&self) -> bool {
        self.error.is_some()
    }

    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn set_error(&mut self, msg: &str) {
        if self.error.is_none() {
            self.error = Some(msg.to_string());
        }
    }

    fn get_split_kernel_function(
        &mut self,
        name: &str,
        features: &RequestedFeatures,
    ) -> Option<KernelStageHandle> {
        if !features.is_subset_of(&self.supported) {
            tracing::debug!(kernel = name, "requested features not supported by host device");
            return None;
        }
        if !self.programs.contains_key(name) {
            return None;
        }
        let id = self.next_kernel;
        self.next_kernel += 1;
        self.issued.insert(id, name.to_string());
        Some(KernelStageHandle::new(name, id))
    }

    fn enqueue_kernel(
        &mut self,
        kernel: &KernelStageHandle,
        dims: KernelDimensions,
        _buffers: StageBuffers,
    ) -> SplitResult<()> {
        if self.error.is_some() {
            return Err(SplitError::device(self.error.clone().unwrap_or_default()));
        }
        let Some(name) = self.issued.get(&kernel.id()).cloned() else {
            return Err(self.fail(format!("kernel handle {} was not issued here", kernel.id())));
        };
        let Some(program) = self.programs.get(&name).cloned() else {
            return Err(self.fail(format!("kernel '{name}' was unloaded")));
        };

        self.stats.enqueues += 1;
        let count = self.stats.enqueues_by_kernel.entry(name.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        let injected = matches!(&self.fail_after, Some((f, n)) if *f == name && *n == count);
        if injected {
            return Err(self.fail(format!("injected failure in kernel '{name}'")));
        }

        self.run(&name, &program, dims)
    }

    fn enqueue_data_init(
        &mut self,
        dims: KernelDimensions,
        args: &DataInitArgs<'_>,
    ) -> SplitResult<()> {
        if self.error.is_some() {
            return Err(SplitError::device(self.error.clone().unwrap_or_default()));
        }
        self.stats.data_inits += 1;
        self.binding = Some(Binding::from_args(args));
        let program = self.data_init.clone();
        self.run("data_init", &program, dims)
    }

    fn split_kernel_local_size(&self) -> Int2 {
        self.local_size
    }

    fn split_kernel_global_size(&mut self, request: &GridRequest<'_>) -> SplitResult<Int2> {
        match self.grid {
            GridPolicy::TilePixels => Ok(Int2::new(request.tile.w, request.tile.h)),
            GridPolicy::MemoryBudget { free_bytes } => global_size_for_memory_budget(
                request.schema,
                request.max_closures,
                request.aux_per_lane,
                free_bytes,
            ),
        }
    }

    fn work_pool_size(&self) -> u32 {
        self.work_pool_size
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/host.rs"]
mod tests;

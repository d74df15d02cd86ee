use crate::foundation::core::Int2;
use crate::foundation::error::{SplitError, SplitResult};
use crate::kernel::features::RequestedFeatures;
use crate::schedule::task::RenderTile;
use crate::state::layout::{StateLayout, StateSchema};
use crate::state::schema::WORK_POOL_SIZE_GPU;

/// Opaque device allocation handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Access pattern of a device allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemFlags {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

/// Global/local work sizes of one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelDimensions {
    pub global_size: Int2,
    pub local_size: Int2,
}

impl KernelDimensions {
    pub fn new(global_size: Int2, local_size: Int2) -> Self {
        Self {
            global_size,
            local_size,
        }
    }

    /// Number of work items covered by the global size.
    pub fn work_items(&self) -> u64 {
        self.global_size.area()
    }
}

/// Kernel-globals and kernel-data buffers forwarded unchanged to every stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageBuffers {
    pub kernel_globals: Option<BufferHandle>,
    pub kernel_data: Option<BufferHandle>,
}

/// A resolved, dispatchable stage.
///
/// Handles are plain tokens minted by [`SplitDevice::get_split_kernel_function`]; dispatch
/// always goes back through the device that issued them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KernelStageHandle {
    name: String,
    id: u64,
}

impl KernelStageHandle {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Enqueue this stage on `device`.
    pub fn enqueue<D: SplitDevice + ?Sized>(
        &self,
        device: &mut D,
        dims: KernelDimensions,
        buffers: StageBuffers,
    ) -> SplitResult<()> {
        device.enqueue_kernel(self, dims, buffers)
    }
}

/// Arguments of the data-init entry point.
#[derive(Clone, Copy, Debug)]
pub struct DataInitArgs<'a> {
    /// Sample range and pixel rectangle for this batch.
    pub subtile: &'a RenderTile,
    pub num_global_elements: u64,
    pub queue_size: u64,
    pub layout: &'a StateLayout,
    pub split_data: BufferHandle,
    pub ray_state: BufferHandle,
    pub queue_index: BufferHandle,
    pub use_queues_flag: BufferHandle,
    pub work_pool_wgs: BufferHandle,
    pub buffers: StageBuffers,
}

/// Inputs a device may use to choose the split kernel's global size.
#[derive(Clone, Copy, Debug)]
pub struct GridRequest<'a> {
    pub tile: &'a RenderTile,
    pub schema: &'a StateSchema,
    pub max_closures: u32,
    pub aux_per_lane: u64,
}

/// Capabilities the split-kernel scheduler needs from a compute device.
///
/// Besides the `SplitResult` of each call, devices keep a sticky error flag
/// ([`have_error`](SplitDevice::have_error)) for failures that surface asynchronously.
pub trait SplitDevice {
    fn name(&self) -> &str;

    fn mem_alloc(&mut self, name: &str, size_bytes: u64, flags: MemFlags)
    -> SplitResult<BufferHandle>;

    fn mem_free(&mut self, buffer: BufferHandle);

    fn mem_zero(&mut self, buffer: BufferHandle) -> SplitResult<()>;

    /// Blocking copy of `dst.len()` bytes starting at `offset` into host memory.
    fn mem_copy_from(&mut self, buffer: BufferHandle, offset: u64, dst: &mut [u8])
    -> SplitResult<()>;

    fn have_error(&self) -> bool;

    fn error_message(&self) -> Option<&str>;

    fn set_error(&mut self, msg: &str);

    /// Resolve a stage by name for `features`, or `None` when it is not available.
    fn get_split_kernel_function(
        &mut self,
        name: &str,
        features: &RequestedFeatures,
    ) -> Option<KernelStageHandle>;

    fn enqueue_kernel(
        &mut self,
        kernel: &KernelStageHandle,
        dims: KernelDimensions,
        buffers: StageBuffers,
    ) -> SplitResult<()>;

    /// Assign pixel samples to lanes and initialize the status, queue and flag buffers.
    fn enqueue_data_init(&mut self, dims: KernelDimensions, args: &DataInitArgs<'_>)
    -> SplitResult<()>;

    fn split_kernel_local_size(&self) -> Int2 {
        Int2::new(32, 1)
    }

    /// Requested (not yet rounded) global size. Defaults to one lane per tile pixel.
    fn split_kernel_global_size(&mut self, request: &GridRequest<'_>) -> SplitResult<Int2> {
        Ok(Int2::new(request.tile.w, request.tile.h))
    }

    fn work_pool_size(&self) -> u32 {
        WORK_POOL_SIZE_GPU
    }
}

/// Fail with the device's sticky error, if one is set.
pub fn check_device<D: SplitDevice + ?Sized>(device: &D) -> SplitResult<()> {
    if device.have_error() {
        return Err(SplitError::device(
            device.error_message().unwrap_or("unknown device error"),
        ));
    }
    Ok(())
}

//! Host-side scheduler for a wavefront ("split kernel") path tracer.
//!
//! Path tracing is broken into ten stages that run over a fixed grid of lanes sharing one state
//! buffer. The scheduler:
//!
//! - plans the dispatch grid and lays out the per-lane state buffer
//! - resolves every stage once through a [`SplitDevice`]
//! - renders tiles in adaptively sized sample batches until every lane goes inactive
#![forbid(unsafe_code)]

pub mod device;
pub mod foundation;
pub mod kernel;
pub mod schedule;
pub mod state;

pub use crate::foundation::core::Int2;
pub use crate::foundation::error::{SplitError, SplitResult};

pub use crate::device::capability::{
    BufferHandle, DataInitArgs, GridRequest, KernelDimensions, KernelStageHandle, MemFlags,
    SplitDevice, StageBuffers,
};
pub use crate::device::host::{GridPolicy, HostDevice, HostDeviceStats, HostLaunch, HostProgram};
pub use crate::device::synthetic::SyntheticPipeline;
pub use crate::kernel::features::RequestedFeatures;
pub use crate::kernel::registry::StageRegistry;
pub use crate::kernel::stage::SplitStage;
pub use crate::schedule::opts::SchedulerOpts;
pub use crate::schedule::planner::GlobalSizePlan;
pub use crate::schedule::scheduler::{SchedulerBuilder, SplitKernelScheduler, TraceStats};
pub use crate::schedule::task::{AdaptiveSampling, RenderTask, RenderTile, TileTask};
pub use crate::schedule::timing::{Clock, ManualClock, MonotonicClock};
pub use crate::state::layout::{StateLayout, StateSchema, SubArray, compute_layout};
pub use crate::state::ray_state::RayState;

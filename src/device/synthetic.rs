use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::device::host::{HostDevice, HostLaunch, HostProgram, host_program};
use crate::kernel::stage::SplitStage;
use crate::schedule::timing::ManualClock;
use crate::state::ray_state::{
    RAY_SHADOW_RAY_CAST_DL, RayState, add_flag, has_flag, is_state, remove_flag,
};
use crate::state::layout::StateLayout;
use crate::state::schema::StateField;

const REMAINING: std::ops::Range<usize> = 0..4;
const ITEM: std::ops::Range<usize> = 4..12;

/// Stage programs for [`HostDevice`] that model path lifetimes without shading anything.
///
/// Every pixel sample of the subtile is one path of `bounces` iterations. Lanes pull paths from
/// a strided work pool: lane `i` starts on path `i`, then `i + lanes`, and so on, so tiles larger
/// than the grid still drain. Paths live in the `path_state` sub-array of the arena.
#[derive(Clone, Debug)]
pub struct SyntheticPipeline {
    bounces: u32,
    completed: Arc<AtomicU64>,
    clock: Option<Arc<ManualClock>>,
    secs_per_sample: f64,
}

impl SyntheticPipeline {
    pub fn new(bounces: u32) -> Self {
        Self {
            bounces: bounces.max(1),
            completed: Arc::new(AtomicU64::new(0)),
            clock: None,
            secs_per_sample: 0.0,
        }
    }

    /// Advance `clock` by `secs_per_sample` per sample on every path-init.
    pub fn with_clock(mut self, clock: Arc<ManualClock>, secs_per_sample: f64) -> Self {
        self.clock = Some(clock);
        self.secs_per_sample = secs_per_sample;
        self
    }

    /// Paths finished since this pipeline was created.
    pub fn completed_paths(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Register a program for every stage.
    pub fn install(&self, device: &mut HostDevice) {
        for stage in SplitStage::ALL {
            device.register_program(stage.name(), self.program(stage));
        }
    }

    pub fn program(&self, stage: SplitStage) -> HostProgram {
        match stage {
            SplitStage::PathInit => {
                let this = self.clone();
                host_program(move |launch| this.path_init(launch))
            }
            SplitStage::DirectLighting => host_program(direct_lighting),
            SplitStage::ShadowBlocked => host_program(shadow_blocked),
            SplitStage::NextIterationSetup => {
                let this = self.clone();
                host_program(move |launch| this.next_iteration_setup(launch))
            }
            _ => host_program(|_| Ok(())),
        }
    }

    fn path_init(&self, launch: &mut HostLaunch<'_>) -> Result<(), String> {
        let bounces = self.bounces;
        let mut views = launch.lanes_mut()?;
        let total = views.subtile.pixels() * u64::from(views.subtile.num_samples);
        let stride = path_state_stride(views.layout)?;
        let paths = views
            .layout
            .slice_mut(StateField::PathState, views.arena)
            .map_err(|e| e.to_string())?;

        views
            .ray_state
            .par_iter_mut()
            .zip(paths.par_chunks_mut(stride))
            .enumerate()
            .for_each(|(lane, (status, path))| {
                let lane = lane as u64;
                if lane < total {
                    *status = RayState::Active.as_byte();
                    write_u32(&mut path[REMAINING], bounces);
                    write_u64(&mut path[ITEM], lane);
                } else {
                    *status = RayState::Inactive.as_byte();
                }
            });

        if let Some(clock) = &self.clock {
            clock.advance(self.secs_per_sample * f64::from(launch.subtile().num_samples));
        }
        Ok(())
    }

    fn next_iteration_setup(&self, launch: &mut HostLaunch<'_>) -> Result<(), String> {
        let bounces = self.bounces;
        let mut views = launch.lanes_mut()?;
        let total = views.subtile.pixels() * u64::from(views.subtile.num_samples);
        let lanes = views.num_global_elements;
        let stride = path_state_stride(views.layout)?;
        let paths = views
            .layout
            .slice_mut(StateField::PathState, views.arena)
            .map_err(|e| e.to_string())?;

        let finished: u64 = views
            .ray_state
            .par_iter_mut()
            .zip(paths.par_chunks_mut(stride))
            .map(|(status, path)| -> u64 {
                if !is_state(*status, RayState::Active) {
                    return 0;
                }
                let remaining = read_u32(&path[REMAINING]).saturating_sub(1);
                if remaining > 0 {
                    write_u32(&mut path[REMAINING], remaining);
                    return 0;
                }
                let next = read_u64(&path[ITEM]) + lanes;
                if next < total {
                    write_u32(&mut path[REMAINING], bounces);
                    write_u64(&mut path[ITEM], next);
                } else {
                    *status = RayState::Inactive.as_byte();
                }
                1
            })
            .sum();

        self.completed.fetch_add(finished, Ordering::Relaxed);
        Ok(())
    }
}

/// Every active lane casts one direct-lighting shadow ray.
fn direct_lighting(launch: &mut HostLaunch<'_>) -> Result<(), String> {
    launch
        .ray_state_mut()?
        .par_iter_mut()
        .filter(|s| is_state(**s, RayState::Active))
        .for_each(|s| add_flag(s, RAY_SHADOW_RAY_CAST_DL));
    Ok(())
}

/// Resolves the shadow rays cast by direct lighting; runs on the doubled grid.
fn shadow_blocked(launch: &mut HostLaunch<'_>) -> Result<(), String> {
    let expected = launch.num_global_elements() * 2;
    let got = launch.dims().work_items();
    if got != expected {
        return Err(format!(
            "shadow_blocked: dispatched {got} work items, expected {expected}"
        ));
    }
    launch
        .ray_state_mut()?
        .par_iter_mut()
        .filter(|s| has_flag(**s, RAY_SHADOW_RAY_CAST_DL))
        .for_each(|s| remove_flag(s, RAY_SHADOW_RAY_CAST_DL));
    Ok(())
}

fn path_state_stride(layout: &StateLayout) -> Result<usize, String> {
    let e = layout
        .field(StateField::PathState)
        .ok_or_else(|| "path_state is not in the layout".to_string())?;
    if (e.stride as usize) < ITEM.end {
        return Err(format!("path_state stride {} is too small", e.stride));
    }
    Ok(e.stride as usize)
}

fn read_u32(b: &[u8]) -> u32 {
    let mut a = [0u8; 4];
    a.copy_from_slice(b);
    u32::from_le_bytes(a)
}

fn write_u32(b: &mut [u8], v: u32) {
    b.copy_from_slice(&v.to_le_bytes());
}

fn read_u64(b: &[u8]) -> u64 {
    let mut a = [0u8; 8];
    a.copy_from_slice(b);
    u64::from_le_bytes(a)
}

fn write_u64(b: &mut [u8], v: u64) {
    b.copy_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
#[path = "../../tests/unit/device/synthetic.rs"]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{SplitError, SplitResult};

/// A rectangular pixel region and the sample range to render into it.
///
/// The scheduler only mutates `sample`, the first sample not yet rendered.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderTile {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub start_sample: u32,
    pub num_samples: u32,
    pub sample: u32,
    /// Render-buffer offset and row stride, forwarded to data-init.
    #[serde(default)]
    pub offset: i32,
    #[serde(default)]
    pub stride: i32,
}

impl RenderTile {
    /// Widths past `i32::MAX` saturate `stride`; [`validate`](Self::validate) rejects them.
    pub fn new(x: i32, y: i32, w: u32, h: u32, start_sample: u32, num_samples: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            start_sample,
            num_samples,
            sample: start_sample,
            offset: 0,
            stride: i32::try_from(w).unwrap_or(i32::MAX),
        }
    }

    /// One past the last sample of the tile.
    pub fn end_sample(&self) -> u32 {
        self.start_sample.saturating_add(self.num_samples)
    }

    pub fn remaining_samples(&self) -> u32 {
        self.end_sample().saturating_sub(self.sample)
    }

    pub fn pixels(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }

    /// Copy of the tile restricted to `[start, start + num)`.
    pub fn subtile(&self, start: u32, num: u32) -> Self {
        Self {
            start_sample: start,
            num_samples: num,
            sample: start,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> SplitResult<()> {
        if self.w == 0 || self.h == 0 {
            return Err(SplitError::validation("render tile must have non-zero size"));
        }
        if i32::try_from(self.w).is_err() {
            return Err(SplitError::validation(format!(
                "render tile width {} does not fit an i32 row stride",
                self.w
            )));
        }
        if self.start_sample.checked_add(self.num_samples).is_none() {
            return Err(SplitError::validation("render tile sample range overflows"));
        }
        Ok(())
    }
}

/// Batch alignment for adaptive sampling: batches end on multiples of `adaptive_step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdaptiveSampling {
    /// Power of two.
    pub adaptive_step: u32,
}

impl AdaptiveSampling {
    pub fn new(adaptive_step: u32) -> SplitResult<Self> {
        if !adaptive_step.is_power_of_two() {
            return Err(SplitError::config(format!(
                "adaptive_step must be a power of two, got {adaptive_step}"
            )));
        }
        Ok(Self { adaptive_step })
    }

    /// Shrink `num_samples` so the batch ends on a filtering boundary.
    ///
    /// If no boundary lies inside the batch it is returned unchanged; this never grows a batch.
    pub fn align_samples(&self, sample: u32, num_samples: u32) -> u32 {
        let end = sample.saturating_add(num_samples) & !(self.adaptive_step - 1);
        if end <= sample {
            return num_samples;
        }
        end - sample
    }
}

/// The render task driving a tile: cancellation and progress reporting.
pub trait RenderTask {
    fn get_cancel(&self) -> bool;

    fn update_progress(&mut self, tile: &RenderTile, work_units: u64);

    fn adaptive_sampling(&self) -> Option<AdaptiveSampling> {
        None
    }
}

/// Progress record of one `update_progress` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ProgressUpdate {
    /// `tile.sample` after the batch.
    pub sample: u32,
    pub work_units: u64,
}

/// Basic [`RenderTask`]: a shareable cancel flag plus a progress log.
#[derive(Clone, Debug, Default)]
pub struct TileTask {
    cancel: Arc<AtomicBool>,
    adaptive: Option<AdaptiveSampling>,
    updates: Vec<ProgressUpdate>,
    /// Cancel once this many progress updates have been reported.
    cancel_after_updates: Option<usize>,
}

impl TileTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adaptive_sampling(mut self, adaptive: AdaptiveSampling) -> Self {
        self.adaptive = Some(adaptive);
        self
    }

    pub fn cancel_after_updates(mut self, n: usize) -> Self {
        self.cancel_after_updates = Some(n);
        self
    }

    /// Flag that other threads can set to cancel the render.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn updates(&self) -> &[ProgressUpdate] {
        &self.updates
    }

    pub fn total_work_units(&self) -> u64 {
        self.updates.iter().map(|u| u.work_units).sum()
    }
}

impl RenderTask for TileTask {
    fn get_cancel(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn update_progress(&mut self, tile: &RenderTile, work_units: u64) {
        self.updates.push(ProgressUpdate {
            sample: tile.sample,
            work_units,
        });
        if self
            .cancel_after_updates
            .is_some_and(|n| self.updates.len() >= n)
        {
            self.cancel();
        }
    }

    fn adaptive_sampling(&self) -> Option<AdaptiveSampling> {
        self.adaptive
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/task.rs"]
mod tests;

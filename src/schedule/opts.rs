use std::path::Path;

use crate::foundation::error::{SplitError, SplitResult};
use crate::state::layout::StateSchema;
use crate::state::schema::ElementSizes;

/// Tuning of the adaptive batch scheduler.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SchedulerOpts {
    /// Path iterations dispatched between two status readbacks.
    pub path_iterations_per_burst: u32,
    /// Batch size before any timing is known.
    pub initial_num_samples: u32,
    /// EWMA weight of the newest per-sample time, in `(0, 1]`.
    pub rolling_alpha: f64,
    /// Cap of the doubling time multiplier.
    pub max_time_multiplier: u32,
    /// After cancellation is first seen, keep iterating for this many average sample times.
    /// `0` stops at the first check.
    pub cancel_grace_factor: f64,
    /// Lanes per work-pool group; `None` asks the device.
    pub work_pool_size: Option<u32>,
    /// Per-lane auxiliary output bytes reserved in the state buffer.
    pub per_thread_output_size: u64,
    /// Reserve the per-lane debug block.
    pub debug_data: bool,
    pub element_sizes: ElementSizes,
}

impl Default for SchedulerOpts {
    fn default() -> Self {
        Self {
            path_iterations_per_burst: 16,
            initial_num_samples: 1,
            rolling_alpha: 0.1,
            max_time_multiplier: 10,
            cancel_grace_factor: 0.0,
            work_pool_size: None,
            per_thread_output_size: 0,
            debug_data: false,
            element_sizes: ElementSizes::default(),
        }
    }
}

impl SchedulerOpts {
    pub fn from_json_str(s: &str) -> SplitResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| SplitError::config(format!("scheduler options JSON: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn from_path(path: &Path) -> SplitResult<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            SplitError::config(format!("read scheduler options '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> SplitResult<()> {
        if self.path_iterations_per_burst == 0 {
            return Err(SplitError::config("path_iterations_per_burst must be > 0"));
        }
        if self.initial_num_samples == 0 {
            return Err(SplitError::config("initial_num_samples must be > 0"));
        }
        if !(self.rolling_alpha > 0.0 && self.rolling_alpha <= 1.0) {
            return Err(SplitError::config("rolling_alpha must be in (0, 1]"));
        }
        if self.max_time_multiplier == 0 {
            return Err(SplitError::config("max_time_multiplier must be > 0"));
        }
        if !(self.cancel_grace_factor.is_finite() && self.cancel_grace_factor >= 0.0) {
            return Err(SplitError::config(
                "cancel_grace_factor must be finite and >= 0",
            ));
        }
        if self.work_pool_size == Some(0) {
            return Err(SplitError::config("work_pool_size must be > 0"));
        }
        self.element_sizes.validate()
    }

    pub fn schema(&self) -> StateSchema {
        StateSchema {
            sizes: self.element_sizes,
            debug_data: self.debug_data,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/opts.rs"]
mod tests;

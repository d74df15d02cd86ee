use std::sync::Mutex;
use std::time::Instant;

/// Wall-clock source in seconds. Only differences between readings are meaningful.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> f64;
}

/// [`Clock`] backed by `Instant`.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to. Stage programs advance it to model device cost.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: Mutex<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, dt: f64) {
        let mut s = self.secs.lock().unwrap_or_else(|e| e.into_inner());
        *s += dt;
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        *self.secs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exponentially weighted moving average of seconds per sample.
///
/// The first observation is taken as-is; later ones are blended with weight `alpha`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RollingAverage {
    alpha: f64,
    value: Option<f64>,
}

impl RollingAverage {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn observe(&mut self, sample: f64) {
        self.value = Some(match self.value {
            None => sample,
            Some(avg) => self.alpha * sample + (1.0 - self.alpha) * avg,
        });
    }

    /// Current average, `0.0` before the first observation.
    pub fn get(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn is_warm(&self) -> bool {
        self.value.is_some()
    }
}

/// Chooses samples per batch from the rolling average and ramps the time budget.
///
/// `time_multiplier` is the target batch duration in seconds: it starts at 1 and doubles after
/// every batch up to `max_time_multiplier`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSizer {
    time_multiplier: u32,
    max_time_multiplier: u32,
    initial_num_samples: u32,
}

impl BatchSizer {
    pub fn new(initial_num_samples: u32, max_time_multiplier: u32) -> Self {
        Self {
            time_multiplier: 1,
            max_time_multiplier,
            initial_num_samples,
        }
    }

    pub fn time_multiplier(&self) -> u32 {
        self.time_multiplier
    }

    /// `int(time_multiplier / avg) + 1` once timing is known, the initial guess before.
    pub fn samples_per_batch(&self, avg: &RollingAverage) -> u32 {
        let avg = avg.get();
        if avg > 0.0 {
            // `as` saturates on overflow.
            ((f64::from(self.time_multiplier) / avg) as u32).saturating_add(1)
        } else {
            self.initial_num_samples
        }
    }

    pub fn ramp(&mut self) {
        self.time_multiplier = self
            .time_multiplier
            .saturating_mul(2)
            .min(self.max_time_multiplier);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/timing.rs"]
mod tests;

use crate::foundation::error::{SplitError, SplitResult};

/// Mask selecting the state part of a lane's status byte. The high bits carry flags.
pub const RAY_STATE_MASK: u8 = 0x0F;
/// Lane has a pending ambient-occlusion shadow ray.
pub const RAY_SHADOW_RAY_CAST_AO: u8 = 0x10;
/// Lane has a pending direct-lighting shadow ray.
pub const RAY_SHADOW_RAY_CAST_DL: u8 = 0x20;

/// Per-lane status, one byte per lane in the device status array.
///
/// Only `Active`, `Inactive` and `Invalid` carry meaning for the scheduler; the remaining values
/// are written and consumed by the stage pipeline between two readbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RayState {
    Active = 0,
    Inactive = 1,
    UpdateBuffer = 2,
    HitBackground = 3,
    ToRegenerate = 4,
    Regenerated = 5,
    SkipDirectLighting = 6,
    Invalid = 7,
}

impl RayState {
    /// Decode the state nibble of a status byte. Unknown nibbles return `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte & RAY_STATE_MASK {
            0 => Self::Active,
            1 => Self::Inactive,
            2 => Self::UpdateBuffer,
            3 => Self::HitBackground,
            4 => Self::ToRegenerate,
            5 => Self::Regenerated,
            6 => Self::SkipDirectLighting,
            7 => Self::Invalid,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Exact state comparison on a raw status byte, flags included.
pub fn is_state(byte: u8, state: RayState) -> bool {
    byte == state.as_byte()
}

pub fn has_flag(byte: u8, flag: u8) -> bool {
    byte & flag != 0
}

pub fn add_flag(byte: &mut u8, flag: u8) {
    *byte |= flag;
}

pub fn remove_flag(byte: &mut u8, flag: u8) {
    *byte &= !flag;
}

/// Outcome of scanning one host copy of the status array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Convergence {
    /// Every lane reads `Inactive`.
    Converged,
    /// At least one lane still has work; `first_busy` is its index.
    Pending { first_busy: usize },
}

/// Host-side snapshot of the device status array, refreshed by an explicit readback.
#[derive(Clone, Debug, Default)]
pub struct StatusSnapshot {
    bytes: Vec<u8>,
}

impl StatusSnapshot {
    pub fn new(lanes: usize) -> Self {
        Self {
            bytes: vec![RayState::Inactive.as_byte(); lanes],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Destination buffer for a device readback.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decide whether the batch has converged.
    ///
    /// Scanning stops at the first lane that is not `Inactive`. An `Invalid` lane at that point
    /// is reported as a device error since the pipeline would otherwise never drain.
    pub fn convergence(&self) -> SplitResult<Convergence> {
        let Some(idx) = self
            .bytes
            .iter()
            .position(|&b| !is_state(b, RayState::Inactive))
        else {
            return Ok(Convergence::Converged);
        };
        if is_state(self.bytes[idx], RayState::Invalid) {
            return Err(SplitError::device(format!(
                "split kernel error: invalid ray state (lane {idx})"
            )));
        }
        Ok(Convergence::Pending { first_busy: idx })
    }

    /// Count of lanes currently reading exactly `state`.
    pub fn count(&self, state: RayState) -> usize {
        self.bytes.iter().filter(|&&b| is_state(b, state)).count()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/state/ray_state.rs"]
mod tests;

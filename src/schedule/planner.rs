use crate::device::capability::KernelDimensions;
use crate::foundation::core::{Int2, round_down, round_up};
use crate::foundation::error::{SplitError, SplitResult};
use crate::state::layout::StateSchema;

/// Dispatch grid of the split kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct GlobalSizePlan {
    pub local_size: Int2,
    pub global_size: Int2,
    /// Grid of the shadow stage: two shadow rays per lane along `x`.
    pub global_size_shadow: Int2,
}

impl GlobalSizePlan {
    pub fn num_global_elements(&self) -> u64 {
        self.global_size.area()
    }

    pub fn dims(&self) -> KernelDimensions {
        KernelDimensions::new(self.global_size, self.local_size)
    }

    pub fn shadow_dims(&self) -> KernelDimensions {
        KernelDimensions::new(self.global_size_shadow, self.local_size)
    }
}

/// Round `requested` up to whole work groups of `local_size` and derive the shadow grid.
///
/// Fails if `local_size` has a zero component or either grid does not fit in `u32`.
pub fn plan(local_size: Int2, requested: Int2) -> SplitResult<GlobalSizePlan> {
    validate_local_size(local_size)?;
    let overflow = |what: &str| {
        SplitError::validation(format!(
            "split kernel {what} for requested size {requested} (local size {local_size}) overflows u32"
        ))
    };
    let global_size = Int2::new(
        round_up(requested.x, local_size.x).ok_or_else(|| overflow("global size"))?,
        round_up(requested.y, local_size.y).ok_or_else(|| overflow("global size"))?,
    );
    let shadow_x = global_size
        .x
        .checked_mul(2)
        .ok_or_else(|| overflow("shadow global size"))?;
    Ok(GlobalSizePlan {
        local_size,
        global_size,
        global_size_shadow: Int2::new(shadow_x, global_size.y),
    })
}

pub fn validate_local_size(local_size: Int2) -> SplitResult<()> {
    if local_size.x == 0 || local_size.y == 0 {
        return Err(SplitError::validation(format!(
            "split kernel local size must be >= 1 in both dimensions, got {local_size}"
        )));
    }
    Ok(())
}

/// How many lanes fit in `max_buffer_size` bytes of state.
pub fn max_elements_for_max_buffer_size(
    schema: &StateSchema,
    max_closures: u32,
    aux_per_lane: u64,
    max_buffer_size: u64,
) -> SplitResult<u64> {
    let per_lane = schema.bytes_per_lane(max_closures, aux_per_lane)?.max(1);
    tracing::debug!(bytes = per_lane, "split state element size");
    Ok(max_buffer_size / per_lane)
}

/// Square-ish grid using half of `free_bytes` for the state buffer.
///
/// `x` is a multiple of 32 and `y` a multiple of 16.
pub fn global_size_for_memory_budget(
    schema: &StateSchema,
    max_closures: u32,
    aux_per_lane: u64,
    free_bytes: u64,
) -> SplitResult<Int2> {
    let n = max_elements_for_max_buffer_size(schema, max_closures, aux_per_lane, free_bytes / 2)?;
    let side = round_down(n.isqrt(), 32);
    if side == 0 {
        return Err(SplitError::device(
            "not enough device memory for split kernel state",
        ));
    }
    let rows = round_down(n / side, 16);
    if rows == 0 {
        return Err(SplitError::device(
            "not enough device memory for split kernel state",
        ));
    }
    let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    let size = Int2::new(clamp(side), clamp(rows));
    tracing::debug!(free_bytes, global_size = %size, "global size from memory budget");
    Ok(size)
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/planner.rs"]
mod tests;

use smallvec::SmallVec;

use crate::foundation::core::{STATE_ALIGNMENT, align_up};
use crate::foundation::error::{SplitError, SplitResult};
use crate::state::schema::{DEBUG_ENTRY, ElementSizes, FIXED_ENTRIES, StateField};

/// Placement of one named sub-array inside the state arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SubArray {
    #[serde(serialize_with = "serialize_field")]
    pub field: StateField,
    /// Byte offset from the arena start; always a multiple of 16.
    pub offset: u64,
    /// Bytes per element.
    pub stride: u64,
    /// Elements per lane.
    pub per_lane: u64,
    /// Total elements, `lanes * per_lane`.
    pub count: u64,
    /// Reserved bytes including alignment padding.
    pub reserved: u64,
}

fn serialize_field<S: serde::Serializer>(f: &StateField, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(f.name())
}

impl SubArray {
    /// Bytes actually used by elements, without tail padding.
    pub fn used(&self) -> u64 {
        self.count * self.stride
    }

    pub fn end(&self) -> u64 {
        self.offset + self.reserved
    }
}

/// Schema used to lay out the state arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSchema {
    pub sizes: ElementSizes,
    /// Reserve the optional per-lane debug block.
    pub debug_data: bool,
}

/// Byte layout of the split state buffer for one `(lanes, max_closures, aux)` triple.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct StateLayout {
    pub lanes: u64,
    pub max_closures: u32,
    pub aux_per_lane: u64,
    /// Per-lane `ShaderData` size for `max_closures`.
    pub shader_data_size: u64,
    pub total_size: u64,
    entries: SmallVec<[SubArray; 20]>,
}

impl StateSchema {
    /// Compute the arena layout. Pure; allocation is the caller's job.
    ///
    /// Fails with a validation error when any sub-array size or offset overflows `u64`.
    pub fn compute_layout(
        &self,
        lanes: u64,
        max_closures: u32,
        aux_per_lane: u64,
    ) -> SplitResult<StateLayout> {
        let mut entries = SmallVec::<[SubArray; 20]>::new();
        let mut offset = 0u64;
        let mut push = |field, stride: u64, per_lane: u64| -> Option<()> {
            let count = lanes.checked_mul(per_lane)?;
            let reserved = align_up(count.checked_mul(stride)?, STATE_ALIGNMENT)?;
            entries.push(SubArray {
                field,
                offset,
                stride,
                per_lane,
                count,
                reserved,
            });
            offset = offset.checked_add(reserved)?;
            Some(())
        };
        let overflow = |field: StateField| {
            SplitError::validation(format!(
                "split state layout overflows at '{}' ({lanes} lanes, {max_closures} closures)",
                field.name()
            ))
        };

        for e in FIXED_ENTRIES {
            push(e.field, e.kind.size(&self.sizes), e.per_lane)
                .ok_or_else(|| overflow(e.field))?;
        }
        if self.debug_data {
            push(
                DEBUG_ENTRY.field,
                DEBUG_ENTRY.kind.size(&self.sizes),
                DEBUG_ENTRY.per_lane,
            )
            .ok_or_else(|| overflow(DEBUG_ENTRY.field))?;
        }

        let shader_data_size = self
            .sizes
            .shader_data_size(max_closures)
            .ok_or_else(|| overflow(StateField::ShaderData))?;
        push(StateField::ShaderData, shader_data_size, 1)
            .ok_or_else(|| overflow(StateField::ShaderData))?;
        push(StateField::ShadowShaderData, shader_data_size, 2)
            .ok_or_else(|| overflow(StateField::ShadowShaderData))?;
        push(StateField::PerThreadOutput, aux_per_lane, 1)
            .ok_or_else(|| overflow(StateField::PerThreadOutput))?;

        Ok(StateLayout {
            lanes,
            max_closures,
            aux_per_lane,
            shader_data_size,
            total_size: offset,
            entries,
        })
    }

    /// Average arena bytes per lane, sampled over 1024 lanes to amortize padding.
    pub fn bytes_per_lane(&self, max_closures: u32, aux_per_lane: u64) -> SplitResult<u64> {
        const SAMPLE_LANES: u64 = 1024;
        let layout = self.compute_layout(SAMPLE_LANES, max_closures, aux_per_lane)?;
        Ok(layout.total_size / SAMPLE_LANES)
    }
}

/// Layout with the default schema (no debug block).
pub fn compute_layout(
    lanes: u64,
    max_closures: u32,
    aux_per_lane: u64,
) -> SplitResult<StateLayout> {
    StateSchema::default().compute_layout(lanes, max_closures, aux_per_lane)
}

impl StateLayout {
    pub fn entries(&self) -> &[SubArray] {
        &self.entries
    }

    pub fn field(&self, field: StateField) -> Option<&SubArray> {
        self.entries.iter().find(|e| e.field == field)
    }

    fn require(&self, field: StateField) -> SplitResult<&SubArray> {
        self.field(field).ok_or_else(|| {
            SplitError::validation(format!("state field '{}' is not in layout", field.name()))
        })
    }

    fn check_arena(&self, len: usize) -> SplitResult<()> {
        if (len as u64) < self.total_size {
            return Err(SplitError::validation(format!(
                "state arena is {len} bytes, layout needs {}",
                self.total_size
            )));
        }
        Ok(())
    }

    /// Bytes of `field` inside a host copy of the arena.
    pub fn slice<'a>(&self, field: StateField, arena: &'a [u8]) -> SplitResult<&'a [u8]> {
        self.check_arena(arena.len())?;
        let e = self.require(field)?;
        Ok(&arena[e.offset as usize..(e.offset + e.used()) as usize])
    }

    pub fn slice_mut<'a>(
        &self,
        field: StateField,
        arena: &'a mut [u8],
    ) -> SplitResult<&'a mut [u8]> {
        self.check_arena(arena.len())?;
        let e = self.require(field)?;
        Ok(&mut arena[e.offset as usize..(e.offset + e.used()) as usize])
    }

    /// The elements of `field` owned by `lane` (`per_lane` consecutive elements).
    pub fn lane_slice_mut<'a>(
        &self,
        field: StateField,
        arena: &'a mut [u8],
        lane: u64,
    ) -> SplitResult<&'a mut [u8]> {
        if lane >= self.lanes {
            return Err(SplitError::validation(format!(
                "lane {lane} out of range (lanes={})",
                self.lanes
            )));
        }
        let per_lane_bytes = {
            let e = self.require(field)?;
            (e.per_lane * e.stride) as usize
        };
        let all = self.slice_mut(field, arena)?;
        let start = lane as usize * per_lane_bytes;
        Ok(&mut all[start..start + per_lane_bytes])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/state/layout.rs"]
mod tests;

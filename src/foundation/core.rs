use std::fmt;

/// Byte alignment of every sub-array inside the split state buffer.
pub const STATE_ALIGNMENT: u64 = 16;

/// Two-component unsigned size, used for dispatch grids (`[x, y]`).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Int2 {
    pub x: u32,
    pub y: u32,
}

impl Int2 {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Number of elements covered by the grid, `x * y`.
    pub fn area(self) -> u64 {
        u64::from(self.x) * u64::from(self.y)
    }

    pub fn as_array(self) -> [u32; 2] {
        [self.x, self.y]
    }
}

impl From<[u32; 2]> for Int2 {
    fn from(v: [u32; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl fmt::Display for Int2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Smallest multiple of `multiple` that is `>= value`, or `None` if it does not fit in `u32`.
///
/// `multiple` must be non-zero.
pub fn round_up(value: u32, multiple: u32) -> Option<u32> {
    debug_assert!(multiple > 0, "round_up multiple must be > 0");
    value.div_ceil(multiple).checked_mul(multiple)
}

/// Largest multiple of `multiple` that is `<= value`.
///
/// `multiple` must be non-zero.
pub fn round_down(value: u64, multiple: u64) -> u64 {
    debug_assert!(multiple > 0, "round_down multiple must be > 0");
    (value / multiple) * multiple
}

/// Round a byte size up to `alignment` (a power of two); `None` on overflow.
pub fn align_up(size: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    size.checked_add(alignment - 1).map(|v| v & !(alignment - 1))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;

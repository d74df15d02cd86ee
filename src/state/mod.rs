//! Split state buffer contract: per-lane status bytes and the arena layout.

/// Arena layout calculator.
pub mod layout;
/// Per-lane status values and the host-side convergence scan.
pub mod ray_state;
/// Fixed entry table and element sizes.
pub mod schema;

//! Device capability interface and the in-process host device.

/// Capability trait, handles and dispatch arguments.
pub mod capability;
/// Host-memory implementation of the capability trait.
pub mod host;
/// Owned device allocations.
pub mod memory;
/// Host stage programs that model path lifetimes.
pub mod synthetic;

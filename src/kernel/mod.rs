//! Stage names, feature descriptors and the resolved stage table.

pub mod features;
pub mod registry;
pub mod stage;

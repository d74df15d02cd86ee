/// Grid and byte-size arithmetic shared by the planner and the layout calculator.
pub mod core;
/// Error type and result alias.
pub mod error;

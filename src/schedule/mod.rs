//! Adaptive batch scheduler and its building blocks.

pub mod opts;
/// Global/local dispatch size planning.
pub mod planner;
/// The per-tile render loop.
pub mod scheduler;
pub mod task;
/// Clocks, the rolling sample-time average and batch sizing.
pub mod timing;

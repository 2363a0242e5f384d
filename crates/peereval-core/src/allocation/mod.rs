//! Dynamic point-allocation form engine.

pub mod engine;
pub mod points;

#[cfg(test)]
mod engine_tests;

pub use engine::{Allocation, AllocationEngine, AllocationPhase, AllocationRow, Blocker};
pub use points::{parse_points, validate_points, POINTS_TOLERANCE, TOTAL_POINTS};

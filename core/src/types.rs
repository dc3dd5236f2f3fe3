//! Shared primitive types used across the entire simulation.

/// A simulation step. One step = one simulated month.
pub type Step = u64;

/// Index of an agent within its population.
pub type AgentId = usize;

/// Index of a neighborhood within the market.
pub type NeighborhoodId = usize;

/// The canonical run identifier.
pub type RunId = String;

/// Steps per simulated year. Annual rates are divided by this.
pub const STEPS_PER_YEAR: f64 = 12.0;

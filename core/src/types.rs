//! Shared primitive types used across the entire simulation.

/// A simulation tick. One tick = `ClockConfig::tick_ms` of simulated time.
pub type Tick = u64;

/// Simulated wall-clock time in milliseconds since the run started.
pub type SimMillis = u64;

/// A stable, unique identifier for any entity in the simulation.
pub type EntityId = String;

/// The canonical run identifier.
pub type RunId = String;

/// Whole money units. The café never deals in fractions.
pub type Money = i64;

//! Subsystem trait and the per-tick context.
//!
//! RULE: Every subsystem implements SimSubsystem.
//! The engine calls update() on each registered subsystem
//! in registration order, every tick.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    config::SimConfig,
    economy::EconomyState,
    error::SimResult,
    event::SimEvent,
    obstacle::ObstacleSnapshot,
    rng::SubsystemRng,
    types::{SimMillis, Tick},
};
use std::any::Any;

/// Read-only world state for one tick. Built by the engine after player
/// commands are applied and before any subsystem runs.
pub struct TickContext<'a> {
    pub tick:      Tick,
    /// Simulated time at the end of this tick.
    pub now_ms:    SimMillis,
    pub dt_ms:     SimMillis,
    pub config:    &'a SimConfig,
    pub obstacles: &'a ObstacleSnapshot,
    /// Totals as they stood before this tick's side effects.
    pub economy:   &'a EconomyState,
    /// Shop overlay open: customers and timers freeze.
    pub shop_open: bool,
}

/// The contract every subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per tick by the engine.
    ///
    /// - `ctx`:       the tick's read-only world view
    /// - `events_in`: events emitted earlier this tick (including player
    ///                commands and earlier subsystems)
    /// - `rng`:       this subsystem's deterministic RNG for this tick
    ///
    /// Returns a vec of new events to add to the tick's event log.
    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>>;

    /// For downcasting in tests and tooling only.
    /// Production sim code never uses this.
    fn as_any(&self) -> &dyn Any;
}

//! Shared money and reputation totals.
//!
//! RULE: EconomyState is mutated only inside the engine's tick, once per
//! tick, from the events the subsystems emitted. Subsystems read the
//! pre-tick totals and never hold a mutable reference.

use crate::{
    config::EconomyConfig,
    event::SimEvent,
    types::{Money, Tick},
};
use serde::{Deserialize, Serialize};

/// Where economy side effects land.
pub trait EconomySink {
    fn credit_money(&mut self, amount: Money);
    fn credit_reputation(&mut self, amount: f64);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyState {
    pub money:      Money,
    pub reputation: f64,
}

impl EconomyState {
    pub fn new(config: &EconomyConfig) -> Self {
        Self {
            money:      config.starting_money,
            reputation: config.starting_reputation,
        }
    }

    /// Credit every economy-bearing event in `events`, each exactly once.
    /// Returns an EconomyUpdated event when anything changed.
    pub fn apply_events(&mut self, tick: Tick, events: &[SimEvent]) -> Option<SimEvent> {
        let before = self.clone();

        for event in events {
            match event {
                SimEvent::CustomerPaid { amount, .. } => self.credit_money(*amount),
                SimEvent::ItemInteracted { money, reputation, .. } => {
                    self.credit_money(*money);
                    self.credit_reputation(*reputation);
                }
                SimEvent::WasteCleaned { reputation, .. } => self.credit_reputation(*reputation),
                SimEvent::ObjectPlaced { cost, .. } => self.credit_money(-*cost),
                _ => {}
            }
        }

        if *self == before {
            return None;
        }
        Some(SimEvent::EconomyUpdated {
            tick,
            money: self.money,
            reputation: self.reputation,
            money_delta: self.money - before.money,
            reputation_delta: self.reputation - before.reputation,
        })
    }
}

impl EconomySink for EconomyState {
    fn credit_money(&mut self, amount: Money) {
        self.money += amount;
    }

    fn credit_reputation(&mut self, amount: f64) {
        self.reputation += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> EconomyState {
        EconomyState { money: 100, reputation: 100.0 }
    }

    #[test]
    fn placement_cost_is_debited() {
        let mut eco = state();
        let placed = SimEvent::ObjectPlaced {
            tick: 3,
            object_id: "obj-000001".into(),
            catalog_id: "table".into(),
            tile: crate::grid::TilePos::new(2, 2),
            cost: 50,
        };
        let update = eco.apply_events(3, &[placed]).expect("economy changed");
        assert_eq!(eco.money, 50);
        assert!(matches!(update, SimEvent::EconomyUpdated { money_delta: -50, .. }));
    }

    #[test]
    fn quiet_tick_reports_nothing() {
        let mut eco = state();
        assert!(eco.apply_events(1, &[SimEvent::TickStarted { tick: 1 }]).is_none());
    }
}

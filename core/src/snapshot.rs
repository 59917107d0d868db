//! Snapshot serialization: simulation state to JSON.
//!
//! A snapshot is taken every SNAPSHOT_INTERVAL ticks and written to the
//! store. `CafeView` is the read-only picture a renderer draws between
//! ticks; it is rebuilt on demand and never persisted.

use crate::{
    clock::SimClock,
    customer::Customer,
    economy::EconomyState,
    grid::{Grid, Rect},
    obstacle::PlacedObject,
    types::{EntityId, Money, RunId, SimMillis, Tick},
    waste_subsystem::Waste,
};
use serde::{Deserialize, Serialize};

/// 600 ticks of 16 ms: one snapshot per ~10 s of simulated time.
pub const SNAPSHOT_INTERVAL: Tick = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub run_id:    RunId,
    pub tick:      Tick,
    pub clock:     SimClock,
    pub economy:   EconomyState,
    pub shop_open: bool,
    pub customers: Vec<Customer>,
    pub objects:   Vec<PlacedObject>,
    pub waste:     Vec<Waste>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerView {
    pub customer_id:    EntityId,
    pub cosmetic_index: u64,
    pub x:              i32,
    pub y:              i32,
    pub state:          &'static str,
    pub satisfaction:   i32,
    pub has_paid:       bool,
}

impl CustomerView {
    pub fn from_customer(customer: &Customer, grid: &Grid) -> Self {
        let (x, y) = customer.screen_position(grid);
        Self {
            customer_id:    customer.customer_id.clone(),
            cosmetic_index: customer.cosmetic_index,
            x,
            y,
            state:          customer.state.label(),
            satisfaction:   customer.satisfaction,
            has_paid:       customer.has_paid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectView {
    pub object_id:     EntityId,
    pub label:         String,
    pub bounds:        Rect,
    pub price:         Money,
    /// Highlight the object while a customer is using it.
    pub in_use:        bool,
    /// Set once any customer has used it; stays set.
    pub interacted_at: Option<SimMillis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CafeView {
    pub tick:       Tick,
    pub elapsed_ms: SimMillis,
    pub shop_open:  bool,
    pub money:      Money,
    pub reputation: f64,
    pub customers:  Vec<CustomerView>,
    pub objects:    Vec<ObjectView>,
    pub waste:      Vec<Waste>,
}

//! The event bus: all inter-subsystem communication.
//!
//! RULE: Subsystems communicate ONLY through events.
//! A subsystem may never call another subsystem's functions directly.
//! Economy side effects are carried by events and applied by the engine
//! exactly once, after every subsystem has run.

use crate::{
    command::PlayerCommand,
    grid::TilePos,
    types::{EntityId, Money, RunId, SimMillis, Tick},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during simulation.
/// Variants are appended; never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    TickStarted {
        tick: Tick,
    },
    TickCompleted {
        tick: Tick,
    },
    RunInitialized {
        run_id: RunId,
        seed: u64,
    },

    // ── Player command events ──────────────────────
    /// `sequence` counts submissions from 1 within the run.
    PlayerCommandReceived {
        tick: Tick,
        sequence: u64,
        command: PlayerCommand,
    },
    ShopOpened {
        tick: Tick,
    },
    ShopClosed {
        tick: Tick,
    },
    ObjectPlaced {
        tick: Tick,
        object_id: EntityId,
        catalog_id: String,
        tile: TilePos,
        cost: Money,
    },
    PurchaseRejected {
        tick: Tick,
        catalog_id: String,
        reason: String,
    },
    ObjectRemoved {
        tick: Tick,
        object_id: EntityId,
    },

    // ── Customer lifecycle ─────────────────────────
    CustomerSpawned {
        tick: Tick,
        customer_id: EntityId,
        cosmetic_index: u64,
        satisfaction: i32,
    },
    PaymentStarted {
        tick: Tick,
        customer_id: EntityId,
        started_at_ms: SimMillis,
    },
    CustomerPaid {
        tick: Tick,
        customer_id: EntityId,
        amount: Money,
    },
    ItemInteracted {
        tick: Tick,
        customer_id: EntityId,
        object_id: EntityId,
        money: Money,
        reputation: f64,
        satisfaction_gain: i32,
    },
    InteractionEnded {
        tick: Tick,
        customer_id: EntityId,
        object_id: EntityId,
    },
    CustomerLeaving {
        tick: Tick,
        customer_id: EntityId,
    },
    CustomerLeft {
        tick: Tick,
        customer_id: EntityId,
    },

    // ── Waste ──────────────────────────────────────
    WasteSpawned {
        tick: Tick,
        waste_id: EntityId,
        x: i32,
        y: i32,
    },
    WasteCleaned {
        tick: Tick,
        waste_id: EntityId,
        reputation: f64,
    },

    // ── Economy ────────────────────────────────────
    EconomyUpdated {
        tick: Tick,
        money: Money,
        reputation: f64,
        money_delta: Money,
        reputation_delta: f64,
    },
}

impl SimEvent {
    /// Stable string name, used for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TickStarted { .. }           => "tick_started",
            Self::TickCompleted { .. }         => "tick_completed",
            Self::RunInitialized { .. }        => "run_initialized",
            Self::PlayerCommandReceived { .. } => "player_command_received",
            Self::ShopOpened { .. }            => "shop_opened",
            Self::ShopClosed { .. }            => "shop_closed",
            Self::ObjectPlaced { .. }          => "object_placed",
            Self::PurchaseRejected { .. }      => "purchase_rejected",
            Self::ObjectRemoved { .. }         => "object_removed",
            Self::CustomerSpawned { .. }       => "customer_spawned",
            Self::PaymentStarted { .. }        => "payment_started",
            Self::CustomerPaid { .. }          => "customer_paid",
            Self::ItemInteracted { .. }        => "item_interacted",
            Self::InteractionEnded { .. }      => "interaction_ended",
            Self::CustomerLeaving { .. }       => "customer_leaving",
            Self::CustomerLeft { .. }          => "customer_left",
            Self::WasteSpawned { .. }          => "waste_spawned",
            Self::WasteCleaned { .. }          => "waste_cleaned",
            Self::EconomyUpdated { .. }        => "economy_updated",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub tick: Tick,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}

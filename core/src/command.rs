use serde::{Deserialize, Serialize};
use crate::{
    clock::SimSpeed,
    types::{EntityId, RunId, Tick},
};

/// All player-issued commands.
/// Commands are queued and applied at the start of the next tick, so the
/// UI can never observe a half-applied change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Shop overlay (pause signal) ───────────────
    OpenShop,
    CloseShop,

    // ── Floor ─────────────────────────────────────
    /// Buy a catalog entry and place it on the tile under (x, y).
    Purchase { catalog_id: String, x: i32, y: i32 },
    RemoveObject { object_id: EntityId },

    // ── Clicks ────────────────────────────────────
    /// Pick up the first piece of waste under the cursor.
    CleanWasteAt { x: i32, y: i32 },
    /// Make a browsing customer use the first object within reach.
    NudgeCustomer { customer_id: EntityId },

    // ── Clock ─────────────────────────────────────
    SetSpeed { speed: SimSpeed },
}

impl PlayerCommand {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::OpenShop          => "open_shop",
            Self::CloseShop         => "close_shop",
            Self::Purchase { .. }   => "purchase",
            Self::RemoveObject { .. } => "remove_object",
            Self::CleanWasteAt { .. } => "clean_waste_at",
            Self::NudgeCustomer { .. } => "nudge_customer",
            Self::SetSpeed { .. }     => "set_speed",
        }
    }
}

/// A queued player command with its submission tick.
///
/// `command_id` is handed back to the caller; only `sequence` reaches the
/// event log, so two runs fed the same commands log the same bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub run_id:     RunId,
    pub queued_at:  Tick,
    pub sequence:   u64,
    pub command_id: String,
    pub command:    PlayerCommand,
}

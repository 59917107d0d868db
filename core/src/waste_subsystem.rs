//! Waste subsystem: litter that piles up on the floor over time.
//!
//! A new piece appears every `spawn_interval_ms` of unpaused time while
//! fewer than `max_waste` pieces are down. The player removes a piece by
//! clicking it, which earns reputation. Waste never blocks movement.

use crate::{
    command::PlayerCommand,
    error::SimResult,
    event::SimEvent,
    grid::Rect,
    obstacle::Interactable,
    rng::{RandomSource, SubsystemRng},
    subsystem::{SimSubsystem, TickContext},
    types::{EntityId, SimMillis},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waste {
    pub waste_id:   EntityId,
    pub x:          i32,
    pub y:          i32,
    pub size:       i32,
    pub cleaned_at: Option<SimMillis>,
}

impl Interactable for Waste {
    fn bounding_box(&self) -> Rect {
        Rect::new(self.x, self.y, self.size, self.size)
    }

    fn on_interact(&mut self, now: SimMillis) {
        self.cleaned_at = Some(now);
    }
}

#[derive(Default)]
pub struct WasteSubsystem {
    pieces:         Vec<Waste>,
    next_id:        u64,
    since_spawn_ms: SimMillis,
}

impl WasteSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pieces(&self) -> &[Waste] {
        &self.pieces
    }

    /// Remove the first piece under (px, py), in spawn order.
    fn clean_at(&mut self, px: i32, py: i32, now: SimMillis) -> Option<Waste> {
        let pos = self.pieces.iter().position(|w| w.contains(px, py))?;
        let mut piece = self.pieces.remove(pos);
        piece.on_interact(now);
        Some(piece)
    }

    fn spawn(&mut self, ctx: &TickContext<'_>, rng: &mut dyn RandomSource) -> SimEvent {
        let grid = &ctx.config.grid;
        let ts = grid.tile_size;
        let x = rng.next_u64_below((grid.screen_width - ts).max(1) as u64) as i32;
        let y = rng.next_u64_below((grid.screen_height - 2 * ts).max(1) as u64) as i32 + ts;

        self.next_id += 1;
        let waste_id = format!("waste-{:06}", self.next_id);
        self.pieces.push(Waste {
            waste_id: waste_id.clone(),
            x,
            y,
            size: ctx.config.waste.size,
            cleaned_at: None,
        });
        log::debug!("tick={} waste: {waste_id} dropped at ({x}, {y})", ctx.tick);
        SimEvent::WasteSpawned { tick: ctx.tick, waste_id, x, y }
    }
}

impl SimSubsystem for WasteSubsystem {
    fn name(&self) -> &'static str {
        "waste"
    }

    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let mut out = Vec::new();

        for event in events_in {
            if let SimEvent::PlayerCommandReceived {
                command: PlayerCommand::CleanWasteAt { x, y },
                ..
            } = event
            {
                match self.clean_at(*x, *y, ctx.now_ms) {
                    Some(piece) => {
                        log::info!("tick={} waste: {} cleaned", ctx.tick, piece.waste_id);
                        out.push(SimEvent::WasteCleaned {
                            tick: ctx.tick,
                            waste_id: piece.waste_id,
                            reputation: ctx.config.waste.clean_reputation,
                        });
                    }
                    None => log::debug!("tick={} waste: nothing to clean at ({x}, {y})", ctx.tick),
                }
            }
        }

        let cfg = &ctx.config.waste;
        if !cfg.enabled || ctx.shop_open {
            return Ok(out);
        }

        self.since_spawn_ms = self.since_spawn_ms.saturating_add(ctx.dt_ms);
        if self.since_spawn_ms >= cfg.spawn_interval_ms {
            self.since_spawn_ms = 0;
            if self.pieces.len() < cfg.max_waste {
                out.push(self.spawn(ctx, rng));
            }
        }

        Ok(out)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

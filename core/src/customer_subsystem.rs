//! Customer subsystem: spawns customers and drives every live customer's
//! state machine once per tick.
//!
//! Per tick, in order:
//!   1. Player nudges from this tick's commands.
//!   2. Pause signal propagated to every customer.
//!   3. Spawn gate (skipped while the shop overlay is open).
//!   4. Every live customer advanced once, in arrival order.
//!   5. Customers that reached Gone are dropped.

use crate::{
    command::PlayerCommand,
    customer::{Customer, StepContext},
    error::SimResult,
    event::SimEvent,
    rng::{RandomSource, SubsystemRng},
    subsystem::{SimSubsystem, TickContext},
};

#[derive(Default)]
pub struct CustomerSubsystem {
    customers: Vec<Customer>,
    next_id: u64,
    spawned_total: u64,
    departed_total: u64,
}

impl CustomerSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    pub fn departed_total(&self) -> u64 {
        self.departed_total
    }

    /// The spawn gate: a roll in [0, roll_range) must land below
    /// reputation / reputation_divisor.
    fn spawn_gate_passes(ctx: &TickContext<'_>, rng: &mut dyn RandomSource) -> bool {
        let spawn = &ctx.config.spawn;
        let roll = rng.next_u64_below(spawn.roll_range) as f64;
        roll < ctx.economy.reputation / spawn.reputation_divisor
    }

    fn try_spawn(&mut self, ctx: &TickContext<'_>, rng: &mut dyn RandomSource) -> Option<SimEvent> {
        let cfg = &ctx.config.customer;
        if self.customers.len() >= cfg.max_customers || !Self::spawn_gate_passes(ctx, rng) {
            return None;
        }

        let cosmetic_index = 1 + rng.next_u64_below(cfg.cosmetic_variants);
        let span = (cfg.satisfaction_max - cfg.satisfaction_min) as u64;
        let satisfaction = cfg.satisfaction_min + rng.next_u64_below(span) as i32;

        self.next_id += 1;
        let customer_id = format!("cust-{:06}", self.next_id);
        self.customers.push(Customer::new(
            customer_id.clone(),
            cosmetic_index,
            ctx.config.layout.entrance,
            satisfaction,
        ));
        self.spawned_total += 1;

        log::info!(
            "tick={} customer: {customer_id} arrived (satisfaction {satisfaction})",
            ctx.tick
        );
        Some(SimEvent::CustomerSpawned {
            tick: ctx.tick,
            customer_id,
            cosmetic_index,
            satisfaction,
        })
    }
}

impl SimSubsystem for CustomerSubsystem {
    fn name(&self) -> &'static str {
        "customer"
    }

    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let mut out = Vec::new();
        let step = StepContext {
            tick:      ctx.tick,
            now_ms:    ctx.now_ms,
            dt_ms:     ctx.dt_ms,
            grid:      &ctx.config.grid,
            layout:    &ctx.config.layout,
            customer:  &ctx.config.customer,
            economy:   &ctx.config.economy,
            relax:     ctx.config.pathfinding.relax,
            obstacles: ctx.obstacles,
        };

        for event in events_in {
            if let SimEvent::PlayerCommandReceived {
                command: PlayerCommand::NudgeCustomer { customer_id },
                ..
            } = event
            {
                match self.customers.iter_mut().find(|c| &c.customer_id == customer_id) {
                    // The shop overlay freezes the floor, clicks included.
                    Some(_) if ctx.shop_open => {
                        log::debug!("tick={} customer: {customer_id} nudged while the shop is open", ctx.tick);
                    }
                    Some(customer) => {
                        if !customer.nudge(&step, &mut out) {
                            log::debug!("tick={} customer: {customer_id} ignored nudge", ctx.tick);
                        }
                    }
                    None => log::warn!("tick={} customer: nudge for unknown {customer_id}", ctx.tick),
                }
            }
        }

        for customer in &mut self.customers {
            customer.set_paused(ctx.shop_open);
        }

        if !ctx.shop_open {
            if let Some(spawned) = self.try_spawn(ctx, rng) {
                out.push(spawned);
            }
        }

        for customer in &mut self.customers {
            customer.update(&step, rng, &mut out);
        }

        let before = self.customers.len();
        self.customers.retain(|c| !c.is_gone());
        let departed = (before - self.customers.len()) as u64;
        if departed > 0 {
            self.departed_total += departed;
            log::info!(
                "tick={} customer: {departed} left, {} still inside",
                ctx.tick,
                self.customers.len()
            );
        }

        Ok(out)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

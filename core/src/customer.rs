//! The per-customer state machine.
//!
//! Lifecycle:
//!   RoutingToCashier -> Paying -> Browsing <-> Interacting
//!                                 Browsing -> RoutingToExit -> Gone
//!
//! RULES:
//!   - Paying and Interacting freeze movement and are resolved by polling
//!     their timers, which only advance while the customer is unpaused.
//!   - Movement happens at most once per `move_delay_ms` of simulated time.
//!   - Unreachable goals and invalid random targets are never errors: the
//!     customer idles and retries on its next movement step.

use crate::{
    config::{CustomerConfig, EconomyConfig, LayoutConfig, Navigation},
    event::SimEvent,
    grid::{Direction, Grid, TilePos},
    obstacle::{Obstacle, ObstacleSnapshot},
    pathfinding::{find_path, RelaxPolicy},
    rng::RandomSource,
    types::{EntityId, SimMillis, Tick},
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A fixed-length countdown measured in unpaused simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTimer {
    pub started_at_ms: SimMillis,
    pub elapsed_ms:    SimMillis,
    pub duration_ms:   SimMillis,
}

impl StateTimer {
    pub fn start(now: SimMillis, duration_ms: SimMillis) -> Self {
        Self { started_at_ms: now, elapsed_ms: 0, duration_ms }
    }

    pub fn advance(&mut self, dt: SimMillis) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt);
    }

    pub fn is_done(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CustomerState {
    RoutingToCashier,
    Paying { timer: StateTimer },
    Browsing,
    Interacting { object_id: EntityId, timer: StateTimer },
    RoutingToExit,
    Gone,
}

impl CustomerState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RoutingToCashier   => "routing_to_cashier",
            Self::Paying { .. }      => "paying",
            Self::Browsing           => "browsing",
            Self::Interacting { .. } => "interacting",
            Self::RoutingToExit      => "routing_to_exit",
            Self::Gone               => "gone",
        }
    }
}

/// Everything a customer needs to know about the world for one update.
pub struct StepContext<'a> {
    pub tick:      Tick,
    /// Simulated time at the end of this tick.
    pub now_ms:    SimMillis,
    /// Simulated time covered by this tick.
    pub dt_ms:     SimMillis,
    pub grid:      &'a Grid,
    pub layout:    &'a LayoutConfig,
    pub customer:  &'a CustomerConfig,
    pub economy:   &'a EconomyConfig,
    pub relax:     RelaxPolicy,
    pub obstacles: &'a ObstacleSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id:    EntityId,
    /// Cosmetic only; picks the sprite.
    pub cosmetic_index: u64,
    pub position:       TilePos,
    pub target:         TilePos,
    /// Remaining waypoints, start-exclusive, ending at `target`.
    pub path:           VecDeque<TilePos>,
    pub satisfaction:   i32,
    pub has_paid:       bool,
    pub paused:         bool,
    pub state:          CustomerState,
    since_last_step_ms: SimMillis,
}

impl Customer {
    pub fn new(customer_id: EntityId, cosmetic_index: u64, entrance: TilePos, satisfaction: i32) -> Self {
        Self {
            customer_id,
            cosmetic_index,
            position: entrance,
            target: entrance,
            path: VecDeque::new(),
            satisfaction,
            has_paid: false,
            paused: false,
            state: CustomerState::RoutingToCashier,
            since_last_step_ms: 0,
        }
    }

    pub fn is_paying(&self) -> bool {
        matches!(self.state, CustomerState::Paying { .. })
    }

    pub fn is_interacting(&self) -> bool {
        matches!(self.state, CustomerState::Interacting { .. })
    }

    pub fn is_gone(&self) -> bool {
        self.state == CustomerState::Gone
    }

    pub fn screen_position(&self, grid: &Grid) -> (i32, i32) {
        grid.to_screen(self.position)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advance the state machine by one tick.
    pub fn update(
        &mut self,
        ctx: &StepContext<'_>,
        rng: &mut dyn RandomSource,
        out: &mut Vec<SimEvent>,
    ) {
        if self.paused || self.is_gone() {
            return;
        }

        match &mut self.state {
            CustomerState::Paying { timer } => {
                timer.advance(ctx.dt_ms);
                if timer.is_done() {
                    self.finish_payment(ctx, out);
                }
                return;
            }
            CustomerState::Interacting { object_id, timer } => {
                timer.advance(ctx.dt_ms);
                if timer.is_done() {
                    let object_id = object_id.clone();
                    self.state = CustomerState::Browsing;
                    out.push(SimEvent::InteractionEnded {
                        tick: ctx.tick,
                        customer_id: self.customer_id.clone(),
                        object_id,
                    });
                }
                return;
            }
            _ => {}
        }

        self.since_last_step_ms = self.since_last_step_ms.saturating_add(ctx.dt_ms);
        if self.since_last_step_ms < ctx.customer.move_delay_ms {
            return;
        }
        self.since_last_step_ms = 0;

        match self.state {
            CustomerState::RoutingToCashier => self.step_to_cashier(ctx, out),
            CustomerState::Browsing         => self.step_browsing(ctx, rng, out),
            CustomerState::RoutingToExit    => self.step_to_exit(ctx, out),
            _ => {}
        }
    }

    /// Player click: use the first object within reach, no dice involved.
    /// Only a browsing customer can be nudged.
    pub fn nudge(&mut self, ctx: &StepContext<'_>, out: &mut Vec<SimEvent>) -> bool {
        if self.state != CustomerState::Browsing {
            return false;
        }
        let Some(obstacle) = ctx.obstacles.near(ctx.grid, self.position).next() else {
            return false;
        };
        self.begin_interaction(obstacle, ctx, out);
        true
    }

    fn step_to_cashier(&mut self, ctx: &StepContext<'_>, out: &mut Vec<SimEvent>) {
        match ctx.customer.navigation {
            Navigation::AStar => {
                if self.path.is_empty() && !ctx.layout.cashier_tiles.contains(&self.position) {
                    self.plan_route_to_cashier(ctx);
                }
                self.follow_path(ctx);
            }
            Navigation::Direct => {
                let Some(&goal) = ctx.layout.cashier_tiles.first() else {
                    return;
                };
                self.direct_step(goal, ctx);
            }
        }

        if ctx.layout.cashier_tiles.contains(&self.position) {
            self.path.clear();
            self.target = self.position;
            self.state = CustomerState::Paying {
                timer: StateTimer::start(ctx.now_ms, ctx.customer.payment_duration_ms),
            };
            out.push(SimEvent::PaymentStarted {
                tick: ctx.tick,
                customer_id: self.customer_id.clone(),
                started_at_ms: ctx.now_ms,
            });
        }
    }

    /// Route to the first cashier tile that can be reached. With every
    /// cashier tile cut off the customer waits where it stands.
    fn plan_route_to_cashier(&mut self, ctx: &StepContext<'_>) {
        let planned = ctx.layout.cashier_tiles.iter().find_map(|&tile| {
            let route = find_path(ctx.grid, self.position, tile, ctx.obstacles, ctx.relax);
            (!route.is_empty()).then_some((tile, route))
        });
        match planned {
            Some((tile, route)) => {
                self.target = tile;
                self.path = route.into();
            }
            None => {
                log::debug!("tick={} {} cannot reach the cashier; waiting", ctx.tick, self.customer_id);
                self.target = self.position;
            }
        }
    }

    fn finish_payment(&mut self, ctx: &StepContext<'_>, out: &mut Vec<SimEvent>) {
        self.has_paid = true;
        self.state = CustomerState::Browsing;
        out.push(SimEvent::CustomerPaid {
            tick: ctx.tick,
            customer_id: self.customer_id.clone(),
            amount: ctx.economy.cashier_payment,
        });
    }

    fn step_browsing(
        &mut self,
        ctx: &StepContext<'_>,
        rng: &mut dyn RandomSource,
        out: &mut Vec<SimEvent>,
    ) {
        if self.satisfaction <= 0 {
            self.path.clear();
            self.target = self.position;
            self.state = CustomerState::RoutingToExit;
            log::debug!("tick={} {} heading for the exit", ctx.tick, self.customer_id);
            out.push(SimEvent::CustomerLeaving {
                tick: ctx.tick,
                customer_id: self.customer_id.clone(),
            });
            return;
        }

        if !self.has_route(ctx.customer.navigation) {
            self.retarget(ctx, rng);
        } else {
            let moved = match ctx.customer.navigation {
                Navigation::AStar => self.follow_path(ctx),
                Navigation::Direct => self.direct_step(self.target, ctx),
            };
            if moved && rng.chance(ctx.customer.interaction_attempt_chance) {
                self.try_interact(ctx, rng, out);
            }
        }

        if rng.chance(ctx.customer.decay_chance) {
            self.satisfaction = (self.satisfaction - 1).max(0);
        }
    }

    fn step_to_exit(&mut self, ctx: &StepContext<'_>, out: &mut Vec<SimEvent>) {
        let entrance = ctx.layout.entrance;
        self.navigate_toward(entrance, ctx);

        if self.position == entrance {
            self.path.clear();
            self.target = self.position;
            self.state = CustomerState::Gone;
            out.push(SimEvent::CustomerLeft {
                tick: ctx.tick,
                customer_id: self.customer_id.clone(),
            });
        }
    }

    fn has_route(&self, navigation: Navigation) -> bool {
        match navigation {
            Navigation::AStar => !self.path.is_empty(),
            Navigation::Direct => self.target != self.position,
        }
    }

    /// Pick a random straight-line destination 5–10 tiles away. Invalid or
    /// unreachable picks collapse the target onto the current tile.
    fn retarget(&mut self, ctx: &StepContext<'_>, rng: &mut dyn RandomSource) {
        let steps = rng.range_inclusive(ctx.customer.browse_min_steps, ctx.customer.browse_max_steps) as i32;
        let direction = Direction::ALL[rng.next_u64_below(4) as usize];
        let (dx, dy) = direction.delta();
        let candidate = self.position.offset(dx * steps, dy * steps);

        self.target = self.position;
        if !ctx.grid.is_walkable(candidate, ctx.obstacles) {
            return;
        }
        match ctx.customer.navigation {
            Navigation::AStar => {
                let route = find_path(ctx.grid, self.position, candidate, ctx.obstacles, ctx.relax);
                if !route.is_empty() {
                    self.target = candidate;
                    self.path = route.into();
                }
            }
            Navigation::Direct => self.target = candidate,
        }
    }

    fn navigate_toward(&mut self, goal: TilePos, ctx: &StepContext<'_>) {
        match ctx.customer.navigation {
            Navigation::AStar => {
                if self.path.is_empty() && self.position != goal {
                    let route = find_path(ctx.grid, self.position, goal, ctx.obstacles, ctx.relax);
                    if route.is_empty() {
                        log::debug!(
                            "tick={} {} cannot reach ({}, {}); waiting",
                            ctx.tick, self.customer_id, goal.x, goal.y
                        );
                        self.target = self.position;
                        return;
                    }
                    self.target = goal;
                    self.path = route.into();
                }
                self.follow_path(ctx);
            }
            Navigation::Direct => {
                self.direct_step(goal, ctx);
            }
        }
    }

    /// Pop one waypoint and step onto it. A waypoint that became blocked
    /// since the route was planned drops the whole route.
    fn follow_path(&mut self, ctx: &StepContext<'_>) -> bool {
        let Some(next) = self.path.pop_front() else {
            return false;
        };
        if !ctx.grid.is_walkable(next, ctx.obstacles) {
            self.path.clear();
            self.target = self.position;
            return false;
        }
        self.position = next;
        if self.path.is_empty() {
            self.target = self.position;
        }
        true
    }

    /// One tile toward `goal`, horizontal axis first, probing only the
    /// next cell. Idles when both axes are blocked.
    fn direct_step(&mut self, goal: TilePos, ctx: &StepContext<'_>) -> bool {
        self.path.clear();
        if self.position == goal {
            self.target = goal;
            return false;
        }
        let sx = (goal.x - self.position.x).signum();
        let sy = (goal.y - self.position.y).signum();
        for (dx, dy) in [(sx, 0), (0, sy)] {
            if dx == 0 && dy == 0 {
                continue;
            }
            let next = self.position.offset(dx, dy);
            if ctx.grid.is_walkable(next, ctx.obstacles) {
                self.position = next;
                self.target = goal;
                return true;
            }
        }
        self.target = self.position;
        false
    }

    fn try_interact(
        &mut self,
        ctx: &StepContext<'_>,
        rng: &mut dyn RandomSource,
        out: &mut Vec<SimEvent>,
    ) {
        let chance = ctx.customer.interaction_candidate_chance;
        let chosen = ctx
            .obstacles
            .near(ctx.grid, self.position)
            .find(|_| rng.chance(chance));
        if let Some(obstacle) = chosen {
            self.begin_interaction(obstacle, ctx, out);
        }
    }

    fn begin_interaction(&mut self, obstacle: &Obstacle, ctx: &StepContext<'_>, out: &mut Vec<SimEvent>) {
        let gain = ctx.customer.interaction_satisfaction_gain;
        self.satisfaction += gain;
        self.state = CustomerState::Interacting {
            object_id: obstacle.object_id.clone(),
            timer: StateTimer::start(ctx.now_ms, ctx.customer.interaction_duration_ms),
        };
        out.push(SimEvent::ItemInteracted {
            tick: ctx.tick,
            customer_id: self.customer_id.clone(),
            object_id: obstacle.object_id.clone(),
            money: obstacle.price / ctx.economy.interaction_price_divisor,
            reputation: ctx.economy.interaction_reputation,
            satisfaction_gain: gain,
        });
    }
}

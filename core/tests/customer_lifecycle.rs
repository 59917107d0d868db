//! Customer state machine, driven directly with hand-built step contexts.
//!
//! Covers: the cashier visit and payment timing, has_paid monotonicity,
//! satisfaction running out, exiting without interacting, unreachable
//! goals, nudges, and pause.

use cafe_core::{
    config::{Navigation, SimConfig},
    customer::{Customer, CustomerState, StateTimer, StepContext},
    event::SimEvent,
    grid::TilePos,
    obstacle::{Obstacle, ObstacleSnapshot},
    rng::{RandomSource, RngBank, SubsystemSlot},
    types::SimMillis,
};

const DT: SimMillis = 16;

/// Deterministic draws: every float roll returns `roll`, every integer
/// roll returns `pick` clamped into range.
struct Scripted {
    roll: f64,
    pick: u64,
}

impl RandomSource for Scripted {
    fn next_f64(&mut self) -> f64 {
        self.roll
    }

    fn next_u64_below(&mut self, n: u64) -> u64 {
        self.pick.min(n - 1)
    }
}

/// Never decays, never interacts, always browses east five tiles.
fn calm() -> Scripted {
    Scripted { roll: 0.99, pick: 0 }
}

fn block(config: &SimConfig, tiles: &[(i32, i32)]) -> ObstacleSnapshot {
    tiles
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            Obstacle::new(format!("obj-{:06}", i + 1), config.grid.tile_rect(TilePos::new(x, y)), 50)
        })
        .collect::<Vec<_>>()
        .into()
}

/// Drives one customer tick by tick and records everything it emits.
struct Harness {
    config:    SimConfig,
    obstacles: ObstacleSnapshot,
    tick:      u64,
    dt_ms:     SimMillis,
    events:    Vec<SimEvent>,
}

impl Harness {
    fn new(config: SimConfig, obstacles: ObstacleSnapshot) -> Self {
        Self { config, obstacles, tick: 0, dt_ms: DT, events: Vec::new() }
    }

    fn now_ms(&self) -> SimMillis {
        self.tick * self.dt_ms
    }

    fn step(&mut self, customer: &mut Customer, rng: &mut dyn RandomSource) -> Vec<SimEvent> {
        self.tick += 1;
        let ctx = StepContext {
            tick:      self.tick,
            now_ms:    self.tick * self.dt_ms,
            dt_ms:     self.dt_ms,
            grid:      &self.config.grid,
            layout:    &self.config.layout,
            customer:  &self.config.customer,
            economy:   &self.config.economy,
            relax:     self.config.pathfinding.relax,
            obstacles: &self.obstacles,
        };
        let mut out = Vec::new();
        customer.update(&ctx, rng, &mut out);
        self.events.extend(out.iter().cloned());
        out
    }

    fn nudge(&mut self, customer: &mut Customer) -> bool {
        let ctx = StepContext {
            tick:      self.tick,
            now_ms:    self.now_ms(),
            dt_ms:     self.dt_ms,
            grid:      &self.config.grid,
            layout:    &self.config.layout,
            customer:  &self.config.customer,
            economy:   &self.config.economy,
            relax:     self.config.pathfinding.relax,
            obstacles: &self.obstacles,
        };
        let mut out = Vec::new();
        let accepted = customer.nudge(&ctx, &mut out);
        self.events.extend(out);
        accepted
    }

    fn interactions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SimEvent::ItemInteracted { .. }))
            .count()
    }
}

fn newcomer(config: &SimConfig, satisfaction: i32) -> Customer {
    Customer::new("cust-000001".into(), 1, config.layout.entrance, satisfaction)
}

fn browsing_at(position: TilePos, satisfaction: i32) -> Customer {
    let mut customer = Customer::new("cust-000001".into(), 1, position, satisfaction);
    customer.has_paid = true;
    customer.state = CustomerState::Browsing;
    customer
}

#[test]
fn newcomer_walks_to_the_cashier_and_pays_after_four_seconds() {
    let config = SimConfig::default_test();
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    let mut customer = newcomer(&config, 70);
    let mut rng = calm();

    let mut payment_started_at = None;
    let mut paid_at = None;
    for _ in 0..2_000 {
        for event in harness.step(&mut customer, &mut rng) {
            match event {
                SimEvent::PaymentStarted { started_at_ms, .. } => payment_started_at = Some(started_at_ms),
                SimEvent::CustomerPaid { amount, .. } => {
                    assert_eq!(amount, 5);
                    paid_at = Some(harness.now_ms());
                }
                _ => {}
            }
        }
        if paid_at.is_some() {
            break;
        }
    }

    let started = payment_started_at.expect("customer reached the cashier");
    let paid = paid_at.expect("customer finished paying");
    assert!(paid - started >= 4_000, "paid after only {} ms", paid - started);
    assert!(customer.has_paid);
    assert_eq!(customer.state, CustomerState::Browsing);
    assert!(config.layout.cashier_tiles.contains(&customer.position));
}

#[test]
fn movement_respects_the_step_cadence() {
    let config = SimConfig::default_test();
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    let mut customer = newcomer(&config, 70);
    let mut rng = calm();

    // 111 ms cadence with 16 ms ticks: the first step lands on tick 7.
    for _ in 0..6 {
        harness.step(&mut customer, &mut rng);
    }
    assert_eq!(customer.position, config.layout.entrance);
    harness.step(&mut customer, &mut rng);
    assert_eq!(customer.position, config.layout.entrance.offset(1, 0));
}

#[test]
fn has_paid_never_reverts() {
    let config = SimConfig::default_test();
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    let mut customer = newcomer(&config, 55);
    let bank = RngBank::new(31);

    let mut seen_paid = false;
    for tick in 0..60_000 {
        let mut rng = bank.for_subsystem_at_tick(SubsystemSlot::Customer, tick);
        harness.step(&mut customer, &mut rng);
        if seen_paid {
            assert!(customer.has_paid, "has_paid reverted at tick {tick}");
        }
        seen_paid |= customer.has_paid;
        if customer.is_gone() {
            break;
        }
    }
    assert!(seen_paid);
    let payments = harness
        .events
        .iter()
        .filter(|e| matches!(e, SimEvent::CustomerPaid { .. }))
        .count();
    assert_eq!(payments, 1, "a customer pays exactly once");
}

#[test]
fn satisfaction_runs_out_and_the_customer_leaves() {
    let config = SimConfig::default_test();
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    let mut customer = browsing_at(TilePos::new(5, 6), 60);
    let bank = RngBank::new(7);

    let mut ticks = 0;
    while !customer.is_gone() {
        let mut rng = bank.for_subsystem_at_tick(SubsystemSlot::Customer, ticks);
        harness.step(&mut customer, &mut rng);
        ticks += 1;
        assert!(ticks < 100_000, "customer never left");
    }

    assert_eq!(customer.satisfaction, 0);
    assert_eq!(customer.position, config.layout.entrance);
    assert!(harness.events.iter().any(|e| matches!(e, SimEvent::CustomerLeaving { .. })));
    assert!(matches!(harness.events.last(), Some(SimEvent::CustomerLeft { .. })));
}

#[test]
fn seeded_decay_stays_near_one_point_per_ten_steps() {
    let config = SimConfig::default_test();
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    // One tick per movement slot, so every update is a decay roll.
    harness.dt_ms = config.customer.move_delay_ms;
    let mut customer = browsing_at(TilePos::new(5, 6), 500);
    let bank = RngBank::new(4242);

    for tick in 0..1_000 {
        let mut rng = bank.for_subsystem_at_tick(SubsystemSlot::Customer, tick);
        harness.step(&mut customer, &mut rng);
    }

    let lost = 500 - customer.satisfaction;
    assert!((50..=150).contains(&lost), "lost {lost} points over 1000 steps");
    assert_eq!(customer.state, CustomerState::Browsing);
}

#[test]
fn fifty_satisfaction_lasts_about_five_hundred_steps() {
    let config = SimConfig::default_test();
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    harness.dt_ms = config.customer.move_delay_ms;
    let mut customer = browsing_at(TilePos::new(5, 6), 50);
    let bank = RngBank::new(50);

    let mut steps = 0u64;
    while customer.satisfaction > 0 {
        let mut rng = bank.for_subsystem_at_tick(SubsystemSlot::Customer, steps);
        harness.step(&mut customer, &mut rng);
        steps += 1;
        assert!(steps < 5_000, "satisfaction never ran out");
    }
    assert!((250..=1_000).contains(&steps), "ran out after {steps} steps");
}

#[test]
fn no_interactions_on_the_way_out() {
    let config = SimConfig::default_test();
    // Objects line the route from (12, 3) back to the entrance.
    let obstacles = block(&config, &[(11, 2), (10, 4), (9, 2), (8, 2)]);
    let mut harness = Harness::new(config.clone(), obstacles);
    let mut customer = browsing_at(TilePos::new(12, 3), 0);
    // Every chance succeeds: any interaction attempt would fire.
    let mut rng = Scripted { roll: 0.0, pick: 0 };

    for _ in 0..5_000 {
        harness.step(&mut customer, &mut rng);
        if customer.is_gone() {
            break;
        }
    }

    assert!(customer.is_gone());
    assert_eq!(harness.interactions(), 0);
}

#[test]
fn browsing_next_to_an_object_can_interact() {
    let config = SimConfig::default_test();
    let obstacles = block(&config, &[(6, 5)]);
    let mut harness = Harness::new(config.clone(), obstacles);
    let mut customer = browsing_at(TilePos::new(5, 6), 80);
    // Every chance succeeds; browsing heads east five tiles.
    let mut rng = Scripted { roll: 0.0, pick: 0 };

    for _ in 0..50 {
        harness.step(&mut customer, &mut rng);
        if customer.is_interacting() {
            break;
        }
    }

    assert!(customer.is_interacting());
    let interacted = harness
        .events
        .iter()
        .find_map(|e| match e {
            SimEvent::ItemInteracted { object_id, money, reputation, satisfaction_gain, .. } => {
                Some((object_id.clone(), *money, *reputation, *satisfaction_gain))
            }
            _ => None,
        })
        .expect("interaction event");
    assert_eq!(interacted, ("obj-000001".to_string(), 10, 1.0, 5));
}

#[test]
fn interaction_ends_after_its_duration() {
    let config = SimConfig::default_test();
    let obstacles = block(&config, &[(6, 5)]);
    let mut harness = Harness::new(config.clone(), obstacles);
    let mut customer = browsing_at(TilePos::new(5, 5), 80);
    assert!(harness.nudge(&mut customer));
    assert_eq!(customer.satisfaction, 85);

    let mut rng = calm();
    for _ in 0..249 {
        harness.step(&mut customer, &mut rng);
    }
    assert!(customer.is_interacting(), "4000 ms not yet elapsed");
    harness.step(&mut customer, &mut rng);
    assert_eq!(customer.state, CustomerState::Browsing);
    assert!(matches!(harness.events.last(), Some(SimEvent::InteractionEnded { .. })));
}

#[test]
fn nudge_needs_a_browsing_customer_and_an_object_in_reach() {
    let config = SimConfig::default_test();
    let obstacles = block(&config, &[(9, 9)]);
    let mut harness = Harness::new(config.clone(), obstacles);

    let mut far = browsing_at(TilePos::new(2, 2), 80);
    assert!(!harness.nudge(&mut far));

    let mut paying = browsing_at(TilePos::new(9, 8), 80);
    paying.state = CustomerState::Paying { timer: StateTimer::start(0, 4_000) };
    assert!(!harness.nudge(&mut paying));

    let mut near = browsing_at(TilePos::new(10, 10), 80);
    assert!(harness.nudge(&mut near));
    assert!(near.is_interacting());
    assert_eq!(harness.interactions(), 1);
}

#[test]
fn unreachable_cashier_leaves_the_customer_waiting() {
    let config = SimConfig::default_test();
    // Seal both cashier tiles in the top-right corner.
    let obstacles = block(&config, &[(13, 1), (14, 2), (15, 2)]);
    let mut harness = Harness::new(config.clone(), obstacles);
    let mut customer = newcomer(&config, 70);
    let mut rng = calm();

    for _ in 0..2_000 {
        harness.step(&mut customer, &mut rng);
    }

    assert_eq!(customer.state, CustomerState::RoutingToCashier);
    assert_eq!(customer.position, config.layout.entrance);
    assert!(customer.path.is_empty());
    assert!(harness.events.is_empty());
}

#[test]
fn blocked_first_cashier_tile_sends_the_customer_to_the_next() {
    let config = SimConfig::default_test();
    let obstacles = block(&config, &[(14, 1)]);
    let mut harness = Harness::new(config.clone(), obstacles);
    let mut customer = newcomer(&config, 70);
    let mut rng = calm();

    for _ in 0..2_000 {
        harness.step(&mut customer, &mut rng);
        if customer.is_paying() {
            break;
        }
    }

    assert!(customer.is_paying());
    assert_eq!(customer.position, config.layout.cashier_tiles[1]);
}

#[test]
fn direct_navigation_reaches_the_cashier_on_an_open_floor() {
    let mut config = SimConfig::default_test();
    config.customer.navigation = Navigation::Direct;
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    let mut customer = newcomer(&config, 70);
    let mut rng = calm();

    for _ in 0..500 {
        harness.step(&mut customer, &mut rng);
        if customer.is_paying() {
            break;
        }
    }
    assert!(customer.is_paying());
    assert!(customer.path.is_empty());
}

#[test]
fn pause_freezes_the_payment_timer() {
    let config = SimConfig::default_test();
    let mut harness = Harness::new(config.clone(), ObstacleSnapshot::default());
    let cashier = config.layout.cashier_tiles[0];
    let mut customer = Customer::new("cust-000001".into(), 1, cashier, 70);
    customer.state = CustomerState::Paying { timer: StateTimer::start(0, 4_000) };
    let mut rng = calm();

    for _ in 0..100 {
        harness.step(&mut customer, &mut rng);
    }
    customer.set_paused(true);
    for _ in 0..1_000 {
        harness.step(&mut customer, &mut rng);
    }
    let CustomerState::Paying { timer } = &customer.state else {
        panic!("payment must survive the pause");
    };
    assert_eq!(timer.elapsed_ms, 1_600);

    customer.set_paused(false);
    for _ in 0..150 {
        harness.step(&mut customer, &mut rng);
    }
    assert!(customer.has_paid);
    assert_eq!(customer.state, CustomerState::Browsing);
}

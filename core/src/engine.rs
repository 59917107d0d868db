//! The simulation engine: the heart of the café.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   0. Clock advance, then queued player commands applied by the engine
//!      (shop open/close, purchases, removals, speed)
//!   1. Customer subsystem  (nudges, spawn gate, state machines, departures)
//!   2. Waste subsystem     (cleaning clicks, timed litter)
//!   3. Interaction marks on placed objects
//!   4. Economy applied from this tick's events, exactly once
//!   5. Event log persisted, periodic snapshot
//!
//! RULES:
//!   - Subsystems execute in registration order, every tick.
//!   - Each subsystem sees the obstacle snapshot and economy totals as
//!     they stood after step 0; nothing they do is visible until the
//!     next tick.
//!   - No subsystem calls another subsystem's functions directly.
//!   - All randomness flows through the RngBank.
//!   - All state changes are recorded in the event log.

use crate::{
    clock::SimClock,
    command::{PlayerCommand, QueuedCommand},
    config::{CatalogCategory, CatalogEntry, SimConfig},
    customer::{Customer, CustomerState},
    customer_subsystem::CustomerSubsystem,
    economy::EconomyState,
    error::{SimError, SimResult},
    event::{EventLogEntry, SimEvent},
    grid::TilePos,
    obstacle::{Interactable, ObjectKind, ObstacleIndex},
    rng::{RngBank, SubsystemSlot},
    snapshot::{CafeView, CustomerView, ObjectView, SimSnapshot, SNAPSHOT_INTERVAL},
    store::SimStore,
    subsystem::{SimSubsystem, TickContext},
    types::{EntityId, Money, RunId, SimMillis, Tick},
    waste_subsystem::{Waste, WasteSubsystem},
};

pub struct SimEngine {
    pub run_id:    RunId,
    pub clock:     SimClock,
    pub rng_bank:  RngBank,
    seed:          u64,
    config:        SimConfig,
    economy:       EconomyState,
    obstacles:     ObstacleIndex,
    shop_open:     bool,
    command_queue: Vec<QueuedCommand>,
    submitted:     u64,
    subsystems:    Vec<(SubsystemSlot, Box<dyn SimSubsystem>)>,
    store:         SimStore,
}

impl SimEngine {
    pub fn new(run_id: RunId, seed: u64, config: SimConfig, store: SimStore) -> Self {
        Self {
            clock:         SimClock::new(run_id.clone(), config.clock.tick_ms),
            rng_bank:      RngBank::new(seed),
            seed,
            economy:       EconomyState::new(&config.economy),
            obstacles:     ObstacleIndex::new(),
            shop_open:     false,
            command_queue: Vec::new(),
            submitted:     0,
            subsystems:    Vec::new(),
            config,
            store,
            run_id,
        }
    }

    /// Build a fully wired engine from the config files in `data_dir`.
    pub fn build(run_id: RunId, seed: u64, store: SimStore, data_dir: &str) -> anyhow::Result<Self> {
        let config = SimConfig::load(data_dir)?;
        Ok(Self::build_with_config(run_id, seed, config, store))
    }

    /// Build a fully wired engine with all subsystems registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build_with_config(run_id: RunId, seed: u64, config: SimConfig, store: SimStore) -> Self {
        let mut engine = SimEngine::new(run_id, seed, config, store);

        // EXECUTION ORDER: fixed, documented, never reordered.
        engine.register(SubsystemSlot::Customer, Box::new(CustomerSubsystem::new()));
        engine.register(SubsystemSlot::Waste, Box::new(WasteSubsystem::new()));
        engine
    }

    /// In-memory engine with `SimConfig::default_test()`.
    pub fn build_test(run_id: &str, seed: u64) -> SimResult<Self> {
        Self::build_test_with_config(run_id, seed, SimConfig::default_test())
    }

    pub fn build_test_with_config(run_id: &str, seed: u64, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let store = SimStore::in_memory()?;
        store.migrate()?;
        store.insert_run(run_id, seed, "0.1.0-test")?;
        Ok(Self::build_with_config(run_id.to_string(), seed, config, store))
    }

    /// Register a subsystem. Call in the documented execution order.
    pub fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn SimSubsystem>) {
        self.subsystems.push((slot, subsystem));
    }

    /// Queue a player command for the start of the next tick.
    /// Commands naming things that do not exist are rejected here.
    pub fn submit(&mut self, command: PlayerCommand) -> SimResult<String> {
        match &command {
            PlayerCommand::Purchase { catalog_id, .. } => {
                if self.config.catalog_entry(catalog_id).is_none() {
                    return Err(SimError::UnknownCatalogEntry { catalog_id: catalog_id.clone() });
                }
            }
            PlayerCommand::RemoveObject { object_id } => {
                if self.obstacles.get(object_id).is_none() {
                    return Err(SimError::UnknownEntity { kind: "object", id: object_id.clone() });
                }
            }
            PlayerCommand::NudgeCustomer { customer_id } => {
                if !self.customers().iter().any(|c| &c.customer_id == customer_id) {
                    return Err(SimError::UnknownEntity { kind: "customer", id: customer_id.clone() });
                }
            }
            _ => {}
        }

        self.submitted += 1;
        let command_id = uuid::Uuid::new_v4().to_string();
        log::debug!("queued {} #{} as {command_id}", command.type_name(), self.submitted);
        self.command_queue.push(QueuedCommand {
            run_id: self.run_id.clone(),
            queued_at: self.clock.current_tick,
            sequence: self.submitted,
            command_id: command_id.clone(),
            command,
        });
        Ok(command_id)
    }

    /// Advance one tick. This is the core simulation step.
    pub fn tick(&mut self) -> SimResult<Vec<SimEvent>> {
        assert!(!self.clock.paused, "tick() called on paused engine");

        let current_tick = self.clock.advance();
        let now_ms = self.clock.elapsed_ms;
        let mut tick_events: Vec<SimEvent> = vec![
            SimEvent::TickStarted { tick: current_tick }
        ];
        let mut log_entries: Vec<EventLogEntry> = Vec::new();

        let command_events = self.apply_commands(current_tick);
        for event in &command_events {
            log_entries.push(self.log_entry(current_tick, "engine", event)?);
        }
        tick_events.extend(command_events);

        let obstacles = self.obstacles.snapshot();
        let ctx = TickContext {
            tick: current_tick,
            now_ms,
            dt_ms: self.clock.tick_ms,
            config: &self.config,
            obstacles: &obstacles,
            economy: &self.economy,
            shop_open: self.shop_open,
        };

        // Execute each subsystem in registration order.
        // Each subsystem sees all events emitted so far this tick.
        for (slot, subsystem) in &mut self.subsystems {
            let mut rng = self.rng_bank.for_subsystem_at_tick(*slot, current_tick);
            let new_events = subsystem.update(&ctx, &tick_events, &mut rng)?;

            for event in &new_events {
                log_entries.push(EventLogEntry {
                    id:         None,
                    run_id:     self.run_id.clone(),
                    tick:       current_tick,
                    subsystem:  subsystem.name().to_string(),
                    event_type: event.type_name().to_string(),
                    payload:    serde_json::to_string(event)?,
                });
            }
            tick_events.extend(new_events);
        }

        for event in &tick_events {
            if let SimEvent::ItemInteracted { object_id, .. } = event {
                if let Some(object) = self.obstacles.get_mut(object_id) {
                    object.on_interact(now_ms);
                }
            }
        }

        if let Some(update) = self.economy.apply_events(current_tick, &tick_events) {
            log_entries.push(self.log_entry(current_tick, "economy", &update)?);
            tick_events.push(update);
        }

        tick_events.push(SimEvent::TickCompleted { tick: current_tick });
        self.store.append_events(&log_entries)?;

        // Snapshot every SNAPSHOT_INTERVAL ticks.
        if current_tick.is_multiple_of(SNAPSHOT_INTERVAL) {
            self.take_snapshot(current_tick)?;
        }

        Ok(tick_events)
    }

    /// Run n ticks in a loop. Used for testing and fast-forward.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<()> {
        // Emit RunInitialized at tick 0 so seed differences are observable.
        if self.clock.current_tick == 0 {
            if self.store.run_seed(&self.run_id)?.is_none() {
                return Err(SimError::RunNotInitialized);
            }
            let init_event = SimEvent::RunInitialized {
                run_id: self.run_id.clone(),
                seed: self.seed,
            };
            let entry = self.log_entry(0, "engine", &init_event)?;
            self.store.append_event(&entry)?;
        }
        self.clock.resume();
        let result = (0..n).try_for_each(|_| self.tick().map(|_| ()));
        self.clock.pause();
        result
    }

    /// Run enough ticks to cover `duration_ms` of simulated time.
    pub fn run_millis(&mut self, duration_ms: SimMillis) -> SimResult<()> {
        let ticks = self.clock.ticks_for(duration_ms);
        self.run_ticks(ticks)
    }

    /// One rendered frame's worth of ticks at the current speed.
    pub fn run_frame(&mut self) -> SimResult<()> {
        let ticks = self.clock.ticks_per_frame();
        self.run_ticks(ticks)
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn economy(&self) -> &EconomyState {
        &self.economy
    }

    pub fn obstacles(&self) -> &ObstacleIndex {
        &self.obstacles
    }

    pub fn shop_open(&self) -> bool {
        self.shop_open
    }

    pub fn pending_commands(&self) -> &[QueuedCommand] {
        &self.command_queue
    }

    pub fn store(&self) -> &SimStore {
        &self.store
    }

    /// Live customers in arrival order. Empty when the customer
    /// subsystem is not registered.
    pub fn customers(&self) -> &[Customer] {
        self.find_subsystem::<CustomerSubsystem>()
            .map(|s| s.customers())
            .unwrap_or(&[])
    }

    pub fn waste(&self) -> &[Waste] {
        self.find_subsystem::<WasteSubsystem>()
            .map(|s| s.pieces())
            .unwrap_or(&[])
    }

    pub fn customer_subsystem(&self) -> Option<&CustomerSubsystem> {
        self.find_subsystem::<CustomerSubsystem>()
    }

    /// The picture a renderer draws between ticks.
    pub fn view(&self) -> CafeView {
        let customers = self.customers();
        let objects = self
            .obstacles
            .objects()
            .iter()
            .map(|o| ObjectView {
                object_id:     o.object_id.clone(),
                label:         o.kind.label().to_string(),
                bounds:        o.bounds,
                price:         o.price,
                in_use:        customers.iter().any(|c| matches!(
                    &c.state,
                    CustomerState::Interacting { object_id, .. } if *object_id == o.object_id
                )),
                interacted_at: o.interacted_at,
            })
            .collect();

        CafeView {
            tick:       self.clock.current_tick,
            elapsed_ms: self.clock.elapsed_ms,
            shop_open:  self.shop_open,
            money:      self.economy.money,
            reputation: self.economy.reputation,
            customers:  customers
                .iter()
                .map(|c| CustomerView::from_customer(c, &self.config.grid))
                .collect(),
            objects,
            waste:      self.waste().to_vec(),
        }
    }

    /// Query events for a specific tick from the store.
    /// Used by the determinism test and replay tooling.
    pub fn store_events_for_tick(
        &self,
        run_id: &str,
        tick: Tick,
    ) -> SimResult<Vec<EventLogEntry>> {
        self.store.events_for_tick(run_id, tick)
    }

    pub fn store_event_count(&self, event_type: &str) -> SimResult<i64> {
        self.store.event_count(&self.run_id, event_type)
    }

    // ── Internals ──────────────────────────────────────────────

    fn find_subsystem<T: 'static>(&self) -> Option<&T> {
        self.subsystems
            .iter()
            .find_map(|(_, sub)| sub.as_any().downcast_ref::<T>())
    }

    /// Drain the queue in submission order. Purchases are checked against
    /// a running balance so one tick can never overspend.
    fn apply_commands(&mut self, tick: Tick) -> Vec<SimEvent> {
        let queued = std::mem::take(&mut self.command_queue);
        let mut events = Vec::with_capacity(queued.len());
        let mut available = self.economy.money;

        for QueuedCommand { sequence, command, .. } in queued {
            events.push(SimEvent::PlayerCommandReceived {
                tick,
                sequence,
                command: command.clone(),
            });

            match command {
                PlayerCommand::OpenShop => {
                    if !self.shop_open {
                        self.shop_open = true;
                        log::info!("tick={tick} shop opened; floor paused");
                        events.push(SimEvent::ShopOpened { tick });
                    }
                }
                PlayerCommand::CloseShop => {
                    if self.shop_open {
                        self.shop_open = false;
                        log::info!("tick={tick} shop closed; floor resumed");
                        events.push(SimEvent::ShopClosed { tick });
                    }
                }
                PlayerCommand::Purchase { catalog_id, x, y } => {
                    match self.place(&catalog_id, x, y, available) {
                        Ok((object_id, tile, cost)) => {
                            available -= cost;
                            log::info!("tick={tick} placed {catalog_id} as {object_id} at ({}, {})", tile.x, tile.y);
                            events.push(SimEvent::ObjectPlaced { tick, object_id, catalog_id, tile, cost });
                        }
                        Err(reason) => {
                            log::warn!("tick={tick} purchase of {catalog_id} rejected: {reason}");
                            events.push(SimEvent::PurchaseRejected { tick, catalog_id, reason });
                        }
                    }
                }
                PlayerCommand::RemoveObject { object_id } => {
                    if self.obstacles.remove(&object_id).is_some() {
                        log::info!("tick={tick} removed {object_id}");
                        events.push(SimEvent::ObjectRemoved { tick, object_id });
                    } else {
                        log::warn!("tick={tick} remove: {object_id} is already gone");
                    }
                }
                PlayerCommand::SetSpeed { speed } => self.clock.set_speed(speed),
                // Handled by the owning subsystems from PlayerCommandReceived.
                PlayerCommand::CleanWasteAt { .. } | PlayerCommand::NudgeCustomer { .. } => {}
            }
        }
        events
    }

    /// Place a catalog entry on the tile under (x, y). Returns the
    /// rejection reason when the purchase cannot go through.
    fn place(
        &mut self,
        catalog_id: &str,
        x: i32,
        y: i32,
        available: Money,
    ) -> Result<(EntityId, TilePos, Money), String> {
        let entry = self
            .config
            .catalog_entry(catalog_id)
            .cloned()
            .ok_or_else(|| format!("unknown catalog entry {catalog_id}"))?;
        if entry.price > available {
            return Err(format!("costs {} but only {available} available", entry.price));
        }

        let grid = &self.config.grid;
        let tile = grid.tile_at(x, y);
        if !grid.in_walkable_bounds(tile) {
            return Err(format!("tile ({}, {}) is outside the floor", tile.x, tile.y));
        }
        let layout = &self.config.layout;
        if layout.cashier_tiles.contains(&tile) || layout.entrance == tile {
            return Err(format!("tile ({}, {}) is kept clear for customers", tile.x, tile.y));
        }
        let bounds = grid.tile_rect(tile);
        if self.obstacles.snapshot().blocks(&bounds) {
            return Err(format!("tile ({}, {}) is occupied", tile.x, tile.y));
        }

        let object_id = self.obstacles.place(object_kind(&entry), bounds, entry.price);
        Ok((object_id, tile, entry.price))
    }

    fn log_entry(&self, tick: Tick, subsystem: &str, event: &SimEvent) -> SimResult<EventLogEntry> {
        Ok(EventLogEntry {
            id:         None,
            run_id:     self.run_id.clone(),
            tick,
            subsystem:  subsystem.to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        })
    }

    fn take_snapshot(&self, tick: Tick) -> SimResult<()> {
        let snapshot = SimSnapshot {
            run_id:    self.run_id.clone(),
            tick,
            clock:     self.clock.clone(),
            economy:   self.economy.clone(),
            shop_open: self.shop_open,
            customers: self.customers().to_vec(),
            objects:   self.obstacles.objects().to_vec(),
            waste:     self.waste().to_vec(),
        };
        let json = serde_json::to_string(&snapshot)?;
        self.store.save_snapshot(&self.run_id, tick, &json)?;
        log::debug!("Snapshot saved at tick {tick}");
        Ok(())
    }
}

fn object_kind(entry: &CatalogEntry) -> ObjectKind {
    match entry.category {
        CatalogCategory::Item => ObjectKind::Furniture { name: entry.label.clone() },
        CatalogCategory::Cat => ObjectKind::Cat { breed: entry.label.clone() },
        CatalogCategory::Employee => ObjectKind::Employee { role: entry.label.clone() },
    }
}

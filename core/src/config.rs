use crate::{
    error::{SimError, SimResult},
    grid::{Grid, TilePos},
    pathfinding::RelaxPolicy,
    types::{Money, SimMillis},
};
use serde::{Deserialize, Serialize};

/// Fixed tiles customers route to and from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Any of these tiles counts as "at the cashier". Customers head for
    /// the first one they can reach.
    pub cashier_tiles: Vec<TilePos>,
    /// Spawn point and exit.
    pub entrance: TilePos,
}

impl LayoutConfig {
    /// Cashier on the two right-most tiles of row 1, entrance under x = 375.
    pub fn for_grid(grid: &Grid) -> Self {
        let cols = grid.columns();
        Self {
            cashier_tiles: vec![TilePos::new(cols - 2, 1), TilePos::new(cols - 1, 1)],
            entrance: grid.tile_at(375, grid.tile_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Simulated milliseconds per engine tick.
    pub tick_ms: SimMillis,
}

/// How customers get from A to B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    /// Full A* routes, one waypoint per movement step.
    #[default]
    AStar,
    /// One tile per step toward the goal, probing the next cell only.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerConfig {
    pub max_customers: usize,
    /// Initial satisfaction is drawn from [min, max).
    pub satisfaction_min: i32,
    pub satisfaction_max: i32,
    /// Cosmetic indices are drawn from 1..=cosmetic_variants.
    pub cosmetic_variants: u64,
    /// Minimum simulated time between two movement steps.
    pub move_delay_ms: SimMillis,
    pub payment_duration_ms: SimMillis,
    pub interaction_duration_ms: SimMillis,
    /// Per-step probability of losing one satisfaction point while browsing.
    pub decay_chance: f64,
    /// Per-step probability of looking for something to interact with.
    pub interaction_attempt_chance: f64,
    /// Per-candidate probability that a nearby object is chosen.
    pub interaction_candidate_chance: f64,
    pub interaction_satisfaction_gain: i32,
    pub browse_min_steps: u64,
    pub browse_max_steps: u64,
    #[serde(default)]
    pub navigation: Navigation,
}

/// Spawn gate: `roll(roll_range) < reputation / reputation_divisor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub roll_range: u64,
    pub reputation_divisor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub starting_money: Money,
    pub starting_reputation: f64,
    /// Credited once per customer when payment completes.
    pub cashier_payment: Money,
    /// Interaction income is `price / interaction_price_divisor`.
    pub interaction_price_divisor: Money,
    pub interaction_reputation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteConfig {
    pub enabled: bool,
    pub spawn_interval_ms: SimMillis,
    pub max_waste: usize,
    /// Side length of a waste sprite in pixels.
    pub size: i32,
    pub clean_reputation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathfindingConfig {
    #[serde(default)]
    pub relax: RelaxPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogCategory {
    Item,
    Cat,
    Employee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub catalog_id: String,
    pub label:      String,
    pub category:   CatalogCategory,
    pub price:      Money,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    entries: Vec<CatalogEntry>,
}

/// Everything in `cafe.json`. Layout may be omitted and is then derived
/// from the grid.
#[derive(Debug, Clone, Deserialize)]
struct CafeFile {
    grid:        Grid,
    #[serde(default)]
    layout:      Option<LayoutConfig>,
    clock:       ClockConfig,
    customer:    CustomerConfig,
    spawn:       SpawnConfig,
    economy:     EconomyConfig,
    waste:       WasteConfig,
    #[serde(default)]
    pathfinding: PathfindingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub grid:        Grid,
    pub layout:      LayoutConfig,
    pub clock:       ClockConfig,
    pub customer:    CustomerConfig,
    pub spawn:       SpawnConfig,
    pub economy:     EconomyConfig,
    pub waste:       WasteConfig,
    pub pathfinding: PathfindingConfig,
    pub catalog:     Vec<CatalogEntry>,
}

impl SimConfig {
    /// Load from the data/ directory.
    /// In tests, use SimConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let cafe_path = format!("{data_dir}/cafe.json");
        let cafe_content = std::fs::read_to_string(&cafe_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {cafe_path}: {e}"))?;
        let cafe: CafeFile = serde_json::from_str(&cafe_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {cafe_path}: {e}"))?;

        let catalog_path = format!("{data_dir}/catalog.json");
        let catalog_content = std::fs::read_to_string(&catalog_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {catalog_path}: {e}"))?;
        let catalog: CatalogFile = serde_json::from_str(&catalog_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {catalog_path}: {e}"))?;

        let layout = cafe.layout.unwrap_or_else(|| LayoutConfig::for_grid(&cafe.grid));
        let config = Self {
            grid: cafe.grid,
            layout,
            clock: cafe.clock,
            customer: cafe.customer,
            spawn: cafe.spawn,
            economy: cafe.economy,
            waste: cafe.waste,
            pathfinding: cafe.pathfinding,
            catalog: catalog.entries,
        };
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Waste is disabled so it never interferes with economy assertions.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.waste.enabled = false;
        config
    }

    pub fn catalog_entry(&self, catalog_id: &str) -> Option<&CatalogEntry> {
        self.catalog.iter().find(|e| e.catalog_id == catalog_id)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        let fail = |reason: &str| -> SimResult<()> {
            Err(SimError::InvalidConfig { reason: reason.to_string() })
        };

        let g = &self.grid;
        if g.tile_size <= 0 || g.screen_width < g.tile_size || g.screen_height < 2 * g.tile_size {
            return fail("grid must hold at least one walkable row of positive-size tiles");
        }
        if self.layout.cashier_tiles.is_empty() {
            return fail("at least one cashier tile is required");
        }
        if let Some(t) = self.layout.cashier_tiles.iter().find(|t| !g.in_walkable_bounds(**t)) {
            return fail(&format!("cashier tile ({}, {}) is outside the walkable area", t.x, t.y));
        }
        if !g.in_walkable_bounds(self.layout.entrance) {
            return fail("entrance tile is outside the walkable area");
        }
        if self.clock.tick_ms == 0 {
            return fail("clock.tick_ms must be > 0");
        }

        let c = &self.customer;
        if c.satisfaction_min >= c.satisfaction_max || c.satisfaction_min <= 0 {
            return fail("customer satisfaction range must be non-empty and positive");
        }
        if c.cosmetic_variants == 0 {
            return fail("customer.cosmetic_variants must be > 0");
        }
        if c.browse_min_steps == 0 || c.browse_min_steps > c.browse_max_steps {
            return fail("customer browse step range is invalid");
        }
        for (name, p) in [
            ("decay_chance", c.decay_chance),
            ("interaction_attempt_chance", c.interaction_attempt_chance),
            ("interaction_candidate_chance", c.interaction_candidate_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return fail(&format!("customer.{name} must be within [0, 1]"));
            }
        }

        if self.spawn.roll_range == 0 || self.spawn.reputation_divisor <= 0.0 {
            return fail("spawn.roll_range and spawn.reputation_divisor must be > 0");
        }
        if self.economy.interaction_price_divisor <= 0 {
            return fail("economy.interaction_price_divisor must be > 0");
        }
        if self.waste.enabled && (self.waste.spawn_interval_ms == 0 || self.waste.size <= 0) {
            return fail("waste interval and size must be > 0 when waste is enabled");
        }
        if self.catalog.iter().any(|e| e.price < 0) {
            return fail("catalog prices must not be negative");
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        let grid = Grid::new(50, 800, 600);
        Self {
            layout: LayoutConfig::for_grid(&grid),
            grid,
            clock: ClockConfig { tick_ms: 16 },
            customer: CustomerConfig {
                max_customers: 10,
                satisfaction_min: 50,
                satisfaction_max: 100,
                cosmetic_variants: 15,
                move_delay_ms: 111,
                payment_duration_ms: 4_000,
                interaction_duration_ms: 4_000,
                decay_chance: 0.1,
                interaction_attempt_chance: 1.0,
                interaction_candidate_chance: 0.2,
                interaction_satisfaction_gain: 5,
                browse_min_steps: 5,
                browse_max_steps: 10,
                navigation: Navigation::AStar,
            },
            spawn: SpawnConfig {
                roll_range: 300,
                reputation_divisor: 3_000.0,
            },
            economy: EconomyConfig {
                starting_money: 100,
                starting_reputation: 100.0,
                cashier_payment: 5,
                interaction_price_divisor: 5,
                interaction_reputation: 1.0,
            },
            waste: WasteConfig {
                enabled: true,
                spawn_interval_ms: 33_000,
                max_waste: 10,
                size: 30,
                clean_reputation: 5.0,
            },
            pathfinding: PathfindingConfig::default(),
            catalog: default_catalog(),
        }
    }
}

fn default_catalog() -> Vec<CatalogEntry> {
    let entry = |id: &str, label: &str, category, price| CatalogEntry {
        catalog_id: id.into(),
        label: label.into(),
        category,
        price,
    };
    vec![
        entry("table", "Table", CatalogCategory::Item, 50),
        entry("chair", "Chair", CatalogCategory::Item, 30),
        entry("coffee", "Coffee", CatalogCategory::Item, 20),
        entry("cat_1", "Cat1", CatalogCategory::Cat, 80),
        entry("cat_2", "Cat2", CatalogCategory::Cat, 90),
        entry("cat_3", "Cat3", CatalogCategory::Cat, 100),
        entry("waiter", "Waiter", CatalogCategory::Employee, 100),
        entry("chef", "Chef", CatalogCategory::Employee, 120),
        entry("cleaner", "Cleaner", CatalogCategory::Employee, 80),
    ]
}

//! Cat café floor simulation: grid, obstacles, A* routing, customers,
//! waste, and the economy they feed.

pub mod clock;
pub mod command;
pub mod config;
pub mod customer;
pub mod customer_subsystem;
pub mod economy;
pub mod engine;
pub mod error;
pub mod event;
pub mod grid;
pub mod obstacle;
pub mod pathfinding;
pub mod rng;
pub mod snapshot;
pub mod store;
pub mod subsystem;
pub mod types;
pub mod waste_subsystem;

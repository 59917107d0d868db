//! A* search over the tile grid.
//!
//! Costs are whole tiles; the heuristic is Manhattan distance in tiles,
//! which is admissible and consistent for 4-directional movement.
//! Routes are returned start-exclusive: the first waypoint is the first
//! tile to step onto, the last is the goal.

use crate::{
    grid::{Direction, Grid, TilePos},
    obstacle::ObstacleSnapshot,
};
use serde::{Deserialize, Serialize};
use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap, HashSet},
};

/// How a tile that is already queued reacts to a cheaper route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxPolicy {
    /// The first cost discovered for a tile wins, even if a cheaper one
    /// turns up later. Deterministic, but may return a non-shortest route.
    FirstDiscovered,
    /// Standard A*: a cheaper tentative cost re-parents and re-queues.
    #[default]
    Improve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathNode {
    tile:   TilePos,
    g_cost: u32,
    f_cost: u32,
    seq:    u64,
}

impl PathNode {
    fn h_cost(&self) -> u32 {
        self.f_cost - self.g_cost
    }

    fn order_key(&self) -> (u32, u32, u64) {
        (self.f_cost, self.h_cost(), self.seq)
    }
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a route from `start` to `goal`, avoiding every obstacle in the
/// snapshot. Returns an empty route when the goal is unreachable, blocked,
/// or equal to the start.
pub fn find_path(
    grid:      &Grid,
    start:     TilePos,
    goal:      TilePos,
    obstacles: &ObstacleSnapshot,
    policy:    RelaxPolicy,
) -> Vec<TilePos> {
    if start == goal || !grid.is_walkable(goal, obstacles) {
        return Vec::new();
    }

    let mut open: BinaryHeap<Reverse<PathNode>> = BinaryHeap::new();
    let mut closed: HashSet<TilePos> = HashSet::new();
    let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
    let mut best_g: HashMap<TilePos, u32> = HashMap::new();
    let mut seq = 0u64;

    open.push(Reverse(PathNode {
        tile:   start,
        g_cost: 0,
        f_cost: start.manhattan(goal),
        seq,
    }));
    best_g.insert(start, 0);

    while let Some(Reverse(current)) = open.pop() {
        if closed.contains(&current.tile) {
            // Stale entry left behind by a re-queue.
            continue;
        }
        if current.tile == goal {
            return reconstruct_path(&came_from, start, goal);
        }
        closed.insert(current.tile);

        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            let neighbor = current.tile.offset(dx, dy);

            if !grid.is_walkable(neighbor, obstacles) || closed.contains(&neighbor) {
                continue;
            }

            let tentative_g = current.g_cost + 1;
            let queued_g = best_g.get(&neighbor).copied();
            let accept = match (queued_g, policy) {
                (None, _) => true,
                (Some(_), RelaxPolicy::FirstDiscovered) => false,
                (Some(g), RelaxPolicy::Improve) => tentative_g < g,
            };
            if !accept {
                continue;
            }

            best_g.insert(neighbor, tentative_g);
            came_from.insert(neighbor, current.tile);
            seq += 1;
            open.push(Reverse(PathNode {
                tile:   neighbor,
                g_cost: tentative_g,
                f_cost: tentative_g + neighbor.manhattan(goal),
                seq,
            }));
        }
    }

    Vec::new()
}

fn reconstruct_path(
    came_from: &HashMap<TilePos, TilePos>,
    start:     TilePos,
    goal:      TilePos,
) -> Vec<TilePos> {
    let mut route = vec![goal];
    let mut cursor = goal;
    while let Some(&prev) = came_from.get(&cursor) {
        if prev == start {
            break;
        }
        route.push(prev);
        cursor = prev;
    }
    route.reverse();
    route
}

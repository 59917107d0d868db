//! Grid model: maps screen pixels onto the tile lattice.
//!
//! RULE: Row 0 is the wall/entrance row and is never walkable.
//! Everything that moves does so in whole tiles.

use crate::obstacle::ObstacleSnapshot;
use serde::{Deserialize, Serialize};

/// A tile coordinate (column, row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    /// Manhattan distance in tiles.
    pub fn manhattan(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// An axis-aligned rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    /// Inclusive containment, matching how clicks are hit-tested.
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

/// The four cardinal directions a customer may browse in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    East,
    West,
    South,
    North,
}

impl Direction {
    /// Expansion order used by the pathfinder.
    pub const ALL: [Direction; 4] = [Direction::East, Direction::West, Direction::South, Direction::North];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::South => (0, 1),
            Direction::North => (0, -1),
        }
    }
}

/// Immutable grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub tile_size:     i32,
    pub screen_width:  i32,
    pub screen_height: i32,
}

impl Grid {
    pub fn new(tile_size: i32, screen_width: i32, screen_height: i32) -> Self {
        Self { tile_size, screen_width, screen_height }
    }

    pub fn columns(&self) -> i32 {
        self.screen_width / self.tile_size
    }

    pub fn rows(&self) -> i32 {
        self.screen_height / self.tile_size
    }

    /// The tile containing screen point (px, py).
    pub fn tile_at(&self, px: i32, py: i32) -> TilePos {
        TilePos::new(px.div_euclid(self.tile_size), py.div_euclid(self.tile_size))
    }

    /// Top-left screen coordinate of a tile.
    pub fn to_screen(&self, tile: TilePos) -> (i32, i32) {
        (tile.x * self.tile_size, tile.y * self.tile_size)
    }

    pub fn tile_rect(&self, tile: TilePos) -> Rect {
        let (x, y) = self.to_screen(tile);
        Rect::new(x, y, self.tile_size, self.tile_size)
    }

    /// Inside the screen and not on the reserved row.
    pub fn in_walkable_bounds(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.x < self.columns() && tile.y >= 1 && tile.y < self.rows()
    }

    /// The single walkability predicate shared by pathfinding and
    /// direct-step collision checks. O(obstacles), allocation-free.
    pub fn is_walkable(&self, tile: TilePos, obstacles: &ObstacleSnapshot) -> bool {
        self.in_walkable_bounds(tile) && !obstacles.blocks(&self.tile_rect(tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacle::Obstacle;

    fn grid() -> Grid {
        Grid::new(50, 800, 600)
    }

    #[test]
    fn row_zero_is_never_walkable() {
        let empty = ObstacleSnapshot::default();
        for x in 0..grid().columns() {
            assert!(!grid().is_walkable(TilePos::new(x, 0), &empty));
        }
        assert!(grid().is_walkable(TilePos::new(0, 1), &empty));
    }

    #[test]
    fn out_of_bounds_tiles_are_blocked() {
        let empty = ObstacleSnapshot::default();
        assert!(!grid().is_walkable(TilePos::new(-1, 3), &empty));
        assert!(!grid().is_walkable(TilePos::new(16, 3), &empty));
        assert!(!grid().is_walkable(TilePos::new(3, 12), &empty));
        assert!(grid().is_walkable(TilePos::new(15, 11), &empty));
    }

    #[test]
    fn obstacle_blocks_only_the_tiles_it_overlaps() {
        let snapshot = ObstacleSnapshot::from(vec![Obstacle::new("o", Rect::new(100, 100, 100, 50), 0)]);
        assert!(!grid().is_walkable(TilePos::new(2, 2), &snapshot));
        assert!(!grid().is_walkable(TilePos::new(3, 2), &snapshot));
        // Edge-adjacent neighbours stay open.
        assert!(grid().is_walkable(TilePos::new(1, 2), &snapshot));
        assert!(grid().is_walkable(TilePos::new(4, 2), &snapshot));
        assert!(grid().is_walkable(TilePos::new(2, 3), &snapshot));
    }

    #[test]
    fn screen_points_snap_to_tiles() {
        assert_eq!(grid().tile_at(375, 50), TilePos::new(7, 1));
        assert_eq!(grid().tile_at(49, 99), TilePos::new(0, 1));
        assert_eq!(grid().to_screen(TilePos::new(7, 1)), (350, 50));
    }
}

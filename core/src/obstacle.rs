//! Obstacle index: everything placed on the café floor.
//!
//! RULE: The index is owned and mutated by the engine only.
//! Subsystems see an `ObstacleSnapshot` copied at the start of each tick,
//! never a reference into the live index.

use crate::{
    grid::{Grid, Rect, TilePos},
    types::{EntityId, Money, SimMillis},
};
use serde::{Deserialize, Serialize};

/// Capability shared by everything a customer or the player can touch.
pub trait Interactable {
    fn bounding_box(&self) -> Rect;

    /// Record that the object was just used.
    fn on_interact(&mut self, now: SimMillis);

    fn contains(&self, px: i32, py: i32) -> bool {
        self.bounding_box().contains_point(px, py)
    }
}

/// What a placed object is. Every variant blocks the tiles it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectKind {
    Furniture { name: String },
    Cat { breed: String },
    Employee { role: String },
}

impl ObjectKind {
    pub fn label(&self) -> &str {
        match self {
            Self::Furniture { name } => name,
            Self::Cat { breed } => breed,
            Self::Employee { role } => role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedObject {
    pub object_id:     EntityId,
    pub kind:          ObjectKind,
    pub bounds:        Rect,
    pub price:         Money,
    /// Last time a customer used it; drives the "interacted" highlight.
    pub interacted_at: Option<SimMillis>,
}

impl Interactable for PlacedObject {
    fn bounding_box(&self) -> Rect {
        self.bounds
    }

    fn on_interact(&mut self, now: SimMillis) {
        self.interacted_at = Some(now);
    }
}

/// Within one tile of `tile` on both axes, comparing top-left corners in
/// screen pixels.
fn within_reach(bounds: &Rect, grid: &Grid, tile: TilePos) -> bool {
    let (px, py) = grid.to_screen(tile);
    (px - bounds.x).abs() <= grid.tile_size && (py - bounds.y).abs() <= grid.tile_size
}

/// The read-only view of one obstacle inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obstacle {
    pub object_id: EntityId,
    pub bounds:    Rect,
    pub price:     Money,
}

impl Obstacle {
    pub fn new(object_id: impl Into<EntityId>, bounds: Rect, price: Money) -> Self {
        Self { object_id: object_id.into(), bounds, price }
    }
}

/// An owned, ordered copy of the obstacle set for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObstacleSnapshot {
    obstacles: Vec<Obstacle>,
}

impl From<Vec<Obstacle>> for ObstacleSnapshot {
    fn from(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }
}

impl ObstacleSnapshot {
    pub fn blocks(&self, rect: &Rect) -> bool {
        self.obstacles.iter().any(|o| o.bounds.intersects(rect))
    }

    /// Obstacles a customer standing on `tile` can reach, in placement order.
    pub fn near<'a>(&'a self, grid: &'a Grid, tile: TilePos) -> impl Iterator<Item = &'a Obstacle> + 'a {
        self.obstacles.iter().filter(move |o| within_reach(&o.bounds, grid, tile))
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

/// The live set of placed objects, in placement order.
#[derive(Debug, Clone, Default)]
pub struct ObstacleIndex {
    objects: Vec<PlacedObject>,
    next_id: u64,
}

impl ObstacleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object and return its new id.
    pub fn place(&mut self, kind: ObjectKind, bounds: Rect, price: Money) -> EntityId {
        self.next_id += 1;
        let object_id = format!("obj-{:06}", self.next_id);
        self.objects.push(PlacedObject {
            object_id: object_id.clone(),
            kind,
            bounds,
            price,
            interacted_at: None,
        });
        object_id
    }

    pub fn remove(&mut self, object_id: &str) -> Option<PlacedObject> {
        let pos = self.objects.iter().position(|o| o.object_id == object_id)?;
        Some(self.objects.remove(pos))
    }

    pub fn get(&self, object_id: &str) -> Option<&PlacedObject> {
        self.objects.iter().find(|o| o.object_id == object_id)
    }

    pub fn get_mut(&mut self, object_id: &str) -> Option<&mut PlacedObject> {
        self.objects.iter_mut().find(|o| o.object_id == object_id)
    }

    pub fn objects(&self) -> &[PlacedObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn snapshot(&self) -> ObstacleSnapshot {
        self.objects
            .iter()
            .map(|o| Obstacle::new(o.object_id.clone(), o.bounds, o.price))
            .collect::<Vec<_>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let mut index = ObstacleIndex::new();
        let id = index.place(
            ObjectKind::Furniture { name: "Table".into() },
            Rect::new(100, 100, 50, 50),
            50,
        );
        let snapshot = index.snapshot();
        index.remove(&id);

        assert!(index.is_empty());
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.blocks(&Rect::new(100, 100, 50, 50)));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut index = ObstacleIndex::new();
        let kind = ObjectKind::Cat { breed: "Tabby Cat".into() };
        let a = index.place(kind.clone(), Rect::new(0, 50, 50, 50), 80);
        index.remove(&a);
        let b = index.place(kind, Rect::new(0, 50, 50, 50), 80);
        assert_ne!(a, b);
    }

    #[test]
    fn interaction_marks_the_object() {
        let mut index = ObstacleIndex::new();
        let id = index.place(
            ObjectKind::Employee { role: "Waiter".into() },
            Rect::new(50, 50, 50, 50),
            100,
        );
        let obj = index.get_mut(&id).unwrap();
        assert!(obj.contains(75, 75));
        obj.on_interact(4_200);
        assert_eq!(index.get(&id).unwrap().interacted_at, Some(4_200));
    }

    #[test]
    fn reach_covers_the_eight_surrounding_tiles() {
        let grid = Grid::new(50, 800, 600);
        let mut index = ObstacleIndex::new();
        let kind = ObjectKind::Furniture { name: "Chair".into() };
        let diagonal = index.place(kind.clone(), grid.tile_rect(TilePos::new(6, 6)), 30);
        index.place(kind, grid.tile_rect(TilePos::new(7, 5)), 30);
        let snapshot = index.snapshot();

        let near: Vec<_> = snapshot.near(&grid, TilePos::new(5, 5)).map(|o| &o.object_id).collect();
        assert_eq!(near, vec![&diagonal]);
        assert_eq!(snapshot.near(&grid, TilePos::new(6, 5)).count(), 2);
    }
}

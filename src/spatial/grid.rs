//! Uniform grid for proximity queries
//!
//! The grid covers the world extent with square cells of fixed size.
//! Positions outside the extent are bucketed into the nearest border cell,
//! so every inserted id always lives in exactly one cell.

use ahash::AHashMap;
use ordered_float::OrderedFloat;

use crate::core::types::{EntityId, Vec2};

const BOUNDS_PAD: f32 = 1e-3;

/// Where an id currently lives in the grid
#[derive(Debug, Clone, Copy)]
struct GridEntry {
    cell: usize,
    /// Index inside `cells[cell]`, kept exact across swap-removes
    slot: usize,
    position: Vec2,
}

/// Uniform grid with a reverse id -> cell map for O(1) removal
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,
    cells: Vec<Vec<EntityId>>,
    entries: AHashMap<EntityId, GridEntry>,
}

impl SpatialGrid {
    /// Create a grid covering `[0, world_width] x [0, world_height]`
    pub fn new(world_width: f32, world_height: f32, cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::EPSILON);
        let width = ((world_width / cell_size).ceil() as usize).max(1);
        let height = ((world_height / cell_size).ceil() as usize).max(1);

        Self {
            width,
            height,
            cell_size,
            cells: vec![Vec::new(); width * height],
            entries: AHashMap::new(),
        }
    }

    /// Convert world position to cell coordinates, clamped to the grid
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> (usize, usize) {
        let x = (pos.x / self.cell_size).floor() as i64;
        let y = (pos.y / self.cell_size).floor() as i64;
        (
            x.clamp(0, self.width as i64 - 1) as usize,
            y.clamp(0, self.height as i64 - 1) as usize,
        )
    }

    #[inline]
    fn cell_index(&self, pos: Vec2) -> usize {
        let (x, y) = self.world_to_cell(pos);
        y * self.width + x
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entries.contains_key(&entity)
    }

    pub fn position_of(&self, entity: EntityId) -> Option<Vec2> {
        self.entries.get(&entity).map(|e| e.position)
    }

    /// Cell coordinates the id is bucketed in
    pub fn cell_of(&self, entity: EntityId) -> Option<(usize, usize)> {
        self.entries
            .get(&entity)
            .map(|e| (e.cell % self.width, e.cell / self.width))
    }

    /// Ids bucketed in one cell, in slot order
    pub fn cell_contents(&self, x: usize, y: usize) -> &[EntityId] {
        if x < self.width && y < self.height {
            &self.cells[y * self.width + x]
        } else {
            &[]
        }
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.entries.clear();
    }

    /// Bucket an id at a position. Re-inserting a known id moves it.
    pub fn insert(&mut self, entity: EntityId, pos: Vec2) {
        if self.entries.contains_key(&entity) {
            self.update(entity, pos);
            return;
        }
        let cell = self.cell_index(pos);
        let slot = self.push_into(cell, entity);
        self.entries.insert(entity, GridEntry { cell, slot, position: pos });
    }

    /// Drop an id from its cell and the reverse map. Returns false if unknown.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        match self.entries.remove(&entity) {
            Some(entry) => {
                self.take_from(entry.cell, entry.slot);
                true
            }
            None => false,
        }
    }

    /// Move a known id. Staying inside the same cell only refreshes the
    /// recorded position. Returns false if the id is unknown.
    pub fn update(&mut self, entity: EntityId, pos: Vec2) -> bool {
        let Some(entry) = self.entries.get(&entity).copied() else {
            return false;
        };

        let cell = self.cell_index(pos);
        if cell == entry.cell {
            if let Some(e) = self.entries.get_mut(&entity) {
                e.position = pos;
            }
            return true;
        }

        self.take_from(entry.cell, entry.slot);
        let slot = self.push_into(cell, entity);
        self.entries.insert(entity, GridEntry { cell, slot, position: pos });
        true
    }

    fn push_into(&mut self, cell: usize, entity: EntityId) -> usize {
        let bucket = &mut self.cells[cell];
        bucket.push(entity);
        bucket.len() - 1
    }

    fn take_from(&mut self, cell: usize, slot: usize) {
        let bucket = &mut self.cells[cell];
        bucket.swap_remove(slot);
        if let Some(&moved) = bucket.get(slot) {
            if let Some(e) = self.entries.get_mut(&moved) {
                e.slot = slot;
            }
        }
    }

    /// Visit every id in the cells overlapping the square of half-size `radius`
    ///
    /// The square is padded slightly so float rounding on the bounds can
    /// never drop an id the exact distance check would accept.
    fn visit_candidates(&self, center: Vec2, radius: f32, mut visit: impl FnMut(EntityId, Vec2)) {
        let reach = radius + BOUNDS_PAD;
        let (min_x, min_y) = self.world_to_cell(Vec2::new(center.x - reach, center.y - reach));
        let (max_x, max_y) = self.world_to_cell(Vec2::new(center.x + reach, center.y + reach));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                for &entity in &self.cells[y * self.width + x] {
                    if let Some(entry) = self.entries.get(&entity) {
                        visit(entity, entry.position);
                    }
                }
            }
        }
    }

    /// All ids whose distance to `center` is at most `radius`
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        self.query_filtered(center, radius, |_| true)
    }

    /// Radius query with an extra per-id predicate
    pub fn query_filtered(
        &self,
        center: Vec2,
        radius: f32,
        mut keep: impl FnMut(EntityId) -> bool,
    ) -> Vec<EntityId> {
        let mut found = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return found;
        }
        self.visit_candidates(center, radius, |entity, pos| {
            if center.distance(&pos) <= radius && keep(entity) {
                found.push(entity);
            }
        });
        found
    }

    /// Radius query returning `(id, distance)` nearest-first, ties by id
    pub fn query_nearest(
        &self,
        center: Vec2,
        radius: f32,
        mut keep: impl FnMut(EntityId) -> bool,
    ) -> Vec<(EntityId, f32)> {
        let mut found = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return found;
        }
        self.visit_candidates(center, radius, |entity, pos| {
            let distance = center.distance(&pos);
            if distance <= radius && keep(entity) {
                found.push((entity, distance));
            }
        });
        found.sort_by_key(|&(entity, distance)| (OrderedFloat(distance), entity));
        found
    }
}

//! ECS World - manages all entities, their components and the spatial grid
//!
//! The world is the only writer of both the component tables and the
//! spatial grid, which is what keeps them consistent: attaching a Transform
//! buckets the entity, `set_position` moves both, and `delete_entity` drops
//! the entity from every table and the grid in one call.

use crate::core::types::{EntityId, Tick, Vec2};
use crate::ecs::components::{
    Component, ComponentKind, ComponentTables, PlainComponent, Tag, Transform,
};
use crate::ecs::system::{System, SystemKind};
use crate::ecs::table::ComponentTable;
use crate::spatial::SpatialGrid;

/// The simulation world containing all entities
pub struct World {
    pub current_tick: Tick,
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    live_count: usize,
    tables: ComponentTables,
    spatial: SpatialGrid,
    systems: Vec<Box<dyn System>>,
    width: f32,
    height: f32,
}

impl World {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        Self {
            current_tick: 0,
            generations: Vec::new(),
            alive: Vec::new(),
            free: Vec::new(),
            live_count: 0,
            tables: ComponentTables::default(),
            spatial: SpatialGrid::new(width, height, cell_size),
            systems: Vec::new(),
            width,
            height,
        }
    }

    pub fn extent(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    // === ENTITIES ===

    /// Allocate an id not held by any live entity. Freed slots are reused
    /// with a bumped generation.
    pub fn create_entity(&mut self) -> EntityId {
        self.live_count += 1;
        if let Some(index) = self.free.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            return EntityId::new(index, self.generations[slot]);
        }

        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        EntityId::new(index, 0)
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        let slot = entity.index as usize;
        slot < self.alive.len() && self.alive[slot] && self.generations[slot] == entity.generation
    }

    pub fn entity_count(&self) -> usize {
        self.live_count
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, &alive)| alive)
            .map(|(i, _)| EntityId::new(i as u32, self.generations[i]))
    }

    /// Remove the entity from every table and from the grid. Unknown or
    /// stale ids are ignored.
    pub fn delete_entity(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        self.tables.remove_all(entity);
        self.spatial.remove(entity);

        let slot = entity.index as usize;
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(entity.index);
        self.live_count -= 1;
        true
    }

    // === COMPONENTS ===

    /// Attach or overwrite a component. Ignored for ids that are not live.
    pub fn add_component<C: Component>(&mut self, entity: EntityId, component: C) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        component.attached(entity, &mut self.spatial);
        C::table_mut(&mut self.tables).insert(entity, component);
        true
    }

    pub fn get_component<C: Component>(&self, entity: EntityId) -> Option<&C> {
        C::table(&self.tables).get(entity)
    }

    pub fn get_component_mut<C: PlainComponent>(&mut self, entity: EntityId) -> Option<&mut C> {
        C::table_mut(&mut self.tables).get_mut(entity)
    }

    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> Option<C> {
        let removed = C::table_mut(&mut self.tables).remove(entity);
        if removed.is_some() {
            C::detached(entity, &mut self.spatial);
        }
        removed
    }

    /// Every component of one kind, keyed by entity
    pub fn components<C: Component>(&self) -> &ComponentTable<C> {
        C::table(&self.tables)
    }

    pub fn has_component(&self, entity: EntityId, kind: ComponentKind) -> bool {
        self.tables.contains(kind, entity)
    }

    pub fn component_ids(&self, kind: ComponentKind) -> &[EntityId] {
        self.tables.ids(kind)
    }

    pub fn tables(&self) -> &ComponentTables {
        &self.tables
    }

    /// Mutable access for systems. Transforms edited through this must
    /// be followed by `resync_spatial`.
    pub(crate) fn tables_mut(&mut self) -> &mut ComponentTables {
        &mut self.tables
    }

    pub fn count_tagged(&self, label: &str) -> usize {
        self.tables.tags.iter().filter(|(_, tag)| tag.is(label)).count()
    }

    // === POSITION ===

    pub fn position(&self, entity: EntityId) -> Option<Vec2> {
        self.tables.transforms.get(entity).map(|t| t.position)
    }

    /// Move an entity; writes the Transform and the grid together
    pub fn set_position(&mut self, entity: EntityId, position: Vec2) -> bool {
        match self.tables.transforms.get_mut(entity) {
            Some(transform) => {
                transform.position = position;
                self.spatial.update(entity, position);
                true
            }
            None => false,
        }
    }

    /// Re-bucket any Transform the grid disagrees with; returns the number fixed
    pub fn resync_spatial(&mut self) -> usize {
        let mut repaired = 0;
        for (id, transform) in self.tables.transforms.iter() {
            if self.spatial.position_of(id) != Some(transform.position) {
                self.spatial.insert(id, transform.position);
                repaired += 1;
            }
        }
        repaired
    }

    pub fn spatial(&self) -> &SpatialGrid {
        &self.spatial
    }

    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        self.spatial.query_radius(center, radius)
    }

    /// Ids carrying `label` within `radius`, nearest first
    pub fn query_by_tag(&self, label: &str, center: Vec2, radius: f32) -> Vec<EntityId> {
        let tags = &self.tables.tags;
        self.spatial
            .query_nearest(center, radius, |id| tags.get(id).is_some_and(|t: &Tag| t.is(label)))
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    // === SYSTEMS ===

    pub fn register_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    pub fn system(&self, kind: SystemKind) -> Option<&dyn System> {
        self.systems.iter().find(|s| s.kind() == kind).map(|s| s.as_ref())
    }

    pub fn system_kinds(&self) -> Vec<SystemKind> {
        self.systems.iter().map(|s| s.kind()).collect()
    }

    /// Detach the registered systems, order preserved
    pub fn take_systems(&mut self) -> Vec<Box<dyn System>> {
        std::mem::take(&mut self.systems)
    }

    /// Register systems detached from another world, ahead of any
    /// registered here already
    pub fn adopt_systems(&mut self, mut systems: Vec<Box<dyn System>>) {
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    /// Run every registered system once, in registration order
    pub fn update(&mut self, dt: f32) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in systems.iter_mut() {
            system.run(self, dt);
        }
        // systems registered while running go after the existing ones
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    pub fn tick(&mut self) {
        self.current_tick += 1;
    }
}

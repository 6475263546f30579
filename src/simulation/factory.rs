//! Entity factory - how agents, food and workplaces are assembled

use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Vec2};
use crate::ecs::components::{Behavior, Render, Tag, Transform, Wallet, Workplace};
use crate::ecs::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Agent,
    Food,
    Work,
}

impl EntityKind {
    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::Agent => Tag::AGENT,
            EntityKind::Food => Tag::FOOD,
            EntityKind::Work => Tag::WORK,
        }
    }
}

/// Creation and removal primitives the population manager builds on
pub trait EntityFactory {
    fn create_entity(&mut self, world: &mut World, kind: EntityKind, position: Vec2) -> EntityId;

    fn remove_entity(&mut self, world: &mut World, id: EntityId) -> bool {
        world.delete_entity(id)
    }
}

/// Attaches Transform, Tag and Render to everything, plus Behavior and
/// Wallet for agents and Workplace for work sites
#[derive(Debug, Clone)]
pub struct StandardFactory {
    pub workplace_capacity: usize,
    pub workplace_wage: f32,
    pub initial_energy: f32,
    pub sprite_size: (f32, f32),
}

impl StandardFactory {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            workplace_capacity: config.workplace_capacity,
            workplace_wage: config.workplace_wage,
            initial_energy: config.initial_energy,
            sprite_size: (32.0, 32.0),
        }
    }
}

impl EntityFactory for StandardFactory {
    fn create_entity(&mut self, world: &mut World, kind: EntityKind, position: Vec2) -> EntityId {
        let id = world.create_entity();
        world.add_component(id, Transform::at(position));
        world.add_component(id, Tag::new(kind.tag()));
        world.add_component(
            id,
            Render { sprite: kind.tag().to_string(), size: self.sprite_size },
        );

        match kind {
            EntityKind::Agent => {
                world.add_component(
                    id,
                    Behavior { energy: self.initial_energy, ..Default::default() },
                );
                world.add_component(id, Wallet::default());
            }
            EntityKind::Work => {
                world.add_component(
                    id,
                    Workplace::new(self.workplace_capacity, self.workplace_wage),
                );
            }
            EntityKind::Food => {}
        }

        id
    }
}

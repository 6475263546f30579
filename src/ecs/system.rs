//! Systems run by `World::update`, in registration order

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, Vec2};
use crate::ecs::components::{BehaviorState, Render};
use crate::ecs::world::World;

/// Label a system is registered and looked up under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    Movement,
    SpatialSync,
    Behavior,
    Render,
}

pub trait System {
    fn kind(&self) -> SystemKind;
    fn run(&mut self, world: &mut World, dt: f32);
}

/// Integrates velocities, clamped to the world extent
#[derive(Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn kind(&self) -> SystemKind {
        SystemKind::Movement
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        let (width, height) = world.extent();
        let moves: Vec<(EntityId, Vec2)> = world
            .tables()
            .transforms
            .iter()
            .filter(|(_, t)| t.velocity != Vec2::ZERO)
            .map(|(id, t)| (id, (t.position + t.velocity * dt).clamp_to(width, height)))
            .collect();

        for (id, position) in moves {
            world.set_position(id, position);
        }
    }
}

/// Re-buckets any entity whose grid entry disagrees with its Transform.
/// With every move going through `set_position` this finds nothing.
#[derive(Debug, Default)]
pub struct SpatialSyncSystem {
    pub repaired: usize,
}

impl System for SpatialSyncSystem {
    fn kind(&self) -> SystemKind {
        SystemKind::SpatialSync
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let repaired = world.resync_spatial();
        if repaired > 0 {
            tracing::warn!("Spatial sync repaired {} drifted entries", repaired);
        }
        self.repaired += repaired;
    }
}

/// Ages behaviour states and drops expired ones back to idle
#[derive(Debug)]
pub struct BehaviorSystem {
    /// How long an action label stays visible
    pub hold: f32,
}

impl Default for BehaviorSystem {
    fn default() -> Self {
        Self { hold: 1.0 }
    }
}

impl System for BehaviorSystem {
    fn kind(&self) -> SystemKind {
        SystemKind::Behavior
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        for (_, behavior) in world.tables_mut().behaviors.iter_mut() {
            behavior.state_age += dt;
            if behavior.state != BehaviorState::Idle && behavior.state_age > self.hold {
                behavior.enter(BehaviorState::Idle);
            }
        }
    }
}

pub type RenderHook = Box<dyn FnMut(EntityId, Vec2, &Render)>;

/// Hands every renderable entity's position to the rendering collaborator
pub struct RenderSystem {
    hook: RenderHook,
}

impl RenderSystem {
    pub fn new(hook: impl FnMut(EntityId, Vec2, &Render) + 'static) -> Self {
        Self { hook: Box::new(hook) }
    }
}

impl System for RenderSystem {
    fn kind(&self) -> SystemKind {
        SystemKind::Render
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let tables = world.tables();
        for (id, render) in tables.renders.iter() {
            if let Some(transform) = tables.transforms.get(id) {
                (self.hook)(id, transform.position, render);
            }
        }
    }
}

/// The standard pipeline: movement, spatial sync, behaviour
pub fn default_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(MovementSystem),
        Box::new(SpatialSyncSystem::default()),
        Box::new(BehaviorSystem::default()),
    ]
}

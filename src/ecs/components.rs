//! Component kinds attached to entities

use serde::{Deserialize, Serialize};

use crate::actions::catalog::ActionId;
use crate::core::types::{EntityId, Vec2};
use crate::ecs::table::ComponentTable;
use crate::spatial::SpatialGrid;

/// Enum label for every component table the store owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Transform,
    Behavior,
    Tag,
    Workplace,
    Wallet,
    Render,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Transform,
        ComponentKind::Behavior,
        ComponentKind::Tag,
        ComponentKind::Workplace,
        ComponentKind::Wallet,
        ComponentKind::Render,
    ];
}

/// Position and velocity. Only `World::set_position` may move it, which
/// keeps the spatial grid in lockstep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self { position, velocity: Vec2::ZERO }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorState {
    #[default]
    Idle,
    Acting(ActionId),
}

impl BehaviorState {
    pub fn label(&self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Acting(action) => action.name(),
        }
    }
}

/// Visible behaviour state plus the numeric properties a renderer shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    pub state: BehaviorState,
    /// Time spent in `state`
    pub state_age: f32,
    pub energy: f32,
    pub money: f32,
    pub mood: f32,
}

impl Behavior {
    pub fn enter(&mut self, state: BehaviorState) {
        self.state = state;
        self.state_age = 0.0;
    }
}

/// Category label used by tag-filtered spatial queries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub label: String,
}

impl Tag {
    pub const AGENT: &'static str = "agent";
    pub const FOOD: &'static str = "food";
    pub const WORK: &'static str = "work";

    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    pub fn is(&self, label: &str) -> bool {
        self.label == label
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workplace {
    /// Insertion-ordered set of current workers
    pub workers: Vec<EntityId>,
    pub max_workers: usize,
    pub base_wage: f32,
    /// Wages paid out so far
    pub expenses: f32,
}

impl Workplace {
    pub fn new(max_workers: usize, base_wage: f32) -> Self {
        Self {
            workers: Vec::new(),
            max_workers,
            base_wage,
            expenses: 0.0,
        }
    }

    pub fn employs(&self, worker: EntityId) -> bool {
        self.workers.contains(&worker)
    }

    pub fn has_spare_capacity(&self) -> bool {
        self.workers.len() < self.max_workers
    }

    /// Join the workforce. Existing members are accepted as-is.
    pub fn add_worker(&mut self, worker: EntityId) -> bool {
        if self.employs(worker) {
            return true;
        }
        if !self.has_spare_capacity() {
            return false;
        }
        self.workers.push(worker);
        true
    }

    pub fn remove_worker(&mut self, worker: EntityId) -> bool {
        let before = self.workers.len();
        self.workers.retain(|&w| w != worker);
        self.workers.len() != before
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub money: f32,
}

impl Wallet {
    pub fn add_money(&mut self, amount: f32) {
        self.money += amount;
    }
}

/// Render metadata owned by the rendering collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Render {
    pub sprite: String,
    pub size: (f32, f32),
}

/// Every component table, one field per kind
#[derive(Debug, Clone, Default)]
pub struct ComponentTables {
    pub transforms: ComponentTable<Transform>,
    pub behaviors: ComponentTable<Behavior>,
    pub tags: ComponentTable<Tag>,
    pub workplaces: ComponentTable<Workplace>,
    pub wallets: ComponentTable<Wallet>,
    pub renders: ComponentTable<Render>,
}

impl ComponentTables {
    pub fn contains(&self, kind: ComponentKind, entity: EntityId) -> bool {
        match kind {
            ComponentKind::Transform => self.transforms.contains(entity),
            ComponentKind::Behavior => self.behaviors.contains(entity),
            ComponentKind::Tag => self.tags.contains(entity),
            ComponentKind::Workplace => self.workplaces.contains(entity),
            ComponentKind::Wallet => self.wallets.contains(entity),
            ComponentKind::Render => self.renders.contains(entity),
        }
    }

    pub fn ids(&self, kind: ComponentKind) -> &[EntityId] {
        match kind {
            ComponentKind::Transform => self.transforms.ids(),
            ComponentKind::Behavior => self.behaviors.ids(),
            ComponentKind::Tag => self.tags.ids(),
            ComponentKind::Workplace => self.workplaces.ids(),
            ComponentKind::Wallet => self.wallets.ids(),
            ComponentKind::Render => self.renders.ids(),
        }
    }

    /// Drop `entity` from every table
    pub fn remove_all(&mut self, entity: EntityId) {
        self.transforms.remove(entity);
        self.behaviors.remove(entity);
        self.tags.remove(entity);
        self.workplaces.remove(entity);
        self.wallets.remove(entity);
        self.renders.remove(entity);
    }
}

/// A type stored in one of the world's component tables
pub trait Component: Sized {
    const KIND: ComponentKind;

    fn table(tables: &ComponentTables) -> &ComponentTable<Self>;
    fn table_mut(tables: &mut ComponentTables) -> &mut ComponentTable<Self>;

    /// Hook run after the component is attached
    fn attached(&self, _entity: EntityId, _spatial: &mut SpatialGrid) {}

    /// Hook run after the component is detached
    fn detached(_entity: EntityId, _spatial: &mut SpatialGrid) {}
}

/// Components whose fields can be edited in place. `Transform` is not one:
/// its position must move together with the spatial grid.
pub trait PlainComponent: Component {}

impl Component for Transform {
    const KIND: ComponentKind = ComponentKind::Transform;

    fn table(tables: &ComponentTables) -> &ComponentTable<Self> {
        &tables.transforms
    }

    fn table_mut(tables: &mut ComponentTables) -> &mut ComponentTable<Self> {
        &mut tables.transforms
    }

    fn attached(&self, entity: EntityId, spatial: &mut SpatialGrid) {
        spatial.insert(entity, self.position);
    }

    fn detached(entity: EntityId, spatial: &mut SpatialGrid) {
        spatial.remove(entity);
    }
}

macro_rules! plain_component {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;

            fn table(tables: &ComponentTables) -> &ComponentTable<Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut ComponentTables) -> &mut ComponentTable<Self> {
                &mut tables.$field
            }
        }

        impl PlainComponent for $ty {}
    };
}

plain_component!(Behavior, Behavior, behaviors);
plain_component!(Tag, Tag, tags);
plain_component!(Workplace, Workplace, workplaces);
plain_component!(Wallet, Wallet, wallets);
plain_component!(Render, Render, renders);

pub mod components;
pub mod system;
pub mod table;
pub mod world;

pub use components::{
    Behavior, BehaviorState, Component, ComponentKind, Render, Tag, Transform, Wallet, Workplace,
};
pub use system::{System, SystemKind};
pub use world::World;

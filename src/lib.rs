//! Genesis - evolving agent society simulation kernel
//!
//! Agents live in a 2D world held by an ECS store with a uniform spatial
//! grid. Each tick they sense a bucketed state, pick an action through a
//! learned policy, act on shared resources and learn from the reward.
//! Between epochs a genetic algorithm breeds the next generation.

pub mod actions;
pub mod brain;
pub mod core;
pub mod ecs;
pub mod genetics;
pub mod simulation;
pub mod spatial;

//! Agent - physiological state, genome and brain behind one entity

use crate::actions::catalog::ActionId;
use crate::brain::state::Features;
use crate::brain::DecisionEngine;
use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Vec2};
use crate::genetics::evolution::Survivor;
use crate::genetics::genome::Genome;

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: EntityId,
    pub genome: Genome,
    pub age: u32,
    pub energy: f32,
    /// 0 = sated, rises with metabolism every tick
    pub hunger: f32,
    /// Authoritative balance; the Wallet component mirrors it
    pub money: f32,
    pub mood: f32,
    pub generation: u32,
    pub offspring: u32,
    pub last_action: Option<ActionId>,
    pub employer: Option<EntityId>,
    pub brain: DecisionEngine,
}

impl Agent {
    pub fn new(id: EntityId, genome: Genome, brain: DecisionEngine, energy: f32) -> Self {
        Self {
            id,
            genome,
            age: 0,
            energy,
            hunger: 0.0,
            money: 0.0,
            mood: 0.0,
            generation: 0,
            offspring: 0,
            last_action: None,
            employer: None,
            brain,
        }
    }

    pub fn features(&self) -> Features {
        Features {
            hunger: self.hunger,
            energy: self.energy,
            money: self.money,
            mood: self.mood,
        }
    }

    /// Exploration shrinks as the agent ages
    pub fn exploration_rate(&self, base: f32) -> f32 {
        base / (1.0 + self.age as f32 / 100.0)
    }

    pub fn is_dead(&self, lifespan: u32) -> bool {
        self.energy <= 0.0 || self.age > lifespan
    }

    pub fn can_mate(&self, config: &SimulationConfig) -> bool {
        !self.is_dead(config.lifespan)
            && self.age >= config.mating_age
            && self.energy >= config.mating_energy
    }

    pub fn adjust_mood(&mut self, reward: f32, hunger_threshold: f32) {
        if reward > 0.0 {
            self.mood += 0.05;
        }
        if self.hunger >= hunger_threshold {
            self.mood -= 0.02;
        }
        self.mood = self.mood.clamp(-1.0, 1.0);
    }

    /// Burn energy and build hunger for one tick of living
    pub fn age_one_tick(&mut self, max_hunger: f32) {
        let metabolism = self.genome.metabolism();
        self.age += 1;
        self.energy -= metabolism / self.genome.stamina();
        self.hunger = (self.hunger + metabolism).min(max_hunger);
    }

    pub fn survivor(&self) -> Survivor {
        Survivor {
            genome: self.genome.clone(),
            age: self.age,
            money: self.money,
            offspring: self.offspring,
        }
    }
}

/// A child waiting to be spawned once the agent pass is over
#[derive(Debug, Clone)]
pub struct Birth {
    pub genome: Genome,
    pub position: Vec2,
    pub money: f32,
    pub generation: u32,
    pub parents: (EntityId, EntityId),
}

//! Simulation configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. Every field has a default, so a
//! TOML file only needs to name the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::brain::PolicyKind;
use crate::core::error::{Result, SimError};
use crate::genetics::evolution::SelectionPolicy;

/// Configuration for the simulation kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the single deterministic RNG driving the whole run
    pub seed: u64,

    // === WORLD ===
    /// World extent along x (world units)
    pub world_width: f32,
    /// World extent along y (world units)
    pub world_height: f32,
    /// Edge length of one spatial grid cell
    ///
    /// Should be about half of `interaction_radius`: a radius query then
    /// touches a 5x5 block of cells at most.
    pub grid_cell_size: f32,
    /// How far an agent looks for food, workplaces and mates
    pub interaction_radius: f32,

    // === POPULATION ===
    /// Agents spawned at the start of every epoch
    pub initial_population: usize,
    /// Hard cap on live agents; mating fails while the cap is reached
    pub max_population: usize,
    /// Food items the world is topped up to
    pub food_count: usize,
    /// Workplaces the world is topped up to
    pub work_count: usize,
    /// Worker slots per workplace
    pub workplace_capacity: usize,
    /// Base wage of a freshly created workplace
    pub workplace_wage: f32,

    // === EPOCH ===
    /// Ticks after which an epoch ends even if agents survive
    pub max_steps: u64,
    /// Food is replenished every this many ticks
    pub food_replenish_interval: u64,
    /// Workplaces are replenished every this many ticks
    pub work_replenish_interval: u64,

    // === PHYSIOLOGY ===
    /// Agents older than this die at the end of the tick
    pub lifespan: u32,
    /// Energy ceiling
    pub max_energy: f32,
    /// Hunger ceiling; hunger stops rising here
    pub max_hunger: f32,
    /// Energy of a newly spawned agent
    pub initial_energy: f32,
    /// Hunger at or above which mood starts to sour
    pub hunger_mood_threshold: f32,

    // === ACTIONS ===
    /// Hunger removed by one food item
    pub food_nutrition: f32,
    /// Divisor turning hunger relief into reward
    pub eat_reward_scale: f32,
    /// Fraction of a workplace wage paid per work session
    pub work_session_fraction: f32,
    /// Divisor turning wage earned into reward
    pub wage_reward_scale: f32,
    /// Energy regained per point of stamina when resting
    ///
    /// At 10 and stamina 2.0, one Rest restores 20 energy.
    pub rest_gain_per_stamina: f32,
    /// Divisor turning nominal rest gain into reward
    pub rest_reward_scale: f32,
    /// Distance covered by one Search step per point of perception
    pub search_step: f32,
    /// Flat reward for exploring
    pub search_reward: f32,
    /// Minimum age before an agent can mate
    pub mating_age: u32,
    /// Minimum energy both partners need to mate
    pub mating_energy: f32,
    /// Energy each parent pays for a successful mating
    pub mating_cost: f32,
    /// Fraction of the parents' combined money handed to the child
    pub inheritance_fraction: f32,

    // === LEARNING ===
    /// Exploration at age 0; decays as `base / (1 + age / 100)`
    pub base_exploration: f32,
    /// Discount factor for both the tabular and the neural learner
    pub discount: f32,
    /// Which learner picks actions
    pub policy: PolicyKind,
    /// Brain training calls between target network syncs
    pub target_sync_interval: u64,

    pub evolution: EvolutionConfig,
}

/// Genetic algorithm parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Probability that any single gene mutates
    pub mutation_rate: f32,
    /// Fraction of the next generation copied unchanged from the best
    pub elite_percentage: f32,
    pub selection: SelectionPolicy,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            mutation_rate: 0.1,
            elite_percentage: 0.5,
            selection: SelectionPolicy::Tournament { size: 3 },
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,

            world_width: 800.0,
            world_height: 600.0,
            grid_cell_size: 50.0,
            interaction_radius: 100.0,

            initial_population: 25,
            max_population: 100,
            food_count: 5,
            work_count: 3,
            workplace_capacity: 5,
            workplace_wage: 50.0,

            max_steps: 1000,
            food_replenish_interval: 20,
            work_replenish_interval: 50,

            lifespan: 100,
            max_energy: 100.0,
            max_hunger: 100.0,
            initial_energy: 100.0,
            hunger_mood_threshold: 66.0,

            food_nutrition: 30.0,
            eat_reward_scale: 20.0,
            work_session_fraction: 0.1,
            wage_reward_scale: 5.0,
            rest_gain_per_stamina: 10.0,
            rest_reward_scale: 20.0,
            search_step: 20.0,
            search_reward: 0.05,
            mating_age: 16,
            mating_energy: 30.0,
            mating_cost: 15.0,
            inheritance_fraction: 0.1,

            base_exploration: 0.1,
            discount: 0.95,
            policy: PolicyKind::Tabular,
            target_sync_interval: 100,

            evolution: EvolutionConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    ///
    /// Every accepted config must run without panicking, so float fields are
    /// checked for finiteness as well as range.
    pub fn validate(&self) -> Result<()> {
        positive("world_width", self.world_width)?;
        positive("world_height", self.world_height)?;
        positive("grid_cell_size", self.grid_cell_size)?;
        non_negative("interaction_radius", self.interaction_radius)?;

        if self.initial_population == 0 {
            return Err(SimError::InvalidConfig(
                "initial_population must be at least 1".into(),
            ));
        }

        if self.max_population < self.initial_population {
            return Err(SimError::InvalidConfig(format!(
                "max_population ({}) should be >= initial_population ({})",
                self.max_population, self.initial_population
            )));
        }

        if self.food_replenish_interval == 0 || self.work_replenish_interval == 0 {
            return Err(SimError::InvalidConfig("replenish intervals must be positive".into()));
        }

        positive("max_energy", self.max_energy)?;
        positive("max_hunger", self.max_hunger)?;
        positive("initial_energy", self.initial_energy)?;
        if self.initial_energy > self.max_energy {
            return Err(SimError::InvalidConfig(format!(
                "initial_energy ({}) exceeds max_energy ({})",
                self.initial_energy, self.max_energy
            )));
        }
        finite("hunger_mood_threshold", self.hunger_mood_threshold)?;

        non_negative("food_nutrition", self.food_nutrition)?;
        non_negative("workplace_wage", self.workplace_wage)?;
        unit_interval("work_session_fraction", self.work_session_fraction)?;
        non_negative("rest_gain_per_stamina", self.rest_gain_per_stamina)?;
        non_negative("search_step", self.search_step)?;
        finite("search_reward", self.search_reward)?;
        non_negative("mating_energy", self.mating_energy)?;
        non_negative("mating_cost", self.mating_cost)?;
        unit_interval("inheritance_fraction", self.inheritance_fraction)?;

        positive("eat_reward_scale", self.eat_reward_scale)?;
        positive("wage_reward_scale", self.wage_reward_scale)?;
        positive("rest_reward_scale", self.rest_reward_scale)?;

        unit_interval("base_exploration", self.base_exploration)?;
        unit_interval("discount", self.discount)?;
        Ok(())
    }
}

fn finite(name: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!("{} ({}) must be finite", name, value)))
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!("{} ({}) must be positive", name, value)))
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!("{} ({}) must not be negative", name, value)))
    }
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!("{} ({}) must lie in [0, 1]", name, value)))
    }
}

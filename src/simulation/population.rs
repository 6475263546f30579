//! Population manager - the tick loop and epoch lifecycle
//!
//! One tick walks every live agent in population order: sense, decide, act,
//! learn, age. Deaths and births found during the walk are applied after it,
//! so the agent list never changes mid-pass. At epoch end the survivors and
//! the fallen are handed to evolution and a complete next-epoch world is
//! built before being swapped in.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::actions::catalog::ActionHistogram;
use crate::actions::handlers::{perform, ActionContext};
use crate::brain::{DecisionEngine, Transition};
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::types::{EntityId, Vec2};
use crate::ecs::components::{Behavior, BehaviorState, Wallet, Workplace};
use crate::ecs::system::{default_systems, System};
use crate::ecs::world::World;
use crate::genetics::evolution::{Evolution, Survivor};
use crate::genetics::genome::Genome;
use crate::simulation::agent::{Agent, Birth};
use crate::simulation::factory::{EntityFactory, EntityKind, StandardFactory};
use crate::simulation::metrics::{EpochSummary, MetricsSnapshot};

/// Running totals for the current epoch
#[derive(Debug, Default)]
struct EpochLedger {
    actions: ActionHistogram,
    deaths: u32,
    births: u32,
    /// Final records of agents that died this epoch
    fallen: Vec<Survivor>,
}

pub struct PopulationManager {
    config: SimulationConfig,
    world: World,
    agents: Vec<Agent>,
    index: AHashMap<EntityId, usize>,
    evolution: Evolution,
    factory: Box<dyn EntityFactory>,
    rng: ChaCha8Rng,
    epoch: u32,
    step: u64,
    ledger: EpochLedger,
    history: Vec<EpochSummary>,
}

impl PopulationManager {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let factory = Box::new(StandardFactory::from_config(&config));
        Self::with_factory(config, factory)
    }

    /// Build the first epoch with a caller-supplied entity factory
    pub fn with_factory(config: SimulationConfig, factory: Box<dyn EntityFactory>) -> Result<Self> {
        config.validate()?;
        let evolution = Evolution::new(&config.evolution)?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let genomes: Vec<Genome> = (0..config.initial_population)
            .map(|_| Genome::random(&mut rng))
            .collect();

        let mut manager = Self {
            world: World::new(config.world_width, config.world_height, config.grid_cell_size),
            config,
            agents: Vec::new(),
            index: AHashMap::new(),
            evolution,
            factory,
            rng,
            epoch: 0,
            step: 0,
            ledger: EpochLedger::default(),
            history: Vec::new(),
        };

        let mut rng = manager.rng.clone();
        let (mut world, agents) = manager.build_epoch(genomes, &mut rng);
        for system in default_systems() {
            world.register_system(system);
        }
        manager.rng = rng;
        manager.install(world, agents);

        tracing::info!(
            "Population initialized: {} agents, {} food, {} workplaces (seed {})",
            manager.agents.len(),
            manager.config.food_count,
            manager.config.work_count,
            manager.config.seed
        );
        Ok(manager)
    }

    // === ACCESSORS ===

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: EntityId) -> Option<&Agent> {
        self.index.get(&id).map(|&i| &self.agents[i])
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut Agent> {
        self.index.get(&id).map(|&i| &mut self.agents[i])
    }

    pub fn population_size(&self) -> usize {
        self.agents.len()
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Ticks run in the current epoch
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn epoch_history(&self) -> &[EpochSummary] {
        &self.history
    }

    /// Append a system to the world's pipeline; it survives epoch rollover
    pub fn register_system(&mut self, system: Box<dyn System>) {
        self.world.register_system(system);
    }

    // === SPAWNING ===

    /// Place a fresh generation-0 agent
    pub fn spawn_agent(&mut self, genome: Genome, position: Vec2) -> EntityId {
        let agent = spawn_agent_in(
            self.factory.as_mut(),
            &mut self.world,
            &mut self.rng,
            &self.config,
            genome,
            position,
        );
        let id = agent.id;
        self.index.insert(id, self.agents.len());
        self.agents.push(agent);
        self.sync_components();
        id
    }

    /// Place a food item or workplace
    pub fn spawn(&mut self, kind: EntityKind, position: Vec2) -> EntityId {
        self.factory.create_entity(&mut self.world, kind, position)
    }

    // === TICK ===

    /// Advance the simulation one step
    pub fn tick(&mut self) {
        let mut removals: Vec<usize> = Vec::new();
        let mut births: Vec<Birth> = Vec::new();

        for i in 0..self.agents.len() {
            // Already dead when its turn comes (e.g. drained by a collaborator)
            if self.agents[i].is_dead(self.config.lifespan) {
                removals.push(i);
                continue;
            }

            let state = self.agents[i].features().encode();
            let action = {
                let agent = &self.agents[i];
                let exploration = agent.exploration_rate(self.config.base_exploration);
                agent
                    .brain
                    .select_action(&agent.genome.q_table, &state, exploration, &mut self.rng)
            };

            let headcount = self.agents.len() + births.len();
            let outcome = {
                let mut ctx = ActionContext {
                    world: &mut self.world,
                    agents: &mut self.agents,
                    index: &self.index,
                    config: &self.config,
                    headcount,
                    rng: &mut self.rng,
                };
                perform(action, i, &mut ctx)
            };
            self.ledger.actions.record(action);
            if let Some(birth) = outcome.birth {
                births.push(birth);
            }

            let agent = &mut self.agents[i];
            agent.last_action = Some(action);
            agent.adjust_mood(outcome.reward, self.config.hunger_mood_threshold);
            let next_state = agent.features().encode();
            agent.age_one_tick(self.config.max_hunger);
            let terminal = agent.is_dead(self.config.lifespan);

            let transition = Transition {
                state,
                action,
                reward: outcome.reward,
                next_state,
                terminal,
            };
            let learning_rate = agent.genome.learning_capacity();
            agent
                .brain
                .learn(&mut agent.genome.q_table, &transition, learning_rate, self.config.discount);

            if terminal {
                removals.push(i);
            }
        }

        self.remove_agents(&removals);
        self.spawn_births(births);
        self.sync_components();

        self.world.update(1.0);
        self.world.tick();
        self.step += 1;
    }

    fn remove_agents(&mut self, slots: &[usize]) {
        if slots.is_empty() {
            return;
        }
        let mut dead = vec![false; self.agents.len()];
        for &slot in slots {
            dead[slot] = true;
        }

        let mut kept = Vec::with_capacity(self.agents.len() - slots.len());
        for (slot, agent) in std::mem::take(&mut self.agents).into_iter().enumerate() {
            if !dead[slot] {
                kept.push(agent);
                continue;
            }

            if let Some(employer) = agent.employer {
                if let Some(workplace) = self.world.get_component_mut::<Workplace>(employer) {
                    workplace.remove_worker(agent.id);
                }
            }
            self.factory.remove_entity(&mut self.world, agent.id);

            tracing::debug!(
                "Agent {} died at age {} (energy {:.1}, generation {})",
                agent.id,
                agent.age,
                agent.energy,
                agent.generation
            );
            self.ledger.deaths += 1;
            self.ledger.fallen.push(agent.survivor());
        }

        self.agents = kept;
        self.reindex();
    }

    fn spawn_births(&mut self, births: Vec<Birth>) {
        for birth in births {
            if self.agents.len() >= self.config.max_population {
                tracing::debug!("Birth dropped at population cap {}", self.config.max_population);
                continue;
            }

            let mut child = spawn_agent_in(
                self.factory.as_mut(),
                &mut self.world,
                &mut self.rng,
                &self.config,
                birth.genome,
                birth.position,
            );
            child.money = birth.money;
            child.generation = birth.generation;

            tracing::debug!(
                "Agent {} born to {} and {} (generation {})",
                child.id,
                birth.parents.0,
                birth.parents.1,
                child.generation
            );
            self.index.insert(child.id, self.agents.len());
            self.agents.push(child);
            self.ledger.births += 1;
        }
    }

    /// Mirror agent state into the Behavior and Wallet components
    fn sync_components(&mut self) {
        for agent in &self.agents {
            if let Some(behavior) = self.world.get_component_mut::<Behavior>(agent.id) {
                if let Some(action) = agent.last_action {
                    behavior.enter(BehaviorState::Acting(action));
                }
                behavior.energy = agent.energy;
                behavior.money = agent.money;
                behavior.mood = agent.mood;
            }
            if let Some(wallet) = self.world.get_component_mut::<Wallet>(agent.id) {
                wallet.money = agent.money;
            }
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (slot, agent) in self.agents.iter().enumerate() {
            self.index.insert(agent.id, slot);
        }
    }

    /// Top resources of `kind` back up to their configured count
    pub fn replenish(&mut self, kind: EntityKind) -> usize {
        let target = self.resource_target(kind);
        let added = replenish_in(self.factory.as_mut(), &mut self.world, &mut self.rng, kind, target);
        if added > 0 {
            tracing::debug!("Replenished {} {} at step {}", added, kind.tag(), self.step);
        }
        added
    }

    fn resource_target(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Food => self.config.food_count,
            EntityKind::Work => self.config.work_count,
            EntityKind::Agent => 0,
        }
    }

    // === EPOCH ===

    /// Tick until the population is gone or the step cap is hit, then roll over
    pub fn run_epoch(&mut self) -> Result<EpochSummary> {
        tracing::info!("Epoch {} starting with {} agents", self.epoch, self.agents.len());

        while !self.agents.is_empty() && self.step < self.config.max_steps {
            self.tick();
            if self.step % self.config.food_replenish_interval == 0 {
                self.replenish(EntityKind::Food);
            }
            if self.step % self.config.work_replenish_interval == 0 {
                self.replenish(EntityKind::Work);
            }
        }

        self.rollover()
    }

    /// End the current epoch: evolve the next generation and swap in a
    /// freshly built world. On error nothing is changed.
    pub fn rollover(&mut self) -> Result<EpochSummary> {
        let mut records: Vec<Survivor> = self.agents.iter().map(Agent::survivor).collect();
        records.extend(self.ledger.fallen.iter().cloned());

        let summary = EpochSummary::from_records(
            self.epoch,
            self.step,
            self.agents.len(),
            &records,
            self.ledger.deaths,
            self.ledger.births,
        );

        let mut rng = self.rng.clone();
        let genomes = self
            .evolution
            .evolve(&records, self.config.initial_population, &mut rng)?;
        let (mut world, agents) = self.build_epoch(genomes, &mut rng);
        world.adopt_systems(self.world.take_systems());

        // Commit
        self.rng = rng;
        self.install(world, agents);
        self.epoch += 1;
        self.step = 0;
        self.ledger = EpochLedger::default();
        self.history.push(summary.clone());

        tracing::info!(
            "Epoch {} ended after {} steps: {} survivors of {} ({} births, {} deaths), diversity {:.3}",
            summary.epoch,
            summary.steps,
            summary.population_size,
            summary.lived,
            summary.births,
            summary.deaths,
            summary.genetic_diversity
        );
        Ok(summary)
    }

    /// A complete world for `genomes`, resources included, without systems
    fn build_epoch(&mut self, genomes: Vec<Genome>, rng: &mut ChaCha8Rng) -> (World, Vec<Agent>) {
        let config = &self.config;
        let mut world = World::new(config.world_width, config.world_height, config.grid_cell_size);

        let mut agents = Vec::with_capacity(genomes.len());
        for genome in genomes {
            let position = random_position(&world, rng);
            agents.push(spawn_agent_in(
                self.factory.as_mut(),
                &mut world,
                rng,
                config,
                genome,
                position,
            ));
        }
        replenish_in(self.factory.as_mut(), &mut world, rng, EntityKind::Food, config.food_count);
        replenish_in(self.factory.as_mut(), &mut world, rng, EntityKind::Work, config.work_count);

        (world, agents)
    }

    fn install(&mut self, world: World, agents: Vec<Agent>) {
        self.world = world;
        self.agents = agents;
        self.reindex();
        self.sync_components();
    }

    // === METRICS ===

    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot {
            epoch: self.epoch,
            step: self.step,
            food_count: self.world.count_tagged(EntityKind::Food.tag()),
            work_count: self.world.count_tagged(EntityKind::Work.tag()),
            deaths: self.ledger.deaths,
            births: self.ledger.births,
            ..Default::default()
        };
        snapshot.set_averages(&self.agents);
        snapshot.set_actions(&self.ledger.actions);
        snapshot
    }
}

fn random_position(world: &World, rng: &mut ChaCha8Rng) -> Vec2 {
    let (width, height) = world.extent();
    Vec2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height))
}

fn spawn_agent_in(
    factory: &mut dyn EntityFactory,
    world: &mut World,
    rng: &mut ChaCha8Rng,
    config: &SimulationConfig,
    genome: Genome,
    position: Vec2,
) -> Agent {
    let id = factory.create_entity(world, EntityKind::Agent, position);
    let brain = DecisionEngine::new(config.policy, config.target_sync_interval, rng);
    Agent::new(id, genome, brain, config.initial_energy)
}

fn replenish_in(
    factory: &mut dyn EntityFactory,
    world: &mut World,
    rng: &mut ChaCha8Rng,
    kind: EntityKind,
    target: usize,
) -> usize {
    let present = world.count_tagged(kind.tag());
    let missing = target.saturating_sub(present);
    for _ in 0..missing {
        let position = random_position(world, rng);
        factory.create_entity(world, kind, position);
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::ActionId;
    use crate::core::types::Gender;
    use crate::ecs::system::SystemKind;

    fn small_config(population: usize) -> SimulationConfig {
        SimulationConfig {
            initial_population: population,
            max_population: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_world_is_populated() {
        let manager = PopulationManager::new(SimulationConfig::default()).unwrap();
        let metrics = manager.metrics();

        assert_eq!(metrics.population, 25);
        assert_eq!(metrics.males + metrics.females, 25);
        assert_eq!(metrics.food_count, 5);
        assert_eq!(metrics.work_count, 3);
        assert_eq!(metrics.epoch, 0);
        assert_eq!(
            manager.world().system_kinds(),
            vec![SystemKind::Movement, SystemKind::SpatialSync, SystemKind::Behavior]
        );
    }

    #[test]
    fn test_dead_agent_removed_after_tick() {
        let mut manager = PopulationManager::new(small_config(2)).unwrap();
        let doomed = manager.agents()[0].id;
        let survivor = manager.agents()[1].id;
        manager.agent_mut(doomed).unwrap().energy = 0.0;

        manager.tick();

        assert_eq!(manager.population_size(), 1);
        assert!(!manager.world().spatial().contains(doomed));
        assert!(!manager.world().is_alive(doomed));
        assert!(manager.agent(doomed).is_none());
        assert!(manager.agent(survivor).is_some());
        assert_eq!(manager.metrics().deaths, 1);
    }

    #[test]
    fn test_old_age_kills() {
        let mut manager = PopulationManager::new(small_config(3)).unwrap();
        let elder = manager.agents()[1].id;
        manager.agent_mut(elder).unwrap().age = 100;

        manager.tick();

        assert!(manager.agent(elder).is_none());
        assert_eq!(manager.population_size(), 2);
    }

    #[test]
    fn test_tick_ages_everyone_and_counts_actions() {
        let mut manager = PopulationManager::new(small_config(5)).unwrap();
        manager.tick();

        assert!(manager.agents().iter().all(|a| a.age == 1 && a.last_action.is_some()));
        let metrics = manager.metrics();
        assert_eq!(metrics.actions.values().sum::<u64>(), 5);
        assert_eq!(metrics.step, 1);
        assert_eq!(manager.world().current_tick, 1);
    }

    #[test]
    fn test_hunger_capped_by_its_own_ceiling() {
        let mut manager = PopulationManager::new(SimulationConfig {
            max_hunger: 5.0,
            max_energy: 100.0,
            ..small_config(6)
        })
        .unwrap();

        for _ in 0..20 {
            manager.tick();
            assert!(manager.agents().iter().all(|a| a.hunger <= 5.0));
        }
    }

    #[test]
    fn test_components_mirror_agent_state() {
        let mut manager = PopulationManager::new(small_config(4)).unwrap();
        manager.tick();

        for agent in manager.agents() {
            let behavior = manager.world().get_component::<Behavior>(agent.id).unwrap();
            assert_eq!(behavior.energy, agent.energy);
            assert_eq!(behavior.mood, agent.mood);
            let wallet = manager.world().get_component::<Wallet>(agent.id).unwrap();
            assert_eq!(wallet.money, agent.money);
        }
    }

    #[test]
    fn test_death_releases_workplace_slot() {
        let mut manager = PopulationManager::new(small_config(1)).unwrap();
        let id = manager.agents()[0].id;
        let position = manager.world().position(id).unwrap();
        let site = manager.spawn(EntityKind::Work, position);
        manager
            .world
            .get_component_mut::<Workplace>(site)
            .unwrap()
            .add_worker(id);
        {
            let agent = manager.agent_mut(id).unwrap();
            agent.employer = Some(site);
            agent.energy = 0.0;
        }

        manager.tick();

        let workplace = manager.world().get_component::<Workplace>(site).unwrap();
        assert!(workplace.workers.is_empty());
    }

    #[test]
    fn test_births_join_after_pass() {
        let mut manager = PopulationManager::new(small_config(1)).unwrap();
        let first = manager.agents()[0].id;
        let position = manager.world().position(first).unwrap();
        manager.factory.remove_entity(&mut manager.world, first);
        manager.agents.clear();
        manager.reindex();

        let always_fertile = [1.0, 1.0, 0.1, 1.0, 1.0];
        let mut mated = Vec::new();
        for gender in [Gender::Male, Gender::Female] {
            let genome = Genome::new(always_fertile, gender).unwrap();
            let id = manager.spawn_agent(genome, position);
            let agent = manager.agent_mut(id).unwrap();
            agent.age = 30;
            // Make Mate the greedy choice
            let state = agent.features().encode();
            agent.genome.q_table.set(state.key, ActionId::Mate, 10.0);
            mated.push(id);
        }
        manager.config.base_exploration = 0.0;

        manager.tick();

        assert!(manager.population_size() >= 3);
        let child = manager
            .agents()
            .iter()
            .find(|a| a.generation == 1)
            .expect("a child was born");
        assert_eq!(child.age, 0);
        assert_eq!(manager.metrics().births as usize, manager.population_size() - 2);
    }

    #[test]
    fn test_rollover_keeps_systems_and_resets_epoch() {
        let mut manager = PopulationManager::new(small_config(6)).unwrap();
        for _ in 0..5 {
            manager.tick();
        }
        let summary = manager.rollover().unwrap();

        assert_eq!(summary.epoch, 0);
        assert_eq!(summary.steps, 5);
        assert_eq!(manager.epoch(), 1);
        assert_eq!(manager.step(), 0);
        assert_eq!(manager.population_size(), 6);
        assert!(manager.agents().iter().all(|a| a.age == 0));
        assert_eq!(manager.world().current_tick, 0);
        assert_eq!(
            manager.world().system_kinds(),
            vec![SystemKind::Movement, SystemKind::SpatialSync, SystemKind::Behavior]
        );
        assert_eq!(manager.epoch_history().len(), 1);
        assert_eq!(manager.metrics().deaths, 0);
    }

    #[test]
    fn test_extinct_epoch_still_evolves() {
        let mut manager = PopulationManager::new(small_config(4)).unwrap();
        let ids: Vec<EntityId> = manager.agents().iter().map(|a| a.id).collect();
        for id in ids {
            manager.agent_mut(id).unwrap().energy = 0.0;
        }
        manager.tick();
        assert_eq!(manager.population_size(), 0);

        let summary = manager.rollover().unwrap();
        assert_eq!(summary.population_size, 0);
        assert_eq!(summary.lived, 4);
        assert_eq!(summary.deaths, 4);
        assert_eq!(manager.population_size(), 4);
    }

    #[test]
    fn test_run_epoch_stops_at_step_cap() {
        let config = SimulationConfig {
            initial_population: 5,
            max_steps: 30,
            ..Default::default()
        };
        let mut manager = PopulationManager::new(config).unwrap();
        let summary = manager.run_epoch().unwrap();

        assert!(summary.steps <= 30);
        assert_eq!(manager.epoch(), 1);
        assert_eq!(manager.population_size(), 5);
        assert_eq!(manager.metrics().food_count, 5);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut manager = PopulationManager::new(small_config(10)).unwrap();
            for _ in 0..40 {
                manager.tick();
            }
            manager.metrics()
        };
        assert_eq!(run(), run());
    }
}

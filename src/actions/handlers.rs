//! Action handlers
//!
//! Each handler mutates the world and the agents, then reports the reward.
//! Dispatch is one exhaustive match over `ActionId`.

use ahash::AHashMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::f32::consts::TAU;

use crate::actions::catalog::ActionId;
use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Vec2};
use crate::ecs::components::{Tag, Wallet, Workplace};
use crate::ecs::world::World;
use crate::genetics::genome::Genome;
use crate::simulation::agent::{Agent, Birth};

/// Reward for a successful mating
pub const MATE_REWARD: f32 = 1.0;

/// How far from the initiator a child may spawn
const BIRTH_SCATTER: f32 = 10.0;

/// Everything a handler may touch during one agent's turn
pub struct ActionContext<'a> {
    pub world: &'a mut World,
    pub agents: &'a mut [Agent],
    /// Entity id -> position in `agents`
    pub index: &'a AHashMap<EntityId, usize>,
    pub config: &'a SimulationConfig,
    /// Live agents plus births already queued this tick
    pub headcount: usize,
    pub rng: &'a mut ChaCha8Rng,
}

#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub reward: f32,
    pub birth: Option<Birth>,
}

impl From<f32> for ActionOutcome {
    fn from(reward: f32) -> Self {
        Self { reward, birth: None }
    }
}

/// Run `action` for the agent at `actor`
pub fn perform(action: ActionId, actor: usize, ctx: &mut ActionContext<'_>) -> ActionOutcome {
    match action {
        ActionId::Eat => eat(actor, ctx).into(),
        ActionId::Work => work(actor, ctx).into(),
        ActionId::Rest => rest(&mut ctx.agents[actor], ctx.config).into(),
        ActionId::Mate => mate(actor, ctx),
        ActionId::Search => search(actor, ctx).into(),
    }
}

/// Walk to the nearest food in reach and eat it
pub fn eat(actor: usize, ctx: &mut ActionContext<'_>) -> f32 {
    let id = ctx.agents[actor].id;
    let Some(position) = ctx.world.position(id) else {
        return 0.0;
    };
    let nearest = ctx
        .world
        .query_by_tag(Tag::FOOD, position, ctx.config.interaction_radius)
        .into_iter()
        .next();
    let Some(food) = nearest else {
        return 0.0;
    };

    let food_position = ctx.world.position(food).unwrap_or(position);
    ctx.world.delete_entity(food);
    ctx.world.set_position(id, food_position);

    let agent = &mut ctx.agents[actor];
    let relief = agent.hunger.min(ctx.config.food_nutrition).max(0.0);
    agent.hunger -= relief;
    agent.energy = (agent.energy + relief / 2.0).min(ctx.config.max_energy);
    relief / ctx.config.eat_reward_scale
}

/// Take a shift at the nearest workplace that will have the agent
pub fn work(actor: usize, ctx: &mut ActionContext<'_>) -> f32 {
    let id = ctx.agents[actor].id;
    let Some(position) = ctx.world.position(id) else {
        return 0.0;
    };

    let world = &*ctx.world;
    let chosen = world
        .query_by_tag(Tag::WORK, position, ctx.config.interaction_radius)
        .into_iter()
        .find(|&site| {
            world
                .get_component::<Workplace>(site)
                .is_some_and(|w| w.employs(id) || w.has_spare_capacity())
        });
    let Some(site) = chosen else {
        return 0.0;
    };

    // Changing jobs frees the old slot
    if let Some(previous) = ctx.agents[actor].employer.filter(|&p| p != site) {
        if let Some(old) = ctx.world.get_component_mut::<Workplace>(previous) {
            old.remove_worker(id);
        }
    }

    let Some(workplace) = ctx.world.get_component_mut::<Workplace>(site) else {
        return 0.0;
    };
    if !workplace.add_worker(id) {
        return 0.0;
    }
    let earned = workplace.base_wage * ctx.config.work_session_fraction;
    workplace.expenses += earned;

    if let Some(wallet) = ctx.world.get_component_mut::<Wallet>(id) {
        wallet.add_money(earned);
    }
    let agent = &mut ctx.agents[actor];
    agent.employer = Some(site);
    agent.money += earned;

    earned / ctx.config.wage_reward_scale
}

/// Recover energy in proportion to stamina. The reward counts the nominal
/// gain, even when the energy cap absorbs part of it.
pub fn rest(agent: &mut Agent, config: &SimulationConfig) -> f32 {
    let gain = config.rest_gain_per_stamina * agent.genome.stamina();
    agent.energy = (agent.energy + gain).min(config.max_energy);
    gain / config.rest_reward_scale
}

/// Court the nearest opposite-gender agent in reach
pub fn mate(actor: usize, ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let config = ctx.config;
    let (id, gender) = {
        let agent = &ctx.agents[actor];
        (agent.id, agent.genome.gender)
    };
    let Some(position) = ctx.world.position(id) else {
        return ActionOutcome::default();
    };

    let agents = &*ctx.agents;
    let partner = ctx
        .world
        .query_by_tag(Tag::AGENT, position, config.interaction_radius)
        .into_iter()
        .filter(|&other| other != id)
        .filter_map(|other| ctx.index.get(&other).copied())
        .find(|&j| agents[j].genome.gender == gender.opposite());
    let Some(partner) = partner else {
        return ActionOutcome::default();
    };
    if ctx.headcount >= config.max_population {
        return ActionOutcome::default();
    }

    let (a, b) = pair_mut(&mut *ctx.agents, actor, partner);
    if !a.can_mate(config) || !b.can_mate(config) {
        return ActionOutcome::default();
    }

    let chance = (a.genome.fertility() + b.genome.fertility()) / 2.0;
    if ctx.rng.gen::<f32>() >= chance {
        return ActionOutcome::default();
    }

    let genome = Genome::crossover(&a.genome, &b.genome, ctx.rng)
        .mutated(config.evolution.mutation_rate, ctx.rng);

    // A share of the couple's combined money, paid half by each parent.
    // A poorer parent can go into debt.
    let inheritance = (a.money + b.money) * config.inheritance_fraction;
    for parent in [&mut *a, &mut *b] {
        parent.money -= inheritance / 2.0;
        parent.energy -= config.mating_cost;
        parent.offspring += 1;
    }

    let scatter = Vec2::new(
        ctx.rng.gen_range(-BIRTH_SCATTER..=BIRTH_SCATTER),
        ctx.rng.gen_range(-BIRTH_SCATTER..=BIRTH_SCATTER),
    );
    let (width, height) = ctx.world.extent();

    let birth = Birth {
        genome,
        position: (position + scatter).clamp_to(width, height),
        money: inheritance,
        generation: a.generation.max(b.generation) + 1,
        parents: (a.id, b.id),
    };
    ActionOutcome { reward: MATE_REWARD, birth: Some(birth) }
}

/// Random step scaled by perception
pub fn search(actor: usize, ctx: &mut ActionContext<'_>) -> f32 {
    let (id, perception) = {
        let agent = &ctx.agents[actor];
        (agent.id, agent.genome.perception())
    };
    let Some(position) = ctx.world.position(id) else {
        return 0.0;
    };

    let reach = ctx.config.search_step * perception;
    let angle = ctx.rng.gen_range(0.0..TAU);
    let distance = ctx.rng.gen_range(0.0..=reach);
    let (width, height) = ctx.world.extent();
    let target = (position + Vec2::new(angle.cos(), angle.sin()) * distance).clamp_to(width, height);
    ctx.world.set_position(id, target);

    ctx.config.search_reward
}

fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs two distinct slots");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{DecisionEngine, PolicyKind};
    use crate::core::types::Gender;
    use crate::simulation::factory::{EntityFactory, EntityKind, StandardFactory};
    use rand::SeedableRng;

    struct Fixture {
        world: World,
        agents: Vec<Agent>,
        index: AHashMap<EntityId, usize>,
        config: SimulationConfig,
        factory: StandardFactory,
        rng: ChaCha8Rng,
    }

    impl Fixture {
        fn new() -> Self {
            let config = SimulationConfig::default();
            Self {
                world: World::new(config.world_width, config.world_height, config.grid_cell_size),
                agents: Vec::new(),
                index: AHashMap::new(),
                factory: StandardFactory::from_config(&config),
                config,
                rng: ChaCha8Rng::seed_from_u64(42),
            }
        }

        fn agent(&mut self, position: Vec2, gender: Gender, traits: [f32; 5]) -> usize {
            let id = self.factory.create_entity(&mut self.world, EntityKind::Agent, position);
            let genome = Genome::new(traits, gender).unwrap();
            let brain = DecisionEngine::new(PolicyKind::Tabular, 100, &mut self.rng);
            self.agents.push(Agent::new(id, genome, brain, 100.0));
            self.index.insert(id, self.agents.len() - 1);
            self.agents.len() - 1
        }

        fn spawn(&mut self, kind: EntityKind, position: Vec2) -> EntityId {
            self.factory.create_entity(&mut self.world, kind, position)
        }

        fn run(&mut self, action: ActionId, actor: usize) -> ActionOutcome {
            let headcount = self.agents.len();
            let mut ctx = ActionContext {
                world: &mut self.world,
                agents: &mut self.agents,
                index: &self.index,
                config: &self.config,
                headcount,
                rng: &mut self.rng,
            };
            perform(action, actor, &mut ctx)
        }
    }

    const PLAIN: [f32; 5] = [1.0, 1.0, 0.1, 1.0, 1.0];

    #[test]
    fn test_rest_with_stamina_two() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, [1.0, 2.0, 0.1, 0.5, 1.0]);
        fx.agents[a].energy = 50.0;

        let outcome = fx.run(ActionId::Rest, a);
        assert_eq!(fx.agents[a].energy, 70.0);
        assert_eq!(outcome.reward, 1.0);
    }

    #[test]
    fn test_rest_caps_energy_but_rewards_nominal_gain() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, [1.0, 2.0, 0.1, 0.5, 1.0]);
        fx.agents[a].energy = 95.0;

        let outcome = fx.run(ActionId::Rest, a);
        assert_eq!(fx.agents[a].energy, 100.0);
        assert_eq!(outcome.reward, 1.0);
    }

    #[test]
    fn test_eat_consumes_nearest_food() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let near = fx.spawn(EntityKind::Food, Vec2::new(120.0, 100.0));
        let far = fx.spawn(EntityKind::Food, Vec2::new(160.0, 100.0));
        fx.agents[a].hunger = 50.0;
        fx.agents[a].energy = 40.0;

        let outcome = fx.run(ActionId::Eat, a);

        assert!(!fx.world.is_alive(near));
        assert!(fx.world.is_alive(far));
        assert_eq!(fx.world.position(fx.agents[a].id), Some(Vec2::new(120.0, 100.0)));
        assert_eq!(fx.agents[a].hunger, 20.0);
        assert_eq!(fx.agents[a].energy, 55.0);
        assert!((outcome.reward - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_eat_without_food_nearby() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let food = fx.spawn(EntityKind::Food, Vec2::new(500.0, 500.0));
        fx.agents[a].hunger = 50.0;

        assert_eq!(fx.run(ActionId::Eat, a).reward, 0.0);
        assert!(fx.world.is_alive(food));
        assert_eq!(fx.agents[a].hunger, 50.0);
    }

    #[test]
    fn test_work_pays_wage_and_books_expense() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let site = fx.spawn(EntityKind::Work, Vec2::new(150.0, 100.0));

        let outcome = fx.run(ActionId::Work, a);

        assert!((outcome.reward - 1.0).abs() < 1e-6);
        assert!((fx.agents[a].money - 5.0).abs() < 1e-6);
        assert_eq!(fx.agents[a].employer, Some(site));
        let workplace = fx.world.get_component::<Workplace>(site).unwrap();
        assert!(workplace.employs(fx.agents[a].id));
        assert!((workplace.expenses - 5.0).abs() < 1e-6);
        let wallet = fx.world.get_component::<Wallet>(fx.agents[a].id).unwrap();
        assert!((wallet.money - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_work_skips_full_workplace() {
        let mut fx = Fixture::new();
        fx.config.workplace_capacity = 1;
        fx.factory = StandardFactory::from_config(&fx.config);
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let b = fx.agent(Vec2::new(100.0, 100.0), Gender::Female, PLAIN);
        let near = fx.spawn(EntityKind::Work, Vec2::new(110.0, 100.0));
        let far = fx.spawn(EntityKind::Work, Vec2::new(150.0, 100.0));

        fx.run(ActionId::Work, a);
        fx.run(ActionId::Work, b);
        // existing member keeps their slot
        fx.run(ActionId::Work, a);

        assert_eq!(fx.agents[a].employer, Some(near));
        assert_eq!(fx.agents[b].employer, Some(far));
        assert!((fx.agents[a].money - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_mate_spawns_child_record() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let b = fx.agent(Vec2::new(130.0, 100.0), Gender::Female, PLAIN);
        for i in [a, b] {
            fx.agents[i].age = 20;
            fx.agents[i].money = 100.0;
        }
        fx.agents[b].generation = 3;

        let outcome = fx.run(ActionId::Mate, a);

        assert_eq!(outcome.reward, MATE_REWARD);
        let birth = outcome.birth.expect("fertility 1.0 always succeeds");
        assert_eq!(birth.generation, 4);
        assert!((birth.money - 20.0).abs() < 1e-4);
        assert!(birth.genome.validate().is_ok());
        for i in [a, b] {
            assert_eq!(fx.agents[i].offspring, 1);
            assert_eq!(fx.agents[i].energy, 85.0);
            assert!((fx.agents[i].money - 90.0).abs() < 1e-4);
        }
        assert!(birth.position.distance(&Vec2::new(100.0, 100.0)) <= BIRTH_SCATTER * 2.0);
    }

    #[test]
    fn test_mate_splits_inheritance_evenly() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let b = fx.agent(Vec2::new(130.0, 100.0), Gender::Female, PLAIN);
        for i in [a, b] {
            fx.agents[i].age = 20;
        }
        fx.agents[a].money = 100.0;
        fx.agents[b].money = 0.0;

        let birth = fx.run(ActionId::Mate, a).birth.expect("fertile pair");

        assert!((birth.money - 10.0).abs() < 1e-4);
        assert!((fx.agents[a].money - 95.0).abs() < 1e-4);
        assert!((fx.agents[b].money + 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_mate_requires_maturity() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let b = fx.agent(Vec2::new(130.0, 100.0), Gender::Female, PLAIN);
        fx.agents[a].age = 20;
        fx.agents[b].age = 10;

        let outcome = fx.run(ActionId::Mate, a);
        assert_eq!(outcome.reward, 0.0);
        assert!(outcome.birth.is_none());
        assert_eq!(fx.agents[a].energy, 100.0);
    }

    #[test]
    fn test_mate_ignores_same_gender() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let b = fx.agent(Vec2::new(130.0, 100.0), Gender::Male, PLAIN);
        for i in [a, b] {
            fx.agents[i].age = 20;
        }
        assert!(fx.run(ActionId::Mate, a).birth.is_none());
    }

    #[test]
    fn test_mate_blocked_at_population_cap() {
        let mut fx = Fixture::new();
        fx.config.max_population = 2;
        let a = fx.agent(Vec2::new(100.0, 100.0), Gender::Male, PLAIN);
        let b = fx.agent(Vec2::new(130.0, 100.0), Gender::Female, PLAIN);
        for i in [a, b] {
            fx.agents[i].age = 20;
        }
        assert!(fx.run(ActionId::Mate, a).birth.is_none());
    }

    #[test]
    fn test_search_stays_in_world_and_reach() {
        let mut fx = Fixture::new();
        let a = fx.agent(Vec2::new(1.0, 1.0), Gender::Male, [1.0, 1.0, 0.1, 0.5, 1.5]);
        let id = fx.agents[a].id;

        for _ in 0..100 {
            let before = fx.world.position(id).unwrap();
            let outcome = fx.run(ActionId::Search, a);
            let after = fx.world.position(id).unwrap();

            assert!((outcome.reward - 0.05).abs() < 1e-6);
            assert!(before.distance(&after) <= 30.0 + 1e-3);
            assert!(after.x >= 0.0 && after.x <= 800.0);
            assert!(after.y >= 0.0 && after.y <= 600.0);
            assert_eq!(fx.world.spatial().position_of(id), Some(after));
        }
    }
}

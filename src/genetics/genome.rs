//! Genome - heritable traits plus the inherited Q-table
//!
//! Every trait has a fixed valid range. Crossover and mutation build new
//! genome values and clamp into range, so a genome that exists is valid.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::brain::q_table::QTable;
use crate::brain::state::StateKey;
use crate::core::error::{Result, SimError};
use crate::core::types::Gender;

pub const TRAIT_COUNT: usize = 5;

/// Mutation noise, as a fraction of a trait's range
const MUTATION_SPAN: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitKind {
    /// Energy burned and hunger gained per tick
    Metabolism,
    /// Divides the energy burn; multiplies rest gain
    Stamina,
    /// Tabular learning rate
    LearningCapacity,
    /// Success chance when mating
    Fertility,
    /// Scales the search step
    Perception,
}

impl TraitKind {
    pub const ALL: [TraitKind; TRAIT_COUNT] = [
        TraitKind::Metabolism,
        TraitKind::Stamina,
        TraitKind::LearningCapacity,
        TraitKind::Fertility,
        TraitKind::Perception,
    ];

    /// Inclusive (min, max)
    pub fn range(&self) -> (f32, f32) {
        match self {
            TraitKind::Metabolism => (0.5, 1.5),
            TraitKind::Stamina => (0.5, 2.0),
            TraitKind::LearningCapacity => (0.01, 0.5),
            TraitKind::Fertility => (0.1, 1.0),
            TraitKind::Perception => (0.5, 1.5),
        }
    }

    pub fn span(&self) -> f32 {
        let (min, max) = self.range();
        max - min
    }

    pub fn contains(&self, value: f32) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&value)
    }

    pub fn clamp(&self, value: f32) -> f32 {
        let (min, max) = self.range();
        value.clamp(min, max)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraitKind::Metabolism => "metabolism",
            TraitKind::Stamina => "stamina",
            TraitKind::LearningCapacity => "learning_capacity",
            TraitKind::Fertility => "fertility",
            TraitKind::Perception => "perception",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    traits: [f32; TRAIT_COUNT],
    pub gender: Gender,
    pub q_table: QTable,
}

impl Genome {
    /// Build a genome from explicit trait values, indexed as `TraitKind::ALL`
    pub fn new(traits: [f32; TRAIT_COUNT], gender: Gender) -> Result<Self> {
        let genome = Self { traits, gender, q_table: QTable::new() };
        genome.validate()?;
        Ok(genome)
    }

    /// Uniform draw inside every trait range
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut traits = [0.0; TRAIT_COUNT];
        for kind in TraitKind::ALL {
            let (min, max) = kind.range();
            traits[kind.index()] = rng.gen_range(min..=max);
        }
        let gender = if rng.gen_bool(0.5) { Gender::Male } else { Gender::Female };
        Self { traits, gender, q_table: QTable::new() }
    }

    pub fn get(&self, kind: TraitKind) -> f32 {
        self.traits[kind.index()]
    }

    pub fn traits(&self) -> &[f32; TRAIT_COUNT] {
        &self.traits
    }

    pub fn metabolism(&self) -> f32 {
        self.get(TraitKind::Metabolism)
    }

    pub fn stamina(&self) -> f32 {
        self.get(TraitKind::Stamina)
    }

    pub fn learning_capacity(&self) -> f32 {
        self.get(TraitKind::LearningCapacity)
    }

    pub fn fertility(&self) -> f32 {
        self.get(TraitKind::Fertility)
    }

    pub fn perception(&self) -> f32 {
        self.get(TraitKind::Perception)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in TraitKind::ALL {
            let value = self.get(kind);
            if !kind.contains(value) {
                let (min, max) = kind.range();
                return Err(SimError::contract(format!(
                    "{} = {} outside [{}, {}]",
                    kind.name(),
                    value,
                    min,
                    max
                )));
            }
        }
        Ok(())
    }

    /// Per-gene crossover. Each trait and each Q-table row comes from one
    /// parent, chosen independently; gender is drawn uniformly.
    pub fn crossover<R: Rng + ?Sized>(a: &Genome, b: &Genome, rng: &mut R) -> Genome {
        let mut traits = [0.0; TRAIT_COUNT];
        for i in 0..TRAIT_COUNT {
            traits[i] = if rng.gen_bool(0.5) { a.traits[i] } else { b.traits[i] };
        }
        let gender = if rng.gen_bool(0.5) { Gender::Male } else { Gender::Female };

        // Sorted so the draw order does not depend on hash iteration order
        let mut keys: Vec<StateKey> = a.q_table.keys().chain(b.q_table.keys()).copied().collect();
        keys.sort();
        keys.dedup();

        let mut q_table = QTable::new();
        for key in keys {
            let donor = if rng.gen_bool(0.5) { a } else { b };
            if let Some(row) = donor.q_table.row_if_seen(&key) {
                q_table.insert_row(key, *row);
            }
        }

        Genome { traits, gender, q_table }
    }

    /// Copy where each trait, with probability `rate`, is nudged by up to
    /// 10% of its range and clamped
    pub fn mutated<R: Rng + ?Sized>(&self, rate: f32, rng: &mut R) -> Genome {
        let mut next = self.clone();
        for kind in TraitKind::ALL {
            if rng.gen::<f32>() < rate {
                let reach = kind.span() * MUTATION_SPAN;
                let value = next.traits[kind.index()] + rng.gen_range(-reach..=reach);
                next.traits[kind.index()] = kind.clamp(value);
            }
        }
        next
    }
}

/// Mean per-trait standard deviation, normalized by trait range
pub fn genetic_diversity<'a>(genomes: impl IntoIterator<Item = &'a Genome>) -> f32 {
    let genomes: Vec<&Genome> = genomes.into_iter().collect();
    if genomes.len() < 2 {
        return 0.0;
    }
    let n = genomes.len() as f32;

    let total: f32 = TraitKind::ALL
        .iter()
        .map(|kind| {
            let mean = genomes.iter().map(|g| g.get(*kind)).sum::<f32>() / n;
            let variance = genomes
                .iter()
                .map(|g| (g.get(*kind) - mean).powi(2))
                .sum::<f32>()
                / n;
            variance.sqrt() / kind.span()
        })
        .sum();

    total / TRAIT_COUNT as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::ActionId;
    use crate::brain::state::Level;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn key(level: Level) -> StateKey {
        StateKey { hunger: level, energy: level, money: level, mood: level }
    }

    #[test]
    fn test_random_genomes_are_valid() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            assert!(Genome::random(&mut rng).validate().is_ok());
        }
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let result = Genome::new([1.0, 5.0, 0.1, 0.5, 1.0], Gender::Male);
        assert!(matches!(result, Err(SimError::ContractViolation(_))));
        assert!(Genome::new([1.0, 2.0, 0.1, 0.5, 1.0], Gender::Male).is_ok());
    }

    #[test]
    fn test_mutation_stays_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let edge = Genome::new([1.5, 0.5, 0.5, 0.1, 1.5], Gender::Female).unwrap();
        for _ in 0..500 {
            let m = edge.mutated(1.0, &mut rng);
            assert!(m.validate().is_ok());
        }
    }

    #[test]
    fn test_zero_rate_mutation_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let g = Genome::random(&mut rng);
        assert_eq!(g.mutated(0.0, &mut rng), g);
    }

    #[test]
    fn test_crossover_draws_each_gene_from_a_parent() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut a = Genome::new([0.5, 0.5, 0.01, 0.1, 0.5], Gender::Male).unwrap();
        let mut b = Genome::new([1.5, 2.0, 0.5, 1.0, 1.5], Gender::Female).unwrap();
        a.q_table.set(key(Level::Low), ActionId::Eat, 1.0);
        b.q_table.set(key(Level::Low), ActionId::Eat, 2.0);
        b.q_table.set(key(Level::High), ActionId::Work, 3.0);

        for _ in 0..100 {
            let child = Genome::crossover(&a, &b, &mut rng);
            for (i, value) in child.traits().iter().enumerate() {
                assert!(*value == a.traits[i] || *value == b.traits[i]);
            }
            let low = child.q_table.get(&key(Level::Low), ActionId::Eat);
            assert!(low == 1.0 || low == 2.0);
            let high = child.q_table.get(&key(Level::High), ActionId::Work);
            assert!(high == 0.0 || high == 3.0);
        }
    }

    #[test]
    fn test_genetic_diversity() {
        let a = Genome::new([0.5, 0.5, 0.01, 0.1, 0.5], Gender::Male).unwrap();
        let b = Genome::new([1.5, 2.0, 0.5, 1.0, 1.5], Gender::Female).unwrap();

        assert_eq!(genetic_diversity([&a, &a]), 0.0);
        assert!((genetic_diversity([&a, &b]) - 0.5).abs() < 1e-5);
        assert_eq!(genetic_diversity([&a]), 0.0);
    }
}

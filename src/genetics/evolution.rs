//! Generational genetic algorithm
//!
//! Rank by fitness, copy the elite unchanged, and fill the remaining slots
//! with mutated crossovers of selected parents.

use ordered_float::OrderedFloat;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::core::config::EvolutionConfig;
use crate::core::error::{Result, SimError};
use crate::genetics::genome::Genome;

/// Parent selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Best of `size` uniform draws
    Tournament { size: usize },
    /// Roulette wheel over fitness
    FitnessProportionate,
    Uniform,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::Tournament { size: 3 }
    }
}

impl SelectionPolicy {
    /// Pick an index into `ranked`, which is sorted best-first
    fn select<R: Rng + ?Sized>(&self, ranked: &[(usize, f32)], rng: &mut R) -> usize {
        let n = ranked.len();
        match *self {
            SelectionPolicy::Tournament { size } => {
                // Lower rank position is fitter
                (0..size.max(1))
                    .map(|_| rng.gen_range(0..n))
                    .min()
                    .unwrap_or(0)
            }
            SelectionPolicy::FitnessProportionate => {
                let total: f32 = ranked.iter().map(|(_, f)| f.max(0.0)).sum();
                if total <= 0.0 {
                    return rng.gen_range(0..n);
                }
                let mut pick = rng.gen_range(0.0..total);
                for (pos, (_, fitness)) in ranked.iter().enumerate() {
                    pick -= fitness.max(0.0);
                    if pick < 0.0 {
                        return pos;
                    }
                }
                n - 1
            }
            SelectionPolicy::Uniform => rng.gen_range(0..n),
        }
    }
}

/// An agent's end-of-epoch record
#[derive(Debug, Clone)]
pub struct Survivor {
    pub genome: Genome,
    pub age: u32,
    pub money: f32,
    pub offspring: u32,
}

impl Survivor {
    pub fn fitness(&self) -> f32 {
        fitness(self.age, self.money, self.offspring)
    }
}

/// Long life, wealth and children all count; children most.
pub fn fitness(age: u32, money: f32, offspring: u32) -> f32 {
    age as f32 + 0.1 * money + 25.0 * offspring as f32
}

/// Indices of `population` with their fitness, best first. Ties keep input order.
pub fn rank(population: &[Survivor]) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = population
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.fitness()))
        .collect();
    ranked.sort_by_key(|(_, f)| Reverse(OrderedFloat(*f)));
    ranked
}

#[derive(Debug, Clone)]
pub struct Evolution {
    mutation_rate: f32,
    elite_percentage: f32,
    selection: SelectionPolicy,
}

impl Evolution {
    pub fn new(config: &EvolutionConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.mutation_rate) {
            return Err(SimError::contract(format!(
                "mutation_rate {} outside [0, 1]",
                config.mutation_rate
            )));
        }
        if !(0.0..=1.0).contains(&config.elite_percentage) {
            return Err(SimError::contract(format!(
                "elite_percentage {} outside [0, 1]",
                config.elite_percentage
            )));
        }
        if let SelectionPolicy::Tournament { size: 0 } = config.selection {
            return Err(SimError::contract("tournament size must be at least 1"));
        }

        Ok(Self {
            mutation_rate: config.mutation_rate,
            elite_percentage: config.elite_percentage,
            selection: config.selection,
        })
    }

    pub fn elite_count(&self, target: usize, available: usize) -> usize {
        ((target as f32 * self.elite_percentage).floor() as usize).min(available)
    }

    /// Produce exactly `target` genomes from `population`.
    ///
    /// An empty population yields random genomes. Any invalid input genome
    /// aborts the call before anything is produced.
    pub fn evolve<R: Rng + ?Sized>(
        &self,
        population: &[Survivor],
        target: usize,
        rng: &mut R,
    ) -> Result<Vec<Genome>> {
        if target == 0 {
            return Err(SimError::contract("target population size must be positive"));
        }
        for survivor in population {
            survivor.genome.validate()?;
        }

        if population.is_empty() {
            tracing::debug!("Empty population, seeding {} random genomes", target);
            return Ok((0..target).map(|_| Genome::random(rng)).collect());
        }

        let ranked = rank(population);
        let elites = self.elite_count(target, ranked.len());

        let mut next: Vec<Genome> = Vec::with_capacity(target);
        next.extend(
            ranked[..elites]
                .iter()
                .map(|(i, _)| population[*i].genome.clone()),
        );

        while next.len() < target {
            let a = &population[ranked[self.selection.select(&ranked, rng)].0].genome;
            let b = &population[ranked[self.selection.select(&ranked, rng)].0].genome;
            let child = Genome::crossover(a, b, rng).mutated(self.mutation_rate, rng);
            next.push(child);
        }

        for genome in &next {
            genome.validate()?;
        }
        if next.len() != target {
            return Err(SimError::contract(format!(
                "evolution produced {} genomes, expected {}",
                next.len(),
                target
            )));
        }

        let mean = ranked.iter().map(|(_, f)| f).sum::<f32>() / ranked.len() as f32;
        tracing::debug!(
            "Evolved {} genomes ({} elite) from {} parents, best fitness {:.1}, mean {:.1}",
            target,
            elites,
            population.len(),
            ranked[0].1,
            mean
        );

        Ok(next)
    }
}

//! Read-only population snapshots for observers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actions::catalog::ActionHistogram;
use crate::core::types::Gender;
use crate::genetics::evolution::Survivor;
use crate::genetics::genome::genetic_diversity;
use crate::simulation::agent::Agent;

/// Point-in-time view of the running epoch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub epoch: u32,
    pub step: u64,
    pub population: usize,
    pub males: usize,
    pub females: usize,
    pub food_count: usize,
    pub work_count: usize,
    pub avg_age: f32,
    pub avg_energy: f32,
    pub avg_money: f32,
    pub avg_mood: f32,
    /// Actions taken this epoch, by name
    pub actions: BTreeMap<String, u64>,
    pub deaths: u32,
    pub births: u32,
}

impl MetricsSnapshot {
    pub fn set_averages(&mut self, agents: &[Agent]) {
        self.population = agents.len();
        self.males = agents.iter().filter(|a| a.genome.gender == Gender::Male).count();
        self.females = self.population - self.males;
        if agents.is_empty() {
            return;
        }
        let n = agents.len() as f32;
        self.avg_age = agents.iter().map(|a| a.age as f32).sum::<f32>() / n;
        self.avg_energy = agents.iter().map(|a| a.energy).sum::<f32>() / n;
        self.avg_money = agents.iter().map(|a| a.money).sum::<f32>() / n;
        self.avg_mood = agents.iter().map(|a| a.mood).sum::<f32>() / n;
    }

    pub fn set_actions(&mut self, histogram: &ActionHistogram) {
        self.actions = histogram
            .iter()
            .map(|(action, count)| (action.name().to_string(), count))
            .collect();
    }

    pub fn to_json(&self) -> crate::core::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What an epoch left behind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: u32,
    pub steps: u64,
    /// Agents alive when the epoch ended
    pub population_size: usize,
    /// Agents that lived at any point during the epoch
    pub lived: usize,
    pub average_lifespan: f32,
    pub average_offspring: f32,
    pub genetic_diversity: f32,
    pub best_fitness: f32,
    pub deaths: u32,
    pub births: u32,
}

impl EpochSummary {
    pub fn from_records(
        epoch: u32,
        steps: u64,
        population_size: usize,
        records: &[Survivor],
        deaths: u32,
        births: u32,
    ) -> Self {
        let lived = records.len();
        let (average_lifespan, average_offspring) = if lived == 0 {
            (0.0, 0.0)
        } else {
            let n = lived as f32;
            (
                records.iter().map(|r| r.age as f32).sum::<f32>() / n,
                records.iter().map(|r| r.offspring as f32).sum::<f32>() / n,
            )
        };
        let best_fitness = records
            .iter()
            .map(Survivor::fitness)
            .fold(0.0_f32, f32::max);

        Self {
            epoch,
            steps,
            population_size,
            lived,
            average_lifespan,
            average_offspring,
            genetic_diversity: genetic_diversity(records.iter().map(|r| &r.genome)),
            best_fitness,
            deaths,
            births,
        }
    }
}

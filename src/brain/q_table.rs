//! Tabular Q-learning
//!
//! Unseen (state, action) pairs read as 0.0. Greedy selection breaks ties
//! toward the lowest action index, so a fresh table always picks `Eat`.

use ahash::AHashMap;
use rand::Rng;

use crate::actions::catalog::{ActionId, ACTION_COUNT};
use crate::brain::state::StateKey;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: AHashMap<StateKey, [f32; ACTION_COUNT]>,
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &StateKey, action: ActionId) -> f32 {
        self.values.get(key).map_or(0.0, |row| row[action.index()])
    }

    pub fn row(&self, key: &StateKey) -> [f32; ACTION_COUNT] {
        self.values.get(key).copied().unwrap_or([0.0; ACTION_COUNT])
    }

    pub fn row_if_seen(&self, key: &StateKey) -> Option<&[f32; ACTION_COUNT]> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: StateKey, action: ActionId, value: f32) {
        self.values.entry(key).or_insert([0.0; ACTION_COUNT])[action.index()] = value;
    }

    pub fn insert_row(&mut self, key: StateKey, row: [f32; ACTION_COUNT]) {
        self.values.insert(key, row);
    }

    pub fn keys(&self) -> impl Iterator<Item = &StateKey> + '_ {
        self.values.keys()
    }

    /// Entries sorted by key, for stable serialization
    pub fn sorted_entries(&self) -> Vec<(StateKey, [f32; ACTION_COUNT])> {
        let mut entries: Vec<_> = self.values.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    pub fn max_value(&self, key: &StateKey) -> f32 {
        let row = self.row(key);
        row[argmax(&row)]
    }

    pub fn best_action(&self, key: &StateKey) -> ActionId {
        let row = self.row(key);
        ActionId::ALL[argmax(&row)]
    }

    /// Epsilon-greedy: uniform random with probability `exploration_rate`,
    /// otherwise the greedy action
    pub fn select_action<R: Rng + ?Sized>(
        &self,
        key: &StateKey,
        exploration_rate: f32,
        rng: &mut R,
    ) -> ActionId {
        if rng.gen::<f32>() < exploration_rate {
            ActionId::ALL[rng.gen_range(0..ACTION_COUNT)]
        } else {
            self.best_action(key)
        }
    }

    /// Temporal-difference update; returns the new Q[s, a]
    pub fn update(
        &mut self,
        key: StateKey,
        action: ActionId,
        reward: f32,
        next_key: &StateKey,
        learning_rate: f32,
        discount: f32,
    ) -> f32 {
        let target = reward + discount * self.max_value(next_key);
        let old = self.get(&key, action);
        let new = old + learning_rate * (target - old);
        self.set(key, action, new);
        new
    }
}

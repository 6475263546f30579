//! State encoding - what an agent senses, bucketed
//!
//! Each feature is cut into three ordinal levels. The tuple of levels is the
//! tabular lookup key; its one-hot concatenation is the network input.

use serde::{Deserialize, Serialize};

/// Length of the one-hot state vector (4 features x 3 levels)
pub const STATE_VECTOR_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Level {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Level {
    /// Bucket `value` with two ascending cut points
    pub fn bucket(value: f32, low_below: f32, medium_below: f32) -> Self {
        if value < low_below {
            Level::Low
        } else if value < medium_below {
            Level::Medium
        } else {
            Level::High
        }
    }

    fn one_hot(&self) -> [f32; 3] {
        let mut out = [0.0; 3];
        out[*self as usize] = 1.0;
        out
    }
}

/// Raw continuous readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    /// 0 = sated, 100 = starving
    pub hunger: f32,
    /// 0 = exhausted, 100 = full
    pub energy: f32,
    pub money: f32,
    /// -1 = miserable, 1 = content
    pub mood: f32,
}

impl Features {
    pub fn key(&self) -> StateKey {
        StateKey {
            hunger: Level::bucket(self.hunger, 100.0 / 3.0, 200.0 / 3.0),
            energy: Level::bucket(self.energy, 100.0 / 3.0, 200.0 / 3.0),
            money: Level::bucket(self.money, 10.0, 50.0),
            mood: Level::bucket(self.mood, -1.0 / 3.0, 1.0 / 3.0),
        }
    }

    pub fn encode(&self) -> EncodedState {
        let key = self.key();
        EncodedState { key, vector: key.one_hot() }
    }
}

/// Discretized state used as the tabular lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub hunger: Level,
    pub energy: Level,
    pub money: Level,
    pub mood: Level,
}

impl StateKey {
    pub fn one_hot(&self) -> [f32; STATE_VECTOR_LEN] {
        let mut out = [0.0; STATE_VECTOR_LEN];
        let levels = [self.hunger, self.energy, self.money, self.mood];
        for (i, level) in levels.iter().enumerate() {
            out[i * 3..i * 3 + 3].copy_from_slice(&level.one_hot());
        }
        out
    }
}

/// Both encodings of one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedState {
    pub key: StateKey,
    pub vector: [f32; STATE_VECTOR_LEN],
}

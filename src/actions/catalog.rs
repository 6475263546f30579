//! Action definitions and catalog

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Number of actions an agent can choose from
pub const ACTION_COUNT: usize = 5;

/// Unique action identifier. The discriminant is the action's index in
/// every per-action vector (Q-table rows, network outputs, histograms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionId {
    Eat = 0,
    Work = 1,
    Rest = 2,
    Mate = 3,
    Search = 4,
}

impl ActionId {
    pub const ALL: [ActionId; ACTION_COUNT] = [
        ActionId::Eat,
        ActionId::Work,
        ActionId::Rest,
        ActionId::Mate,
        ActionId::Search,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionId::Eat => "eat",
            ActionId::Work => "work",
            ActionId::Rest => "rest",
            ActionId::Mate => "mate",
            ActionId::Search => "search",
        }
    }
}

/// Per-action counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHistogram {
    pub counts: [u64; ACTION_COUNT],
}

impl ActionHistogram {
    pub fn record(&mut self, action: ActionId) {
        self.counts[action.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActionId, u64)> + '_ {
        ActionId::ALL.iter().map(move |&a| (a, self.counts[a.index()]))
    }
}

impl Index<ActionId> for ActionHistogram {
    type Output = u64;
    fn index(&self, action: ActionId) -> &u64 {
        &self.counts[action.index()]
    }
}

impl IndexMut<ActionId> for ActionHistogram {
    fn index_mut(&mut self, action: ActionId) -> &mut u64 {
        &mut self.counts[action.index()]
    }
}

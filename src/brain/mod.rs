//! Per-agent decision making: tabular Q-learning plus a neural value network

pub mod network;
pub mod persist;
pub mod q_table;
pub mod state;

pub use network::{DqNetwork, NeuralNetwork};
pub use persist::BrainBlob;
pub use q_table::QTable;
pub use state::{EncodedState, Features, Level, StateKey, STATE_VECTOR_LEN};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::actions::catalog::{ActionId, ACTION_COUNT};
use crate::core::error::{Result, SimError};

/// Which learner picks actions. Both learn from every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Tabular,
    Neural,
}

/// One experienced step
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub state: EncodedState,
    pub action: ActionId,
    pub reward: f32,
    pub next_state: EncodedState,
    /// The agent died on this step
    pub terminal: bool,
}

/// An agent's brain. The Q-table lives in the genome so it can be inherited;
/// the network pair is rebuilt fresh each epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionEngine {
    policy: PolicyKind,
    network: DqNetwork,
    target_sync_interval: u64,
    training_steps: u64,
}

impl DecisionEngine {
    pub fn new<R: Rng + ?Sized>(policy: PolicyKind, target_sync_interval: u64, rng: &mut R) -> Self {
        Self {
            policy,
            network: DqNetwork::new(STATE_VECTOR_LEN, ACTION_COUNT, rng),
            target_sync_interval: target_sync_interval.max(1),
            training_steps: 0,
        }
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    pub fn network(&self) -> &DqNetwork {
        &self.network
    }

    pub fn training_steps(&self) -> u64 {
        self.training_steps
    }

    /// Pick an action for `state`.
    ///
    /// The tabular policy explores at `exploration_rate`. The neural policy
    /// explores at the lower of `exploration_rate` and the network's own
    /// decaying rate, so a well-trained network turns greedy even for a young
    /// agent.
    pub fn select_action<R: Rng + ?Sized>(
        &self,
        q_table: &QTable,
        state: &EncodedState,
        exploration_rate: f32,
        rng: &mut R,
    ) -> ActionId {
        match self.policy {
            PolicyKind::Tabular => q_table.select_action(&state.key, exploration_rate, rng),
            PolicyKind::Neural => {
                let rate = exploration_rate.min(self.network.exploration());
                let index = self.network.select_action(&state.vector, rate, rng);
                ActionId::ALL[index]
            }
        }
    }

    /// Feed one transition to both learners
    pub fn learn(
        &mut self,
        q_table: &mut QTable,
        transition: &Transition,
        learning_rate: f32,
        discount: f32,
    ) {
        q_table.update(
            transition.state.key,
            transition.action,
            transition.reward,
            &transition.next_state.key,
            learning_rate,
            discount,
        );

        self.network.train_step(
            &transition.state.vector,
            transition.action.index(),
            transition.reward,
            &transition.next_state.vector,
            transition.terminal,
            discount,
        );

        self.training_steps += 1;
        if self.training_steps % self.target_sync_interval == 0 {
            self.network.sync_target();
            tracing::trace!("Target network synced after {} steps", self.training_steps);
        }
    }

    /// Encode the network pair and `q_table` into a blob
    pub fn to_blob(&self, q_table: &QTable) -> BrainBlob {
        let mut blob = BrainBlob::default();
        blob.put_network("online", &self.network.online);
        blob.put_network("target", &self.network.target);

        let exploration = self.network.exploration;
        blob.scalars.insert("exploration.rate".into(), exploration.rate);
        blob.scalars.insert("exploration.floor".into(), exploration.floor);
        blob.scalars.insert("exploration.decay".into(), exploration.decay);
        blob.policy = self.policy;
        blob.target_sync_interval = self.target_sync_interval;
        blob.training_steps = self.training_steps;

        blob.q_table = q_table.sorted_entries();
        blob
    }

    pub fn from_blob(blob: &BrainBlob) -> Result<(Self, QTable)> {
        let online = blob.network("online")?;
        let target = blob.network("target")?;
        if online.input_size() != STATE_VECTOR_LEN || online.output_size() != ACTION_COUNT {
            return Err(SimError::contract(format!(
                "network shape {}->{} does not match state/action sizes",
                online.input_size(),
                online.output_size()
            )));
        }
        if target.shape() != online.shape() {
            return Err(SimError::contract(format!(
                "target network shape {:?} differs from online {:?}",
                target.shape(),
                online.shape()
            )));
        }

        let exploration = network::Exploration {
            rate: blob.scalar("exploration.rate")?,
            floor: blob.scalar("exploration.floor")?,
            decay: blob.scalar("exploration.decay")?,
        };

        let mut q_table = QTable::new();
        for (key, row) in &blob.q_table {
            q_table.insert_row(*key, *row);
        }

        let engine = Self {
            policy: blob.policy,
            network: DqNetwork { online, target, exploration },
            target_sync_interval: blob.target_sync_interval.max(1),
            training_steps: blob.training_steps,
        };
        Ok((engine, q_table))
    }

    pub fn save_bytes(&self, q_table: &QTable) -> Result<Vec<u8>> {
        self.to_blob(q_table).to_bytes()
    }

    pub fn load_bytes(bytes: &[u8]) -> Result<(Self, QTable)> {
        Self::from_blob(&BrainBlob::from_bytes(bytes)?)
    }

    pub fn save(&self, q_table: &QTable, path: impl AsRef<Path>) -> Result<()> {
        self.to_blob(q_table).write_to(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<(Self, QTable)> {
        Self::from_blob(&BrainBlob::read_from(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn state(hunger: f32, energy: f32) -> EncodedState {
        Features { hunger, energy, money: 20.0, mood: 0.0 }.encode()
    }

    #[test]
    fn test_policy_default_is_tabular() {
        assert_eq!(PolicyKind::default(), PolicyKind::Tabular);
    }

    #[test]
    fn test_learn_updates_both_learners() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut engine = DecisionEngine::new(PolicyKind::Tabular, 100, &mut rng);
        let mut table = QTable::new();
        let before = engine.network().online().clone();

        let transition = Transition {
            state: state(80.0, 50.0),
            action: ActionId::Eat,
            reward: 1.5,
            next_state: state(50.0, 65.0),
            terminal: false,
        };
        engine.learn(&mut table, &transition, 0.5, 0.95);

        assert!((table.get(&transition.state.key, ActionId::Eat) - 0.75).abs() < 1e-6);
        assert_ne!(engine.network().online(), &before);
        assert_eq!(engine.training_steps(), 1);
    }

    #[test]
    fn test_target_syncs_on_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut engine = DecisionEngine::new(PolicyKind::Neural, 3, &mut rng);
        let mut table = QTable::new();
        let transition = Transition {
            state: state(10.0, 10.0),
            action: ActionId::Rest,
            reward: 1.0,
            next_state: state(10.0, 90.0),
            terminal: false,
        };

        engine.learn(&mut table, &transition, 0.1, 0.95);
        engine.learn(&mut table, &transition, 0.1, 0.95);
        assert_ne!(engine.network().online(), engine.network().target());

        engine.learn(&mut table, &transition, 0.1, 0.95);
        assert_eq!(engine.network().online(), engine.network().target());
    }

    #[test]
    fn test_neural_policy_greedy_matches_network_argmax() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let engine = DecisionEngine::new(PolicyKind::Neural, 100, &mut rng);
        let table = QTable::new();
        let s = state(40.0, 40.0);

        let expected = q_table::argmax(&engine.network().q_values(&s.vector));
        let chosen = engine.select_action(&table, &s, 0.0, &mut rng);
        assert_eq!(chosen.index(), expected);
    }

    fn drill(engine: &mut DecisionEngine, table: &mut QTable, steps: usize) {
        let transition = Transition {
            state: state(50.0, 50.0),
            action: ActionId::Work,
            reward: 0.5,
            next_state: state(50.0, 50.0),
            terminal: false,
        };
        for _ in 0..steps {
            engine.learn(table, &transition, 0.1, 0.95);
        }
    }

    #[test]
    fn test_neural_exploration_decays_to_greedy() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut engine = DecisionEngine::new(PolicyKind::Neural, 50, &mut rng);
        let mut table = QTable::new();
        drill(&mut engine, &mut table, 2000);
        assert!((engine.network().exploration() - 0.01).abs() < 1e-6);

        let s = state(20.0, 80.0);
        let greedy = q_table::argmax(&engine.network().q_values(&s.vector));
        let picks = (0..1000)
            .filter(|_| engine.select_action(&table, &s, 1.0, &mut rng).index() == greedy)
            .count();
        assert!(picks > 950, "greedy picked {} of 1000 times", picks);
    }

    #[test]
    fn test_fresh_neural_brain_follows_caller_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        let engine = DecisionEngine::new(PolicyKind::Neural, 50, &mut rng);
        let table = QTable::new();
        let s = state(20.0, 80.0);

        let mut counts = [0usize; ACTION_COUNT];
        for _ in 0..5000 {
            counts[engine.select_action(&table, &s, 1.0, &mut rng).index()] += 1;
        }
        assert!(counts.iter().all(|&c| c > 800), "counts {:?}", counts);
    }

    #[test]
    fn test_mismatched_target_network_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(15);
        let engine = DecisionEngine::new(PolicyKind::Neural, 10, &mut rng);
        let mut blob = engine.to_blob(&QTable::new());
        blob.put_network("target", &NeuralNetwork::new(7, 24, 5, 0.001, &mut rng));

        assert!(matches!(
            DecisionEngine::from_blob(&blob),
            Err(SimError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_counters_survive_reload_exactly() {
        let mut rng = ChaCha8Rng::seed_from_u64(16);
        let mut engine = DecisionEngine::new(PolicyKind::Tabular, 7, &mut rng);
        let mut table = QTable::new();
        drill(&mut engine, &mut table, 3);
        engine.training_steps = (1 << 24) + 1;

        let (restored, _) = DecisionEngine::load_bytes(&engine.save_bytes(&table).unwrap()).unwrap();
        assert_eq!(restored.training_steps(), (1 << 24) + 1);
        assert_eq!(restored.target_sync_interval, 7);
        assert_eq!(restored.policy(), PolicyKind::Tabular);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut engine = DecisionEngine::new(PolicyKind::Neural, 10, &mut rng);
        let mut table = QTable::new();
        for i in 0..25 {
            let transition = Transition {
                state: state(i as f32 * 4.0, 100.0 - i as f32 * 4.0),
                action: ActionId::ALL[i % ACTION_COUNT],
                reward: 0.3,
                next_state: state(50.0, 50.0),
                terminal: false,
            };
            engine.learn(&mut table, &transition, 0.2, 0.95);
        }

        let bytes = engine.save_bytes(&table).unwrap();
        let (restored, restored_table) = DecisionEngine::load_bytes(&bytes).unwrap();

        assert_eq!(restored, engine);
        assert_eq!(restored_table, table);
        let s = state(12.0, 70.0);
        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        assert_eq!(
            engine.select_action(&table, &s, 0.0, &mut a),
            restored.select_action(&restored_table, &s, 0.0, &mut b)
        );
    }
}

//! Feed-forward value network and the online/target pair around it

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::brain::q_table::argmax;

/// Standard deviation scale of the initial weights
const INIT_SCALE: f32 = 0.1;

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Standard normal sample (Box-Muller)
fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
    let u2 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Two-layer network with logistic activations on both layers.
///
/// Weights are row-major: `w_input_hidden[i * hidden + j]` connects input `i`
/// to hidden unit `j`, and `w_hidden_output[j * output + k]` hidden `j` to
/// output `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    pub(crate) input_size: usize,
    pub(crate) hidden_size: usize,
    pub(crate) output_size: usize,
    pub(crate) learning_rate: f32,
    pub(crate) w_input_hidden: Vec<f32>,
    pub(crate) w_hidden_output: Vec<f32>,
    pub(crate) b_hidden: Vec<f32>,
    pub(crate) b_output: Vec<f32>,
}

impl NeuralNetwork {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        learning_rate: f32,
        rng: &mut R,
    ) -> Self {
        let w_input_hidden = (0..input_size * hidden_size)
            .map(|_| gaussian(rng) * INIT_SCALE)
            .collect();
        let w_hidden_output = (0..hidden_size * output_size)
            .map(|_| gaussian(rng) * INIT_SCALE)
            .collect();

        Self {
            input_size,
            hidden_size,
            output_size,
            learning_rate,
            w_input_hidden,
            w_hidden_output,
            b_hidden: vec![0.0; hidden_size],
            b_output: vec![0.0; output_size],
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// (input, hidden, output) layer widths
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.input_size, self.hidden_size, self.output_size)
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.layers(input).1
    }

    fn layers(&self, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
        assert_eq!(
            input.len(),
            self.input_size,
            "network expects {} inputs, got {}",
            self.input_size,
            input.len()
        );

        let hidden: Vec<f32> = (0..self.hidden_size)
            .map(|j| {
                let sum: f32 = input
                    .iter()
                    .enumerate()
                    .map(|(i, x)| x * self.w_input_hidden[i * self.hidden_size + j])
                    .sum();
                sigmoid(sum + self.b_hidden[j])
            })
            .collect();

        let output = (0..self.output_size)
            .map(|k| {
                let sum: f32 = hidden
                    .iter()
                    .enumerate()
                    .map(|(j, h)| h * self.w_hidden_output[j * self.output_size + k])
                    .sum();
                sigmoid(sum + self.b_output[k])
            })
            .collect();

        (hidden, output)
    }

    /// One backpropagation step toward `targets`.
    ///
    /// Hidden deltas are taken from the pre-update output weights.
    pub fn train(&mut self, input: &[f32], targets: &[f32]) {
        assert_eq!(targets.len(), self.output_size, "target length mismatch");
        let (hidden, output) = self.layers(input);

        let output_delta: Vec<f32> = output
            .iter()
            .zip(targets)
            .map(|(o, t)| (t - o) * o * (1.0 - o))
            .collect();

        let hidden_delta: Vec<f32> = (0..self.hidden_size)
            .map(|j| {
                let back: f32 = output_delta
                    .iter()
                    .enumerate()
                    .map(|(k, d)| d * self.w_hidden_output[j * self.output_size + k])
                    .sum();
                back * hidden[j] * (1.0 - hidden[j])
            })
            .collect();

        let lr = self.learning_rate;
        for (j, h) in hidden.iter().enumerate() {
            for (k, d) in output_delta.iter().enumerate() {
                self.w_hidden_output[j * self.output_size + k] += lr * h * d;
            }
        }
        for (k, d) in output_delta.iter().enumerate() {
            self.b_output[k] += lr * d;
        }

        for (i, x) in input.iter().enumerate() {
            for (j, d) in hidden_delta.iter().enumerate() {
                self.w_input_hidden[i * self.hidden_size + j] += lr * x * d;
            }
        }
        for (j, d) in hidden_delta.iter().enumerate() {
            self.b_hidden[j] += lr * d;
        }
    }

    /// Hard-copy every parameter from `other`
    pub fn copy_from(&mut self, other: &NeuralNetwork) {
        self.clone_from(other);
    }
}

/// Exploration schedule for the network policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exploration {
    pub rate: f32,
    pub floor: f32,
    pub decay: f32,
}

impl Default for Exploration {
    fn default() -> Self {
        Self { rate: 1.0, floor: 0.01, decay: 0.995 }
    }
}

impl Exploration {
    pub fn step(&mut self) {
        self.rate = (self.rate * self.decay).max(self.floor);
    }
}

/// Online network plus a lagged target copy used for bootstrapped targets
#[derive(Debug, Clone, PartialEq)]
pub struct DqNetwork {
    pub(crate) online: NeuralNetwork,
    pub(crate) target: NeuralNetwork,
    pub(crate) exploration: Exploration,
}

impl DqNetwork {
    pub const HIDDEN_SIZE: usize = 24;
    pub const LEARNING_RATE: f32 = 0.001;

    pub fn new<R: Rng + ?Sized>(state_size: usize, action_count: usize, rng: &mut R) -> Self {
        let online = NeuralNetwork::new(
            state_size,
            Self::HIDDEN_SIZE,
            action_count,
            Self::LEARNING_RATE,
            rng,
        );
        let target = online.clone();
        Self { online, target, exploration: Exploration::default() }
    }

    pub fn online(&self) -> &NeuralNetwork {
        &self.online
    }

    pub fn target(&self) -> &NeuralNetwork {
        &self.target
    }

    pub fn exploration(&self) -> f32 {
        self.exploration.rate
    }

    pub fn action_count(&self) -> usize {
        self.online.output_size
    }

    pub fn q_values(&self, state: &[f32]) -> Vec<f32> {
        self.online.forward(state)
    }

    /// Epsilon-greedy over the online network's outputs
    pub fn select_action<R: Rng + ?Sized>(
        &self,
        state: &[f32],
        exploration_rate: f32,
        rng: &mut R,
    ) -> usize {
        if rng.gen::<f32>() < exploration_rate {
            rng.gen_range(0..self.action_count())
        } else {
            argmax(&self.q_values(state))
        }
    }

    /// Push the online estimate of `action` toward the bootstrapped target.
    /// Returns the target value.
    ///
    /// # Panics
    /// If `action` is not a valid output index. Nothing is mutated in that case.
    pub fn train_step(
        &mut self,
        state: &[f32],
        action: usize,
        reward: f32,
        next_state: &[f32],
        terminal: bool,
        discount: f32,
    ) -> f32 {
        assert!(
            action < self.action_count(),
            "action index {} out of range 0..{}",
            action,
            self.action_count()
        );

        let target_value = if terminal {
            reward
        } else {
            let next = self.target.forward(next_state);
            reward + discount * next[argmax(&next)]
        };

        let mut targets = self.online.forward(state);
        targets[action] = target_value;
        self.online.train(state, &targets);
        self.exploration.step();

        target_value
    }

    pub fn sync_target(&mut self) {
        self.target.copy_from(&self.online);
    }
}

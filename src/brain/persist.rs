//! Keyed binary blob for brain parameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::actions::catalog::ACTION_COUNT;
use crate::brain::network::NeuralNetwork;
use crate::brain::state::StateKey;
use crate::brain::PolicyKind;
use crate::core::error::{Result, SimError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    fn new(shape: Vec<usize>, data: &[f32]) -> Self {
        Self { shape, data: data.to_vec() }
    }
}

/// Named tensors plus the tabular values, bincode-encoded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrainBlob {
    pub tensors: BTreeMap<String, Tensor>,
    pub scalars: BTreeMap<String, f32>,
    pub q_table: Vec<(StateKey, [f32; ACTION_COUNT])>,
    pub policy: PolicyKind,
    /// Counters are kept as integers so the sync cadence survives a reload
    pub target_sync_interval: u64,
    pub training_steps: u64,
}

impl BrainBlob {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn scalar(&self, name: &str) -> Result<f32> {
        self.scalars
            .get(name)
            .copied()
            .ok_or_else(|| SimError::contract(format!("brain blob missing scalar '{}'", name)))
    }

    fn tensor(&self, name: &str, shape: &[usize]) -> Result<&Tensor> {
        let tensor = self
            .tensors
            .get(name)
            .ok_or_else(|| SimError::contract(format!("brain blob missing tensor '{}'", name)))?;
        let expected: usize = shape.iter().product();
        if tensor.shape != shape || tensor.data.len() != expected {
            return Err(SimError::contract(format!(
                "tensor '{}' has shape {:?}, expected {:?}",
                name, tensor.shape, shape
            )));
        }
        Ok(tensor)
    }

    /// Store `net` under `prefix.*`
    pub fn put_network(&mut self, prefix: &str, net: &NeuralNetwork) {
        let (i, h, o) = (net.input_size, net.hidden_size, net.output_size);
        self.tensors
            .insert(format!("{prefix}.w1"), Tensor::new(vec![i, h], &net.w_input_hidden));
        self.tensors
            .insert(format!("{prefix}.b1"), Tensor::new(vec![h], &net.b_hidden));
        self.tensors
            .insert(format!("{prefix}.w2"), Tensor::new(vec![h, o], &net.w_hidden_output));
        self.tensors
            .insert(format!("{prefix}.b2"), Tensor::new(vec![o], &net.b_output));
        self.scalars.insert(format!("{prefix}.lr"), net.learning_rate);
    }

    /// Rebuild the network stored under `prefix.*`
    pub fn network(&self, prefix: &str) -> Result<NeuralNetwork> {
        let w1 = self
            .tensors
            .get(&format!("{prefix}.w1"))
            .ok_or_else(|| SimError::contract(format!("brain blob missing '{prefix}.w1'")))?;
        let &[input_size, hidden_size] = w1.shape.as_slice() else {
            return Err(SimError::contract(format!("'{prefix}.w1' must be 2-d")));
        };
        let w2 = self
            .tensors
            .get(&format!("{prefix}.w2"))
            .ok_or_else(|| SimError::contract(format!("brain blob missing '{prefix}.w2'")))?;
        let output_size = w2.shape.last().copied().unwrap_or(0);

        let w_input_hidden = self
            .tensor(&format!("{prefix}.w1"), &[input_size, hidden_size])?
            .data
            .clone();
        let w_hidden_output = self
            .tensor(&format!("{prefix}.w2"), &[hidden_size, output_size])?
            .data
            .clone();
        let b_hidden = self.tensor(&format!("{prefix}.b1"), &[hidden_size])?.data.clone();
        let b_output = self.tensor(&format!("{prefix}.b2"), &[output_size])?.data.clone();

        Ok(NeuralNetwork {
            input_size,
            hidden_size,
            output_size,
            learning_rate: self.scalar(&format!("{prefix}.lr"))?,
            w_input_hidden,
            w_hidden_output,
            b_hidden,
            b_output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_network_survives_blob() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let net = NeuralNetwork::new(12, 24, 5, 0.001, &mut rng);

        let mut blob = BrainBlob::default();
        blob.put_network("online", &net);
        let decoded = BrainBlob::from_bytes(&blob.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded.tensors["online.w1"].shape, vec![12, 24]);
        assert_eq!(decoded.network("online").unwrap(), net);
    }

    #[test]
    fn test_missing_tensor_is_contract_violation() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let net = NeuralNetwork::new(12, 24, 5, 0.001, &mut rng);
        let mut blob = BrainBlob::default();
        blob.put_network("online", &net);
        blob.tensors.remove("online.b2");

        assert!(matches!(
            blob.network("online"),
            Err(SimError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let net = NeuralNetwork::new(12, 24, 5, 0.001, &mut rng);
        let mut blob = BrainBlob::default();
        blob.put_network("online", &net);
        blob.tensors.get_mut("online.b1").unwrap().data.pop();

        assert!(blob.network("online").is_err());
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(matches!(
            BrainBlob::from_bytes(&[0xff, 0x01]),
            Err(SimError::EncodingError(_))
        ));
    }
}

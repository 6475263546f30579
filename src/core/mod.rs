pub mod config;
pub mod error;
pub mod types;

pub use config::{EvolutionConfig, SimulationConfig};
pub use error::{Result, SimError};

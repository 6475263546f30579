//! Heritable traits and the generational algorithm over them

pub mod evolution;
pub mod genome;

pub use evolution::{Evolution, SelectionPolicy, Survivor};
pub use genome::{genetic_diversity, Genome, TraitKind};

pub mod agent;
pub mod factory;
pub mod metrics;
pub mod population;

pub use agent::{Agent, Birth};
pub use factory::{EntityFactory, EntityKind, StandardFactory};
pub use metrics::{EpochSummary, MetricsSnapshot};
pub use population::PopulationManager;

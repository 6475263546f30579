pub mod catalog;
pub mod handlers;

pub use catalog::{ActionHistogram, ActionId, ACTION_COUNT};
pub use handlers::{perform, ActionContext, ActionOutcome};

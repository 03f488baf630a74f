//! The workflow orchestrator: wizard step machine, session attributes, and
//! the concurrent dataset refresh cycle.

mod error;
mod events;
mod state;

pub use error::WorkflowError;
pub use events::{Attribute, WorkflowEvent};
pub use state::{Location, Step, WorkflowState, DEFAULT_DATASET_KINDS, DEFAULT_RADIUS_MILES};

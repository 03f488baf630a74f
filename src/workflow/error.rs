use crate::dataset::{DatasetKind, SiteKey};
use crate::workflow::state::Step;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    // The step is left unchanged when a transition is rejected.
    #[error("illegal workflow step transition from {from} to {to}")]
    InvalidTransition { from: Step, to: Step },

    #[error("no {kind} site with key {site}")]
    UnknownSite { kind: DatasetKind, site: SiteKey },

    #[error("no variable '{id}' at {kind} site {site}")]
    UnknownVariable {
        kind: DatasetKind,
        site: SiteKey,
        id: String,
    },
}

use crate::geo::GeoError;
use crate::query::QueryError;
use crate::sources::FetchError;
use crate::workflow::WorkflowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnddatError {
    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

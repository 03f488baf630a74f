mod dataset;
mod date_range;
mod error;
mod geo;
mod output;
mod query;
mod sources;
mod variable;
mod workflow;

pub use error::EnddatError;

pub use dataset::{DatasetCollection, DatasetKind, Site, SiteKey, SiteRecord};
pub use date_range::DateRange;
pub use geo::{bounding_box, distance, BoundingBox, GeoError, LatLon};
pub use output::OutputOptions;
pub use query::{QueryError, QueryUrlBuilder, QueryUrls};
pub use sources::{AcisSource, DatasetSource, FetchError, NwisSource, WfsGridSource};
pub use variable::{TimeSeriesOption, Variable, VariableCollection, VariableParameter};
pub use workflow::{
    Attribute, Location, Step, WorkflowError, WorkflowEvent, WorkflowState,
    DEFAULT_DATASET_KINDS, DEFAULT_RADIUS_MILES,
};

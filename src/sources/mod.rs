//! Remote dataset sources: the seam the workflow fetches through, plus the
//! HTTP-backed implementations for each dataset kind. Sources extract only
//! the fields the core needs (identity, coordinates, validity windows) and
//! treat the rest of the upstream response as opaque. Retries are the
//! caller's concern.

mod acis;
mod error;
mod nwis;
mod wfs_grid;

pub use acis::AcisSource;
pub use error::FetchError;
pub use nwis::NwisSource;
pub use wfs_grid::WfsGridSource;

use crate::dataset::SiteRecord;
use crate::geo::BoundingBox;
use futures_util::future::BoxFuture;

/// A remote dataset source queried by bounding box.
///
/// One fetch, one outcome: an ordered sequence of site records on success, a
/// [`FetchError`] on failure.
pub trait DatasetSource: Send + Sync {
    fn fetch(&self, bounding_box: BoundingBox)
        -> BoxFuture<'_, Result<Vec<SiteRecord>, FetchError>>;
}

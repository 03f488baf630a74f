//! Pure geographic helpers: deriving a bounding box from a center point and
//! search radius, and great-circle distance between two points. Distances and
//! radii are in miles throughout the crate.

use haversine::{distance as haversine_distance, Location as HaversineLocation, Units};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Miles spanned by one degree of latitude, also used as the equatorial
/// degrees-to-miles factor for longitude.
const MILES_PER_DEGREE: f64 = 69.0;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("invalid bounding box input: latitude {latitude}, longitude {longitude}, radius {radius}")]
    InvalidInput {
        latitude: f64,
        longitude: f64,
        radius: f64,
    },
}

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second
/// (index 1). Both values are represented as `f64` decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

/// A rectangular geographic extent in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

/// Derives the bounding box centered on `latitude`/`longitude` that spans
/// `radius` miles in every cardinal direction.
///
/// The longitude span widens with latitude so the box keeps its ground width.
///
/// # Errors
///
/// Returns [`GeoError::InvalidInput`] when any input is not a finite number or
/// the radius is not positive.
pub fn bounding_box(latitude: f64, longitude: f64, radius: f64) -> Result<BoundingBox, GeoError> {
    if !latitude.is_finite() || !longitude.is_finite() || !radius.is_finite() || radius <= 0.0 {
        return Err(GeoError::InvalidInput {
            latitude,
            longitude,
            radius,
        });
    }
    let lat_delta = radius / MILES_PER_DEGREE;
    let lon_delta = radius / (MILES_PER_DEGREE * latitude.to_radians().cos());
    Ok(BoundingBox {
        west: longitude - lon_delta,
        east: longitude + lon_delta,
        north: latitude + lat_delta,
        south: latitude - lat_delta,
    })
}

/// Great-circle distance between two points, in miles.
pub fn distance(a: LatLon, b: LatLon) -> f64 {
    haversine_distance(
        HaversineLocation {
            latitude: a.0,
            longitude: a.1,
        },
        HaversineLocation {
            latitude: b.0,
            longitude: b.1,
        },
        Units::Miles,
    )
}

//! Rectangular search windows around a coordinate

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Coordinate;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Latitudes at or beyond this magnitude make the longitude span blow up
pub const MAX_BOX_LATITUDE: f64 = 89.9;

#[derive(Error, Debug, PartialEq)]
pub enum GeoError {
    #[error("Latitude {0} is too close to a pole for a bounding box")]
    PolarLatitude(f64),

    #[error("Radius must be a positive number of kilometers, got {0}")]
    InvalidRadius(f64),
}

/// Lat/lon window in degrees. Antimeridian wraparound is not handled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl BoundingBox {
    /// Box extending `radius_km` from `center` in each cardinal direction,
    /// on a spherical Earth.
    pub fn around(center: &Coordinate, radius_km: f64) -> Result<Self, GeoError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(GeoError::InvalidRadius(radius_km));
        }
        if center.latitude.abs() >= MAX_BOX_LATITUDE {
            return Err(GeoError::PolarLatitude(center.latitude));
        }

        let angular = radius_km / EARTH_RADIUS_KM;
        let height = angular.to_degrees();
        let width = (angular / center.latitude.to_radians().cos()).to_degrees();

        Ok(Self {
            west: center.longitude - width,
            east: center.longitude + width,
            north: center.latitude + height,
            south: center.latitude - height,
        })
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinate(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_equator_box_is_symmetric_and_square() {
        let bbox = BoundingBox::around(&coordinate(0.0, 0.0), 5.0).unwrap();
        assert!((bbox.north + bbox.south).abs() < 1e-12);
        assert!((bbox.east + bbox.west).abs() < 1e-12);
        assert!((bbox.width() - bbox.height()).abs() < 1e-12);
        // 5 km is about 0.045 degrees of arc
        assert!((bbox.north - 0.044_966).abs() < 1e-5);
    }

    #[test]
    fn test_longitude_span_widens_away_from_equator() {
        let bbox = BoundingBox::around(&coordinate(60.0, 10.0), 5.0).unwrap();
        // cos(60°) = 0.5 doubles the longitude span
        assert!((bbox.width() - 2.0 * bbox.height()).abs() < 1e-9);
        assert!(bbox.west < bbox.east);
        assert!(bbox.south < bbox.north);
        assert!(bbox.contains(&coordinate(60.0, 10.0)));
    }

    #[test]
    fn test_rejects_polar_latitudes() {
        assert_eq!(
            BoundingBox::around(&coordinate(89.95, 0.0), 5.0),
            Err(GeoError::PolarLatitude(89.95))
        );
        assert!(BoundingBox::around(&coordinate(-90.0, 0.0), 5.0).is_err());
        assert!(BoundingBox::around(&coordinate(89.8, 0.0), 5.0).is_ok());
    }

    #[test]
    fn test_rejects_bad_radius() {
        assert!(BoundingBox::around(&coordinate(0.0, 0.0), 0.0).is_err());
        assert!(BoundingBox::around(&coordinate(0.0, 0.0), -1.0).is_err());
        assert!(BoundingBox::around(&coordinate(0.0, 0.0), f64::NAN).is_err());
    }
}

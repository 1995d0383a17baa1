//! Coordinate model and query-parameter parsing

use serde::{Deserialize, Serialize};

use crate::error::{AqiError, CoordinateField};

/// A point on the globe in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        check(CoordinateField::Latitude, latitude, 90.0)?;
        check(CoordinateField::Longitude, longitude, 180.0)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

fn check(field: CoordinateField, value: f64, limit: f64) -> crate::Result<()> {
    if !value.is_finite() {
        return Err(AqiError::invalid(field, format!("{value} is not a finite number")));
    }
    if !(-limit..=limit).contains(&value) {
        return Err(AqiError::invalid(
            field,
            format!("must be between -{limit} and {limit}, got {value}"),
        ));
    }
    Ok(())
}

/// Raw coordinate input as it arrives from the caller.
///
/// Both `lat`/`lon` and `latitude`/`longitude` spellings are accepted. Values
/// stay strings until [`CoordinateQuery::coordinate`] so that "absent" and
/// "unparseable" can be told apart.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CoordinateQuery {
    #[serde(default, alias = "latitude", skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, alias = "longitude", skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    /// Caller-supplied device identifier, only used for the visit log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl CoordinateQuery {
    pub fn new(lat: impl Into<String>, lon: impl Into<String>) -> Self {
        Self {
            lat: Some(lat.into()),
            lon: Some(lon.into()),
            device: None,
        }
    }

    /// Validate and parse into a [`Coordinate`].
    ///
    /// Latitude is checked before longitude, matching the order in which
    /// missing parameters are reported.
    pub fn coordinate(&self) -> crate::Result<Coordinate> {
        let latitude = parse_field(CoordinateField::Latitude, self.lat.as_deref())?;
        let longitude = parse_field(CoordinateField::Longitude, self.lon.as_deref())?;
        Coordinate::new(latitude, longitude)
    }
}

fn parse_field(field: CoordinateField, raw: Option<&str>) -> crate::Result<f64> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Err(AqiError::missing(field)),
        Some(raw) => raw,
    };
    raw.parse::<f64>()
        .map_err(|e| AqiError::invalid(field, format!("'{raw}': {e}")))
}

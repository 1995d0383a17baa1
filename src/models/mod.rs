//! Data models for the AQI relay
//!
//! This module contains the core domain models organized by concern:
//! - Location: coordinates and caller-supplied query parameters
//! - Air quality: index results and raw sensor measurements

pub mod air_quality;
pub mod location;

// Re-export all public types for convenient access
pub use air_quality::{AqiCategory, AqiResult, Pm25Aqi, RawMeasurement};
pub use location::{Coordinate, CoordinateQuery};

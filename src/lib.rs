//! `aqi-relay` - air quality lookup with multi-provider fail-over
//!
//! This library resolves a coordinate to an AQI value by querying air quality
//! providers in priority order, converting raw PM2.5 concentrations with the
//! EPA breakpoint formula where needed.

pub mod api;
pub mod config;
pub mod conversion;
pub mod error;
pub mod geo;
pub mod models;
pub mod providers;
pub mod resolver;
pub mod telemetry;
pub mod visits;
pub mod web;

// Re-export core types for public API
pub use config::AqiConfig;
pub use conversion::{Correction, aqi_from_concentration};
pub use error::{AqiError, ProviderError};
pub use geo::BoundingBox;
pub use models::{AqiResult, Coordinate, CoordinateQuery, Pm25Aqi, RawMeasurement};
pub use providers::{Provider, ProviderKind, ProviderOutcome};
pub use resolver::{Resolution, Resolver, StepDecision};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AqiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

//! Error types and handling for the AQI relay

use thiserror::Error;

/// Which half of a coordinate pair was absent or malformed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateField {
    Latitude,
    Longitude,
}

impl std::fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateField::Latitude => f.write_str("latitude"),
            CoordinateField::Longitude => f.write_str("longitude"),
        }
    }
}

/// Main error type surfaced by the resolution pipeline
#[derive(Error, Debug)]
pub enum AqiError {
    /// Client omitted latitude or longitude; no provider was contacted
    #[error("Missing {field}")]
    MissingCoordinate { field: CoordinateField },

    /// Client supplied a coordinate that is not a finite, in-range number
    #[error("Invalid {field}: {message}")]
    InvalidCoordinate {
        field: CoordinateField,
        message: String,
    },

    /// Every configured provider was tried and none produced a result
    #[error("No AQI results after trying {attempts} provider(s)")]
    AllProvidersExhausted { attempts: usize },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Visit log storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl AqiError {
    pub fn missing(field: CoordinateField) -> Self {
        Self::MissingCoordinate { field }
    }

    pub fn invalid<S: Into<String>>(field: CoordinateField, message: S) -> Self {
        Self::InvalidCoordinate {
            field,
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's input rather than upstream data
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AqiError::MissingCoordinate { .. } | AqiError::InvalidCoordinate { .. }
        )
    }

    /// Get a user-facing status message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AqiError::MissingCoordinate { field } => format!("Missing {field}"),
            AqiError::InvalidCoordinate { field, .. } => format!("Invalid {field}"),
            AqiError::AllProvidersExhausted { .. } => "No AQI results".to_string(),
            AqiError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            AqiError::Storage { .. } => "Visit log unavailable.".to_string(),
        }
    }
}

/// Failure reported by a single provider call. Always recovered by fail-over.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Upstream reported status '{0}'")]
    Upstream(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Status {
                status: status.as_u16(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

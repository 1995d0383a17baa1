//! Air quality provider adapters
//!
//! Each adapter turns a coordinate into one provider-specific HTTP query and
//! classifies the answer as a ready index, a raw measurement that still needs
//! conversion, "no data", or a transport failure. Adapters never retry; the
//! resolver moves on to the next provider instead.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversion::Correction;
use crate::error::ProviderError;
use crate::models::{AqiResult, Coordinate, RawMeasurement};

pub mod airnow;
pub mod purpleair;
pub mod waqi;

pub use airnow::AirNowProvider;
pub use purpleair::PurpleAirProvider;
pub use waqi::WaqiProvider;

/// Result of asking one provider about one coordinate
#[derive(Debug)]
pub enum ProviderOutcome {
    /// Provider reported an index directly
    Resolved(AqiResult),
    /// Provider reported concentrations that must be converted
    NeedsConversion(RawMeasurement),
    /// Call succeeded but there was no usable measurement nearby
    Empty,
    /// Provider unreachable, non-2xx, or the payload was unusable
    TransportError(ProviderError),
}

impl ProviderOutcome {
    /// Short label for logs and the visit record
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ProviderOutcome::Resolved(_) => "resolved",
            ProviderOutcome::NeedsConversion(_) => "needs_conversion",
            ProviderOutcome::Empty => "empty",
            ProviderOutcome::TransportError(_) => "transport_error",
        }
    }
}

/// The supported upstream networks. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Reference-grade monitors reporting a computed index
    AirNow,
    /// Crowd-sourced particulate sensors reporting raw concentrations
    PurpleAir,
    /// City-level monitor network reporting a computed index
    Waqi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::AirNow,
        ProviderKind::PurpleAir,
        ProviderKind::Waqi,
    ];

    /// Path segment of the provider's dedicated endpoint
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            ProviderKind::AirNow => "airnow",
            ProviderKind::PurpleAir => "purpleair",
            ProviderKind::Waqi => "waqi",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown provider '{s}'"))
    }
}

/// One upstream air quality source
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Correction the converter applies to this provider's raw readings
    fn correction(&self) -> Correction {
        Correction::None
    }

    async fn query(&self, coordinate: &Coordinate) -> ProviderOutcome;
}

/// Build the HTTP client shared by all adapters
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("aqi-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .with_context(|| "Failed to create HTTP client")
}

/// Send `request` and decode a JSON body, mapping non-2xx to an error
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    debug!("HTTP response received: {}", status);

    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

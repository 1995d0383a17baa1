use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{Provider, ProviderKind, ProviderOutcome, fetch_json, trim_base_url};
use crate::models::{AqiResult, Coordinate, Pm25Aqi};

pub const DEFAULT_BASE_URL: &str = "https://www.airnowapi.org";

/// AirNow current-observation client (reference-grade monitors)
pub struct AirNowProvider {
    client: Client,
    api_key: String,
    base_url: String,
    distance_miles: u32,
}

/// One pollutant observation from the `latLong/current` endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Observation {
    pub parameter_name: String,
    /// Absent, null, or `-1` when the monitor has no current index
    #[serde(rename = "AQI", default)]
    pub aqi: Option<i32>,
    pub reporting_area: Option<String>,
    pub date_observed: Option<String>,
}

impl AirNowProvider {
    pub fn new(client: Client, api_key: String, base_url: &str, distance_miles: u32) -> Self {
        Self {
            client,
            api_key,
            base_url: trim_base_url(base_url),
            distance_miles,
        }
    }

    fn url(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/aq/observation/latLong/current/?format=application/json&latitude={}&longitude={}&distance={}&API_KEY={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            self.distance_miles,
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl Provider for AirNowProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AirNow
    }

    #[instrument(name = "airnow_query", skip(self))]
    async fn query(&self, coordinate: &Coordinate) -> ProviderOutcome {
        match fetch_json::<Vec<Observation>>(self.client.get(self.url(coordinate))).await {
            Ok(observations) => parse_observations(&observations),
            Err(e) => {
                warn!("AirNow request failed: {}", e);
                ProviderOutcome::TransportError(e)
            }
        }
    }
}

/// Pick the PM2.5 (and, if reported, ozone) entries out of an observation list
#[must_use]
pub fn parse_observations(observations: &[Observation]) -> ProviderOutcome {
    let find = |name: &str| {
        observations
            .iter()
            .find(|o| o.parameter_name.trim().eq_ignore_ascii_case(name))
    };

    let Some(pm25) = find("PM2.5") else {
        warn!("No PM2.5 conditions returned");
        return ProviderOutcome::Empty;
    };
    let Some(index) = reported_index(pm25) else {
        warn!("PM2.5 observation carries no index");
        return ProviderOutcome::Empty;
    };

    info!(
        "AQI : {} ({})",
        index,
        pm25.reporting_area.as_deref().unwrap_or("unknown area")
    );

    let ozone = find("O3").and_then(reported_index).map(f64::from);
    ProviderOutcome::Resolved(AqiResult::new(Pm25Aqi::Index(index), ozone))
}

fn reported_index(observation: &Observation) -> Option<i32> {
    observation.aqi.filter(|aqi| *aqi >= 0)
}

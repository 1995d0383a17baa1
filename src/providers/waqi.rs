use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{Provider, ProviderKind, ProviderOutcome, fetch_json, trim_base_url};
use crate::error::ProviderError;
use crate::models::{AqiResult, Coordinate, Pm25Aqi};

pub const DEFAULT_BASE_URL: &str = "https://api.waqi.info";

/// World Air Quality Index client (nearest city-level station)
pub struct WaqiProvider {
    client: Client,
    token: String,
    base_url: String,
}

/// `/feed/geo:` envelope. `data` is an object on success and a message otherwise.
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    pub status: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct StationData {
    /// Station index; a number, or `"-"` when the station is offline
    #[serde(default)]
    aqi: Value,
    #[serde(default)]
    iaqi: HashMap<String, IndividualIndex>,
}

#[derive(Debug, Deserialize)]
struct IndividualIndex {
    v: f64,
}

impl WaqiProvider {
    pub fn new(client: Client, token: String, base_url: &str) -> Self {
        Self {
            client,
            token,
            base_url: trim_base_url(base_url),
        }
    }

    fn url(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/feed/geo:{};{}/?token={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            urlencoding::encode(&self.token)
        )
    }
}

#[async_trait]
impl Provider for WaqiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Waqi
    }

    #[instrument(name = "waqi_query", skip(self))]
    async fn query(&self, coordinate: &Coordinate) -> ProviderOutcome {
        match fetch_json::<FeedResponse>(self.client.get(self.url(coordinate))).await {
            Ok(feed) => parse_feed(feed),
            Err(e) => {
                warn!("WAQI request failed: {}", e);
                ProviderOutcome::TransportError(e)
            }
        }
    }
}

/// Classify a feed payload. Only `status == "ok"` counts as an answer.
#[must_use]
pub fn parse_feed(feed: FeedResponse) -> ProviderOutcome {
    if feed.status != "ok" {
        warn!("WAQI returned status '{}': {}", feed.status, feed.data);
        return ProviderOutcome::TransportError(ProviderError::Upstream(feed.status));
    }

    let station: StationData = match serde_json::from_value(feed.data) {
        Ok(station) => station,
        Err(e) => return ProviderOutcome::TransportError(ProviderError::Parse(e.to_string())),
    };

    let pm25 = match station.iaqi.get("pm25") {
        Some(reading) => index_from_number(reading.v),
        None => station.aqi.as_f64().map_or(Pm25Aqi::Unavailable, index_from_number),
    };
    let ozone = station.iaqi.get("o3").map(|reading| reading.v);

    info!("AQI : {:?}, O3: {:?}", pm25, ozone);
    ProviderOutcome::Resolved(AqiResult::new(pm25, ozone))
}

fn index_from_number(value: f64) -> Pm25Aqi {
    if !value.is_finite() {
        Pm25Aqi::Unavailable
    } else if value < 0.0 {
        Pm25Aqi::Negative(value)
    } else {
        Pm25Aqi::Index(value.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::build_client;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed(body: Value) -> FeedResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_ok_status_uses_individual_pm25_index() {
        let outcome = parse_feed(feed(json!({
            "status": "ok",
            "data": {"aqi": 88, "iaqi": {"pm25": {"v": 61}, "o3": {"v": 88.4}}}
        })));
        match outcome {
            ProviderOutcome::Resolved(result) => {
                assert_eq!(result.pm25, Pm25Aqi::Index(61));
                assert_eq!(result.ozone, Some(88.4));
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[test]
    fn test_falls_back_to_station_index() {
        let outcome = parse_feed(feed(json!({
            "status": "ok",
            "data": {"aqi": 42, "iaqi": {}}
        })));
        assert!(matches!(
            outcome,
            ProviderOutcome::Resolved(AqiResult {
                pm25: Pm25Aqi::Index(42),
                ozone: None
            })
        ));
    }

    #[test]
    fn test_offline_station_is_unavailable() {
        let outcome = parse_feed(feed(json!({"status": "ok", "data": {"aqi": "-"}})));
        assert!(matches!(
            outcome,
            ProviderOutcome::Resolved(AqiResult {
                pm25: Pm25Aqi::Unavailable,
                ..
            })
        ));
    }

    #[test]
    fn test_error_status_is_transport_error() {
        let outcome = parse_feed(feed(json!({"status": "error", "data": "Invalid key"})));
        assert!(matches!(
            outcome,
            ProviderOutcome::TransportError(ProviderError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_query_targets_geo_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed/geo:51.5;-0.12/"))
            .and(query_param("token", "demo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": {"aqi": 30, "iaqi": {"pm25": {"v": 30}}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let provider = WaqiProvider::new(client, "demo".into(), &server.uri());
        let outcome = provider
            .query(&Coordinate::new(51.5, -0.12).unwrap())
            .await;
        assert!(matches!(outcome, ProviderOutcome::Resolved(_)));
    }
}

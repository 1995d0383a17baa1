use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{Provider, ProviderKind, ProviderOutcome, fetch_json, trim_base_url};
use crate::conversion::Correction;
use crate::geo::BoundingBox;
use crate::models::{Coordinate, RawMeasurement};

pub const DEFAULT_BASE_URL: &str = "https://api.purpleair.com";

const PM25_FIELD: &str = "pm2.5";
const HUMIDITY_FIELD: &str = "humidity";
const OZONE_FIELD: &str = "ozone1";

/// PurpleAir sensor-network client (crowd-sourced particulate sensors)
pub struct PurpleAirProvider {
    client: Client,
    api_key: String,
    base_url: String,
    radius_km: f64,
}

/// Columnar `/v1/sensors` payload: `fields` names the columns of each `data` row
#[derive(Debug, Deserialize)]
pub struct SensorsResponse {
    pub fields: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<Value>>,
}

impl SensorsResponse {
    fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.fields.iter().position(|field| field == name)?;
        Some(
            self.data
                .iter()
                .filter_map(|row| row.get(index).and_then(Value::as_f64))
                .filter(|value| value.is_finite())
                .collect(),
        )
    }
}

impl PurpleAirProvider {
    pub fn new(client: Client, api_key: String, base_url: &str, radius_km: f64) -> Self {
        Self {
            client,
            api_key,
            base_url: trim_base_url(base_url),
            radius_km,
        }
    }

    fn url(&self, bbox: &BoundingBox) -> String {
        format!(
            "{}/v1/sensors?fields={},{},{}&location_type=0&nwlng={}&nwlat={}&selng={}&selat={}",
            self.base_url,
            PM25_FIELD,
            HUMIDITY_FIELD,
            OZONE_FIELD,
            bbox.west,
            bbox.north,
            bbox.east,
            bbox.south
        )
    }
}

#[async_trait]
impl Provider for PurpleAirProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PurpleAir
    }

    fn correction(&self) -> Correction {
        Correction::UsEpa
    }

    #[instrument(name = "purpleair_query", skip(self))]
    async fn query(&self, coordinate: &Coordinate) -> ProviderOutcome {
        let bbox = match BoundingBox::around(coordinate, self.radius_km) {
            Ok(bbox) => bbox,
            Err(e) => {
                warn!("Cannot search sensors here: {}", e);
                return ProviderOutcome::Empty;
            }
        };
        debug!("Sensor search window: {:?}", bbox);

        let request = self
            .client
            .get(self.url(&bbox))
            .header("X-API-Key", &self.api_key);

        match fetch_json::<SensorsResponse>(request).await {
            Ok(response) => average_sensors(&response),
            Err(e) => {
                warn!("PurpleAir request failed: {}", e);
                ProviderOutcome::TransportError(e)
            }
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Average the readings of every returned sensor into one measurement
#[must_use]
pub fn average_sensors(response: &SensorsResponse) -> ProviderOutcome {
    let pm25 = response.column(PM25_FIELD).unwrap_or_default();
    let Some(pm25_mean) = mean(&pm25) else {
        warn!("No sensors with PM2.5 readings in range");
        return ProviderOutcome::Empty;
    };

    let humidity = response.column(HUMIDITY_FIELD).and_then(|v| mean(&v));
    let ozone = response.column(OZONE_FIELD).and_then(|v| mean(&v));

    info!(
        "Averaged {} sensor(s): pm2.5 {:.2}, humidity {:?}",
        pm25.len(),
        pm25_mean,
        humidity
    );

    ProviderOutcome::NeedsConversion(RawMeasurement {
        pm25: pm25_mean,
        humidity,
        ozone,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::build_client;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn response(body: Value) -> SensorsResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_averages_all_sensors() {
        let response = response(json!({
            "fields": ["sensor_index", "pm2.5", "humidity"],
            "data": [[1, 30.0, 40.0], [2, 50.0, 60.0]]
        }));
        match average_sensors(&response) {
            ProviderOutcome::NeedsConversion(measurement) => {
                assert_eq!(measurement.pm25, 40.0);
                assert_eq!(measurement.humidity, Some(50.0));
                assert_eq!(measurement.ozone, None);
            }
            other => panic!("expected NeedsConversion, got {other:?}"),
        }
    }

    #[test]
    fn test_null_readings_are_skipped() {
        let response = response(json!({
            "fields": ["pm2.5", "humidity"],
            "data": [[10.0, null], [null, 30.0], [20.0, 50.0]]
        }));
        match average_sensors(&response) {
            ProviderOutcome::NeedsConversion(measurement) => {
                assert_eq!(measurement.pm25, 15.0);
                assert_eq!(measurement.humidity, Some(40.0));
            }
            other => panic!("expected NeedsConversion, got {other:?}"),
        }
    }

    #[test]
    fn test_no_sensors_is_empty() {
        let response = response(json!({"fields": ["pm2.5", "humidity"], "data": []}));
        assert!(matches!(average_sensors(&response), ProviderOutcome::Empty));

        let response = response_without_pm();
        assert!(matches!(average_sensors(&response), ProviderOutcome::Empty));
    }

    fn response_without_pm() -> SensorsResponse {
        response(json!({"fields": ["humidity"], "data": [[40.0]]}))
    }

    #[test]
    fn test_uses_humidity_aware_correction() {
        let client = build_client(Duration::from_secs(5)).unwrap();
        let provider = PurpleAirProvider::new(client, "k".into(), DEFAULT_BASE_URL, 5.0);
        assert_eq!(provider.correction(), Correction::UsEpa);
    }

    #[tokio::test]
    async fn test_query_uses_bounding_box_and_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sensors"))
            .and(header("X-API-Key", "read-key"))
            .and(query_param("location_type", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": ["sensor_index", "pm2.5", "humidity"],
                "data": [[7, 40.0, 50.0]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let provider = PurpleAirProvider::new(client, "read-key".into(), &server.uri(), 5.0);
        let outcome = provider
            .query(&Coordinate::new(0.0, 0.0).unwrap())
            .await;
        assert!(matches!(outcome, ProviderOutcome::NeedsConversion(_)));

        let requests = server.received_requests().await.unwrap();
        let pairs: std::collections::HashMap<String, String> =
            requests[0].url.query_pairs().into_owned().collect();
        let west: f64 = pairs["nwlng"].parse().unwrap();
        let east: f64 = pairs["selng"].parse().unwrap();
        let north: f64 = pairs["nwlat"].parse().unwrap();
        let south: f64 = pairs["selat"].parse().unwrap();
        assert!(west < 0.0 && east > 0.0);
        assert!(south < 0.0 && north > 0.0);
        assert!((west + east).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_polar_query_is_empty_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let provider = PurpleAirProvider::new(client, "k".into(), &server.uri(), 5.0);
        let outcome = provider
            .query(&Coordinate::new(89.95, 0.0).unwrap())
            .await;
        assert!(matches!(outcome, ProviderOutcome::Empty));
    }

    #[tokio::test]
    async fn test_unauthorized_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let provider = PurpleAirProvider::new(client, "bad".into(), &server.uri(), 5.0);
        let outcome = provider
            .query(&Coordinate::new(40.0, -105.0).unwrap())
            .await;
        assert!(matches!(outcome, ProviderOutcome::TransportError(_)));
    }
}

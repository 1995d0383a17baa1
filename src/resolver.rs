//! Multi-provider AQI resolution
//!
//! Providers are tried strictly in priority order, one call at a time. A
//! provider that reports an index ends the search; one that reports raw
//! concentrations is converted with its own correction curve; one that is
//! empty or failing hands over to the next. Dropping the future returned by
//! [`Resolver::resolve`] cancels the in-flight call and stops fail-over.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::AqiConfig;
use crate::conversion;
use crate::error::{AqiError, ProviderError};
use crate::models::{AqiResult, Coordinate, CoordinateQuery};
use crate::providers::{
    self, AirNowProvider, Provider, ProviderKind, ProviderOutcome, PurpleAirProvider,
    WaqiProvider,
};
use crate::visits::{NoopVisitSink, Visit, VisitOutcome, VisitSink};

/// One provider call made during a resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub provider: ProviderKind,
    pub outcome: &'static str,
}

/// A successful lookup and how it was reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub result: AqiResult,
    pub provider: ProviderKind,
    pub attempts: Vec<Attempt>,
}

/// Outcome of a single hop, for boundaries that expose each provider separately
#[derive(Debug, Clone, PartialEq)]
pub enum StepDecision {
    Resolved(Resolution),
    /// `failed` had nothing usable; `next` is the provider to hand over to,
    /// or `None` once the chain is exhausted
    HandOff {
        failed: ProviderKind,
        next: Option<ProviderKind>,
    },
}

pub struct Resolver {
    providers: Vec<Arc<dyn Provider>>,
    timeout: Duration,
    visits: Arc<dyn VisitSink>,
}

impl Resolver {
    /// Chain `providers` in the given order; each call is bounded by `timeout`
    pub fn new(providers: Vec<Arc<dyn Provider>>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            visits: Arc::new(NoopVisitSink),
        }
    }

    #[must_use]
    pub fn with_visits(mut self, visits: Arc<dyn VisitSink>) -> Self {
        self.visits = visits;
        self
    }

    /// Build the standard AirNow → PurpleAir → WAQI chain.
    ///
    /// Providers without a credential are left out of the chain.
    pub fn from_config(config: &AqiConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.providers.timeout_seconds.into());
        let client = providers::build_client(timeout)?;
        let settings = &config.providers;

        let mut chain: Vec<Arc<dyn Provider>> = Vec::new();
        for kind in ProviderKind::ALL {
            let provider: Option<Arc<dyn Provider>> = match kind {
                ProviderKind::AirNow => settings.airnow.api_key.clone().map(|key| {
                    Arc::new(AirNowProvider::new(
                        client.clone(),
                        key,
                        &settings.airnow.base_url,
                        settings.airnow.distance_miles,
                    )) as Arc<dyn Provider>
                }),
                ProviderKind::PurpleAir => settings.purpleair.api_key.clone().map(|key| {
                    Arc::new(PurpleAirProvider::new(
                        client.clone(),
                        key,
                        &settings.purpleair.base_url,
                        settings.purpleair.radius_km,
                    )) as Arc<dyn Provider>
                }),
                ProviderKind::Waqi => settings.waqi.token.clone().map(|token| {
                    Arc::new(WaqiProvider::new(
                        client.clone(),
                        token,
                        &settings.waqi.base_url,
                    )) as Arc<dyn Provider>
                }),
            };

            match provider {
                Some(provider) => chain.push(provider),
                None => warn!("No credential configured for {}, skipping it", kind),
            }
        }

        if chain.is_empty() {
            warn!("No air quality providers configured; every lookup will fail");
        }
        info!(
            "Provider chain: {}",
            chain
                .iter()
                .map(|p| p.kind().slug())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Self::new(chain, timeout))
    }

    /// Kinds in the order they are tried
    #[must_use]
    pub fn chain(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    /// Run the full fail-over chain for a caller's query
    #[instrument(skip(self, query), fields(lat = ?query.lat, lon = ?query.lon))]
    pub async fn resolve(&self, query: &CoordinateQuery) -> crate::Result<Resolution> {
        let coordinate = self.validate(query)?;

        let start_time = Instant::now();
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let (attempt, result) = self.try_provider(provider.as_ref(), &coordinate).await;
            attempts.push(attempt);

            if let Some(result) = result {
                info!(
                    "Resolved {} via {} in {:.3}s after {} attempt(s): {}",
                    coordinate.format_coordinates(),
                    provider.kind(),
                    start_time.elapsed().as_secs_f64(),
                    attempts.len(),
                    result.category().map_or("no index", |c| c.label())
                );
                self.visits.record(
                    Visit::new(Some(coordinate), query.device.clone(), VisitOutcome::Resolved)
                        .answered_by(provider.kind()),
                );
                return Ok(Resolution {
                    result,
                    provider: provider.kind(),
                    attempts,
                });
            }
        }

        warn!(
            "All {} provider(s) exhausted for {}",
            attempts.len(),
            coordinate.format_coordinates()
        );
        self.visits.record(Visit::new(
            Some(coordinate),
            query.device.clone(),
            VisitOutcome::Exhausted,
        ));
        Err(AqiError::AllProvidersExhausted {
            attempts: attempts.len(),
        })
    }

    /// Parse the caller's coordinate, recording a visit when it is rejected
    pub fn validate(&self, query: &CoordinateQuery) -> crate::Result<Coordinate> {
        query.coordinate().inspect_err(|e| {
            warn!("Rejected lookup: {}", e);
            self.visits
                .record(Visit::new(None, query.device.clone(), rejection_outcome(e)));
        })
    }

    /// Ask exactly one provider and say where to go next if it had nothing
    #[instrument(skip(self))]
    pub async fn step(
        &self,
        kind: ProviderKind,
        coordinate: &Coordinate,
        device: Option<String>,
    ) -> StepDecision {
        let Some(provider) = self.providers.iter().find(|p| p.kind() == kind) else {
            debug!("{} is not in the chain", kind);
            return self.hand_off(kind, coordinate, device);
        };

        let (attempt, result) = self.try_provider(provider.as_ref(), coordinate).await;
        match result {
            Some(result) => {
                self.visits.record(
                    Visit::new(Some(*coordinate), device, VisitOutcome::Resolved)
                        .answered_by(kind),
                );
                StepDecision::Resolved(Resolution {
                    result,
                    provider: kind,
                    attempts: vec![attempt],
                })
            }
            None => self.hand_off(kind, coordinate, device),
        }
    }

    fn hand_off(
        &self,
        failed: ProviderKind,
        coordinate: &Coordinate,
        device: Option<String>,
    ) -> StepDecision {
        let next = self.next_after(failed);
        if next.is_none() {
            self.visits
                .record(Visit::new(Some(*coordinate), device, VisitOutcome::Exhausted));
        }
        StepDecision::HandOff { failed, next }
    }

    /// Provider that follows `kind` in the chain. For a kind that is not
    /// configured, the first configured provider of lower priority.
    #[must_use]
    pub fn next_after(&self, kind: ProviderKind) -> Option<ProviderKind> {
        match self.providers.iter().position(|p| p.kind() == kind) {
            Some(index) => self.providers.get(index + 1).map(|p| p.kind()),
            None => self
                .providers
                .iter()
                .map(|p| p.kind())
                .find(|candidate| *candidate > kind),
        }
    }

    async fn try_provider(
        &self,
        provider: &dyn Provider,
        coordinate: &Coordinate,
    ) -> (Attempt, Option<AqiResult>) {
        let kind = provider.kind();
        debug!("Trying provider {}", kind);

        let outcome = match tokio::time::timeout(self.timeout, provider.query(coordinate)).await {
            Ok(outcome) => outcome,
            Err(_) => ProviderOutcome::TransportError(ProviderError::Timeout(self.timeout)),
        };
        let attempt = Attempt {
            provider: kind,
            outcome: outcome.label(),
        };

        let result = match outcome {
            ProviderOutcome::Resolved(result) => Some(result),
            ProviderOutcome::NeedsConversion(measurement) => {
                let result = conversion::convert(&measurement, provider.correction());
                debug!(
                    "Converted pm2.5 {:.2} with {:?} correction to {:?}",
                    measurement.pm25,
                    provider.correction(),
                    result.pm25
                );
                Some(result)
            }
            ProviderOutcome::Empty => {
                info!("{} had no data, failing over", kind);
                None
            }
            ProviderOutcome::TransportError(e) => {
                warn!("{} failed ({}), failing over", kind, e);
                None
            }
        };

        (attempt, result)
    }
}

fn rejection_outcome(error: &AqiError) -> VisitOutcome {
    match error {
        AqiError::MissingCoordinate { .. } => VisitOutcome::MissingCoordinate,
        _ => VisitOutcome::InvalidCoordinate,
    }
}

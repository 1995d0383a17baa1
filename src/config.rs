//! Configuration management for the AQI relay
//!
//! Handles loading configuration from a TOML file and `AQI_`-prefixed
//! environment variables, and validates the result.

use crate::AqiError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::{airnow, purpleair, waqi};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AqiConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Visit log settings
    #[serde(default)]
    pub visits: VisitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whole-request timeout in seconds, covering every fail-over hop
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
    /// Serve HTTPS when present
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Per-provider call timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub airnow: AirNowConfig,
    #[serde(default)]
    pub purpleair: PurpleAirConfig,
    #[serde(default)]
    pub waqi: WaqiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirNowConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_airnow_base_url")]
    pub base_url: String,
    /// Search distance for the nearest reporting area, in miles
    #[serde(default = "default_airnow_distance")]
    pub distance_miles: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurpleAirConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_purpleair_base_url")]
    pub base_url: String,
    /// Half-width of the sensor search window, in kilometers
    #[serde(default = "default_purpleair_radius")]
    pub radius_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaqiConfig {
    pub token: Option<String>,
    #[serde(default = "default_waqi_base_url")]
    pub base_url: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint for span export
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_visits_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u32 {
    30
}

fn default_provider_timeout() -> u32 {
    8
}

fn default_airnow_base_url() -> String {
    airnow::DEFAULT_BASE_URL.to_string()
}

fn default_airnow_distance() -> u32 {
    25
}

fn default_purpleair_base_url() -> String {
    purpleair::DEFAULT_BASE_URL.to_string()
}

fn default_purpleair_radius() -> f64 {
    5.0
}

fn default_waqi_base_url() -> String {
    waqi::DEFAULT_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_visits_path() -> PathBuf {
    PathBuf::from("data/visits")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            tls: None,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_provider_timeout(),
            airnow: AirNowConfig::default(),
            purpleair: PurpleAirConfig::default(),
            waqi: WaqiConfig::default(),
        }
    }
}

impl Default for AirNowConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_airnow_base_url(),
            distance_miles: default_airnow_distance(),
        }
    }
}

impl Default for PurpleAirConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_purpleair_base_url(),
            radius_km: default_purpleair_radius(),
        }
    }
}

impl Default for WaqiConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_waqi_base_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl Default for VisitsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_visits_path(),
        }
    }
}

impl AqiConfig {
    /// Load configuration from `config.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.map_or_else(|| PathBuf::from("config.toml"), Path::to_path_buf);

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        } else if config_path.is_some() {
            return Err(AqiError::config(format!(
                "Config file not found: {}",
                config_file.display()
            ))
            .into());
        }

        // Add environment variable overrides, e.g. AQI_PROVIDERS__AIRNOW__API_KEY
        builder = builder.add_source(
            Environment::with_prefix("AQI")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AqiConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_legacy_keys(|name| std::env::var(name).ok());
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Fill unset credentials from the bare `AIRNOW_KEY`, `PURPLEAIR_KEY`
    /// and `WAQI_TOKEN` variables
    pub fn apply_legacy_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let providers = &mut self.providers;
        if providers.airnow.api_key.is_none() {
            providers.airnow.api_key = lookup("AIRNOW_KEY");
        }
        if providers.purpleair.api_key.is_none() {
            providers.purpleair.api_key = lookup("PURPLEAIR_KEY");
        }
        if providers.waqi.token.is_none() {
            providers.waqi.token = lookup("WAQI_TOKEN");
        }
    }

    /// Apply default values to empty or zeroed fields
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.providers.timeout_seconds == 0 {
            self.providers.timeout_seconds = default_provider_timeout();
        }
        if self.providers.airnow.base_url.is_empty() {
            self.providers.airnow.base_url = default_airnow_base_url();
        }
        if self.providers.purpleair.base_url.is_empty() {
            self.providers.purpleair.base_url = default_purpleair_base_url();
        }
        if self.providers.waqi.base_url.is_empty() {
            self.providers.waqi.base_url = default_waqi_base_url();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Credentials are opaque, but an empty one is always a mistake
    pub fn validate_api_keys(&self) -> Result<()> {
        let keys = [
            ("AirNow API key", &self.providers.airnow.api_key),
            ("PurpleAir API key", &self.providers.purpleair.api_key),
            ("WAQI token", &self.providers.waqi.token),
        ];

        for (name, key) in keys {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                return Err(AqiError::config(format!(
                    "{name} cannot be empty if provided. Either remove it or provide a valid key."
                ))
                .into());
            }
        }

        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if !(1..=60).contains(&self.providers.timeout_seconds) {
            return Err(
                AqiError::config("Provider timeout must be between 1 and 60 seconds").into(),
            );
        }

        if self.server.request_timeout_seconds > 300 {
            return Err(AqiError::config("Request timeout cannot exceed 300 seconds").into());
        }

        let radius = self.providers.purpleair.radius_km;
        if !radius.is_finite() || radius <= 0.0 || radius > 100.0 {
            return Err(AqiError::config(
                "PurpleAir search radius must be greater than 0 and at most 100 km",
            )
            .into());
        }

        if !(1..=100).contains(&self.providers.airnow.distance_miles) {
            return Err(
                AqiError::config("AirNow distance must be between 1 and 100 miles").into(),
            );
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AqiError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AqiError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let base_urls = [
            &self.providers.airnow.base_url,
            &self.providers.purpleair.base_url,
            &self.providers.waqi.base_url,
        ];
        for url in base_urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AqiError::config(format!(
                    "Provider base URL '{url}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

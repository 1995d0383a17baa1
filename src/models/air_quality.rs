//! Air quality result and raw measurement models

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// PM2.5 index value as reported to callers.
///
/// Serializes as a bare number, or `"-"` when no index could be computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pm25Aqi {
    /// A regular index on the 0–500 scale (values above 500 are possible for
    /// concentrations beyond the table's top breakpoint)
    Index(i32),
    /// Negative concentration passed through unchanged
    Negative(f64),
    /// No usable reading
    Unavailable,
}

impl Pm25Aqi {
    #[must_use]
    pub fn index(&self) -> Option<i32> {
        match self {
            Pm25Aqi::Index(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, Pm25Aqi::Unavailable)
    }
}

impl Serialize for Pm25Aqi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Pm25Aqi::Index(value) => serializer.serialize_i32(*value),
            Pm25Aqi::Negative(value) => serializer.serialize_f64(*value),
            Pm25Aqi::Unavailable => serializer.serialize_str("-"),
        }
    }
}

impl<'de> Deserialize<'de> for Pm25Aqi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Int(value) if value < 0 => Pm25Aqi::Negative(value as f64),
            Repr::Int(value) => i32::try_from(value).map_or(Pm25Aqi::Unavailable, Pm25Aqi::Index),
            Repr::Float(value) if value < 0.0 => Pm25Aqi::Negative(value),
            Repr::Float(value) if value.is_finite() => Pm25Aqi::Index(value.round() as i32),
            Repr::Float(_) | Repr::Text(_) => Pm25Aqi::Unavailable,
        })
    }
}

/// Canonical output of the resolution pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AqiResult {
    #[serde(rename = "PM2.5")]
    pub pm25: Pm25Aqi,
    #[serde(rename = "O3")]
    pub ozone: Option<f64>,
}

impl AqiResult {
    #[must_use]
    pub fn new(pm25: Pm25Aqi, ozone: Option<f64>) -> Self {
        Self { pm25, ozone }
    }

    /// Health category of the PM2.5 index, when there is one
    #[must_use]
    pub fn category(&self) -> Option<AqiCategory> {
        self.pm25.index().map(AqiCategory::from_index)
    }
}

/// Sensor-level reading that still has to be converted into an index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    /// PM2.5 concentration in µg/m³
    pub pm25: f64,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// Ozone concentration in ppb
    pub ozone: Option<f64>,
}

/// EPA health category for an index value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    #[must_use]
    pub fn from_index(index: i32) -> Self {
        match index {
            i32::MIN..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

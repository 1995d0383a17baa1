//! PM2.5 concentration to AQI conversion
//!
//! Implements the EPA piecewise-linear breakpoint formula together with the
//! correction curves applied to low-cost particulate sensors before
//! interpolation.

use serde::{Deserialize, Serialize};

use crate::models::{AqiResult, Pm25Aqi, RawMeasurement};

/// Readings above this are treated as sensor faults
pub const MAX_VALID_CONCENTRATION: f64 = 1000.0;

/// One row of the EPA PM2.5 breakpoint table
#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    /// A concentration must exceed this to fall in the tier
    threshold: f64,
    bp_low: f64,
    bp_high: f64,
    i_low: f64,
    i_high: f64,
}

impl Breakpoint {
    const fn new(threshold: f64, bp_low: f64, bp_high: f64, i_low: f64, i_high: f64) -> Self {
        Self {
            threshold,
            bp_low,
            bp_high,
            i_low,
            i_high,
        }
    }

    fn interpolate(&self, concentration: f64) -> i32 {
        let slope = (self.i_high - self.i_low) / (self.bp_high - self.bp_low);
        (slope * (concentration - self.bp_low) + self.i_low).round() as i32
    }
}

/// Highest tier first; the last row catches every remaining non-negative value.
const BREAKPOINTS: [Breakpoint; 7] = [
    Breakpoint::new(350.5, 350.5, 500.0, 401.0, 500.0),
    Breakpoint::new(250.5, 250.5, 350.4, 301.0, 400.0),
    Breakpoint::new(150.5, 150.5, 250.4, 201.0, 300.0),
    Breakpoint::new(55.5, 55.5, 150.4, 151.0, 200.0),
    Breakpoint::new(35.5, 35.5, 55.4, 101.0, 150.0),
    Breakpoint::new(12.1, 12.1, 35.4, 51.0, 100.0),
    Breakpoint::new(f64::NEG_INFINITY, 0.0, 12.0, 0.0, 50.0),
];

/// Convert a PM2.5 concentration (µg/m³) into an AQI value.
///
/// Negative readings come back unchanged as [`Pm25Aqi::Negative`].
#[must_use]
pub fn aqi_from_concentration(pm: Option<f64>) -> Pm25Aqi {
    let Some(pm) = pm.filter(|pm| !pm.is_nan()) else {
        return Pm25Aqi::Unavailable;
    };
    if pm < 0.0 {
        return Pm25Aqi::Negative(pm);
    }
    if pm > MAX_VALID_CONCENTRATION {
        return Pm25Aqi::Unavailable;
    }

    BREAKPOINTS
        .iter()
        .find(|tier| pm > tier.threshold)
        .map_or(Pm25Aqi::Unavailable, |tier| Pm25Aqi::Index(tier.interpolate(pm)))
}

/// Pre-interpolation adjustment for a provider's raw readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    /// Reference-grade monitor, used as-is
    None,
    /// AQandU linear fit: `0.778 × pm + 2.65`
    AqAndU,
    /// US EPA humidity-aware fit: `0.534 × pm − 0.0844 × RH + 5.604`
    UsEpa,
}

impl Correction {
    /// Corrected concentration for `measurement`.
    ///
    /// `UsEpa` needs a humidity reading; without one the result is NaN, which
    /// converts to [`Pm25Aqi::Unavailable`].
    #[must_use]
    pub fn apply(&self, measurement: &RawMeasurement) -> f64 {
        let pm = measurement.pm25;
        match (self, measurement.humidity) {
            (Correction::None, _) => pm,
            (Correction::AqAndU, _) => 0.778 * pm + 2.65,
            (Correction::UsEpa, Some(humidity)) => 0.534 * pm - 0.0844 * humidity + 5.604,
            (Correction::UsEpa, None) => f64::NAN,
        }
    }
}

/// Turn a raw measurement into the pipeline's output unit.
///
/// Ozone is reported in concentration units by sensor networks and has no
/// conversion here, so converted results carry no ozone index.
#[must_use]
pub fn convert(measurement: &RawMeasurement, correction: Correction) -> AqiResult {
    let corrected = correction.apply(measurement);
    AqiResult::new(aqi_from_concentration(Some(corrected)), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn aqi(pm: f64) -> Pm25Aqi {
        aqi_from_concentration(Some(pm))
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(6.0, 25)]
    #[case(12.0, 50)]
    #[case(12.2, 51)]
    #[case(35.4, 100)]
    #[case(55.4, 150)]
    #[case(150.4, 200)]
    #[case(250.4, 300)]
    #[case(350.4, 400)]
    #[case(500.0, 500)]
    #[case(1000.0, 831)]
    fn test_breakpoint_table(#[case] pm: f64, #[case] expected: i32) {
        assert_eq!(aqi(pm), Pm25Aqi::Index(expected));
    }

    #[test]
    fn test_good_tier_is_bounded_and_monotonic() {
        let mut previous = 0;
        for step in 0..=120 {
            let pm = f64::from(step) / 10.0;
            let value = aqi(pm).index().unwrap();
            assert!((0..=50).contains(&value), "pm {pm} gave {value}");
            assert!(value >= previous, "pm {pm} decreased to {value}");
            previous = value;
        }
    }

    #[test]
    fn test_tier_boundary_has_no_large_jump() {
        let below = aqi(12.0).index().unwrap();
        let at = aqi(12.1).index().unwrap();
        assert_eq!(below, 50);
        assert!((50..=51).contains(&at));
    }

    #[test]
    fn test_unavailable_inputs() {
        assert_eq!(aqi_from_concentration(None), Pm25Aqi::Unavailable);
        assert_eq!(aqi(f64::NAN), Pm25Aqi::Unavailable);
        assert_eq!(aqi(1000.1), Pm25Aqi::Unavailable);
        assert_eq!(aqi(f64::INFINITY), Pm25Aqi::Unavailable);
    }

    #[test]
    fn test_negative_reading_passes_through() {
        assert_eq!(aqi(-4.25), Pm25Aqi::Negative(-4.25));
    }

    #[test]
    fn test_aqandu_correction() {
        let measurement = RawMeasurement {
            pm25: 10.0,
            humidity: None,
            ozone: None,
        };
        assert!((Correction::AqAndU.apply(&measurement) - 10.43).abs() < 1e-9);
        assert_eq!(
            convert(&measurement, Correction::AqAndU).pm25,
            Pm25Aqi::Index(43)
        );
    }

    #[test]
    fn test_us_epa_correction_with_humidity() {
        let measurement = RawMeasurement {
            pm25: 40.0,
            humidity: Some(50.0),
            ozone: None,
        };
        let corrected = Correction::UsEpa.apply(&measurement);
        assert!((corrected - 22.744).abs() < 1e-9);
        assert_eq!(
            convert(&measurement, Correction::UsEpa),
            AqiResult::new(Pm25Aqi::Index(73), None)
        );
    }

    #[test]
    fn test_us_epa_without_humidity_is_unavailable() {
        let measurement = RawMeasurement {
            pm25: 10.0,
            humidity: None,
            ozone: None,
        };
        assert!(Correction::UsEpa.apply(&measurement).is_nan());
        assert_eq!(
            convert(&measurement, Correction::UsEpa),
            AqiResult::new(Pm25Aqi::Unavailable, None)
        );
    }

    #[test]
    fn test_no_correction_for_reference_monitors() {
        let measurement = RawMeasurement {
            pm25: 35.4,
            humidity: Some(80.0),
            ozone: Some(30.0),
        };
        assert_eq!(
            convert(&measurement, Correction::None),
            AqiResult::new(Pm25Aqi::Index(100), None)
        );
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let measurement = RawMeasurement {
            pm25: 87.3,
            humidity: Some(41.0),
            ozone: None,
        };
        assert_eq!(
            convert(&measurement, Correction::UsEpa),
            convert(&measurement, Correction::UsEpa)
        );
    }
}

//! Metric kinds and raw samples.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, SampleError};

/// How a day of raw samples is rolled up into a daily summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    /// Summaries carry min/max/avg of the day's samples.
    MinMaxAvg,
    /// Summaries carry the sum of the day's samples (step counts).
    Sum,
}

/// A vital-sign kind measured by the ring.
///
/// Every kind shares one generic store; the kind acts as a schema
/// descriptor (aggregation mode, paired-value flag) rather than
/// selecting a per-type implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Heart rate in beats per minute.
    HeartRate,
    /// Blood oxygen saturation (SpO2) percentage.
    BloodOxygen,
    /// Blood pressure; primary value is systolic, secondary is diastolic.
    BloodPressure,
    /// Heart rate variability in milliseconds.
    HeartRateVariability,
    /// Skin temperature in degrees Celsius.
    SkinTemperature,
    /// Core body temperature in degrees Celsius.
    BodyTemperature,
    /// Step count deltas.
    Steps,
    /// Blood glucose in mmol/L.
    Glucose,
}

impl MetricKind {
    /// All metric kinds, in sync-cycle order.
    pub const ALL: [MetricKind; 8] = [
        MetricKind::HeartRate,
        MetricKind::BloodOxygen,
        MetricKind::BloodPressure,
        MetricKind::HeartRateVariability,
        MetricKind::SkinTemperature,
        MetricKind::BodyTemperature,
        MetricKind::Steps,
        MetricKind::Glucose,
    ];

    /// Stable key used in the samples table and on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart_rate",
            MetricKind::BloodOxygen => "blood_oxygen",
            MetricKind::BloodPressure => "blood_pressure",
            MetricKind::HeartRateVariability => "hrv",
            MetricKind::SkinTemperature => "skin_temperature",
            MetricKind::BodyTemperature => "body_temperature",
            MetricKind::Steps => "steps",
            MetricKind::Glucose => "glucose",
        }
    }

    /// How this kind's daily summaries are computed.
    #[must_use]
    pub fn aggregation(&self) -> Aggregation {
        match self {
            MetricKind::Steps => Aggregation::Sum,
            _ => Aggregation::MinMaxAvg,
        }
    }

    /// Whether samples of this kind carry a paired secondary value.
    ///
    /// Only blood pressure does (systolic + diastolic).
    #[must_use]
    pub fn is_paired(&self) -> bool {
        matches!(self, MetricKind::BloodPressure)
    }

    /// Display unit for this kind.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "bpm",
            MetricKind::BloodOxygen => "%",
            MetricKind::BloodPressure => "mmHg",
            MetricKind::HeartRateVariability => "ms",
            MetricKind::SkinTemperature | MetricKind::BodyTemperature => "°C",
            MetricKind::Steps => "steps",
            MetricKind::Glucose => "mmol/L",
        }
    }
}

impl FromStr for MetricKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseError::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw timestamped sample as delivered by the device integration.
///
/// `timestamp` is the measurement time in epoch seconds and is the
/// natural dedup key within a `(user, metric)` table. The ingestion
/// batch time is supplied separately, per batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Measurement time, epoch seconds.
    pub timestamp: i64,
    /// Primary value (systolic, for blood pressure).
    pub value: f64,
    /// Secondary value (diastolic, for blood pressure).
    #[serde(default)]
    pub secondary: Option<f64>,
}

impl MetricSample {
    /// Last accepted measurement time (9999-12-31 23:59:59 UTC).
    /// Calendar-day bucketing cannot represent anything later.
    pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

    /// Create a single-valued sample.
    #[must_use]
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            value,
            secondary: None,
        }
    }

    /// Create a paired sample (systolic/diastolic).
    #[must_use]
    pub fn paired(timestamp: i64, value: f64, secondary: f64) -> Self {
        Self {
            timestamp,
            value,
            secondary: Some(secondary),
        }
    }

    /// Validate this sample against the kind's schema.
    ///
    /// Rejects non-positive or far-future timestamps, non-finite
    /// values, and paired kinds missing their secondary value.
    pub fn validate(&self, kind: MetricKind) -> Result<(), SampleError> {
        if self.timestamp <= 0 {
            return Err(SampleError::NonPositiveTimestamp(self.timestamp));
        }
        if self.timestamp > Self::MAX_TIMESTAMP {
            return Err(SampleError::TimestampOutOfRange(self.timestamp));
        }
        if !self.value.is_finite() {
            return Err(SampleError::NonFiniteValue(self.value));
        }
        match self.secondary {
            Some(v) if !v.is_finite() => return Err(SampleError::NonFiniteSecondary(v)),
            None if kind.is_paired() => return Err(SampleError::MissingSecondary(kind)),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_name() {
        let err = "co2".parse::<MetricKind>().unwrap_err();
        assert!(err.to_string().contains("co2"));
    }

    #[test]
    fn test_steps_aggregate_by_sum() {
        assert_eq!(MetricKind::Steps.aggregation(), Aggregation::Sum);
        assert_eq!(MetricKind::HeartRate.aggregation(), Aggregation::MinMaxAvg);
    }

    #[test]
    fn test_validate_accepts_plain_sample() {
        let sample = MetricSample::new(1_700_000_000, 62.0);
        assert!(sample.validate(MetricKind::HeartRate).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_timestamp() {
        let sample = MetricSample::new(0, 62.0);
        assert_eq!(
            sample.validate(MetricKind::HeartRate),
            Err(SampleError::NonPositiveTimestamp(0))
        );
    }

    #[test]
    fn test_validate_rejects_far_future_timestamp() {
        // Finite and positive, but past year 9999
        let sample = MetricSample::new(300_000_000_000, 62.0);
        assert_eq!(
            sample.validate(MetricKind::HeartRate),
            Err(SampleError::TimestampOutOfRange(300_000_000_000))
        );

        let boundary = MetricSample::new(MetricSample::MAX_TIMESTAMP, 62.0);
        assert!(boundary.validate(MetricKind::HeartRate).is_ok());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let sample = MetricSample::new(1_700_000_000, f64::NAN);
        assert!(matches!(
            sample.validate(MetricKind::HeartRate),
            Err(SampleError::NonFiniteValue(_))
        ));
    }

    #[test]
    fn test_blood_pressure_requires_diastolic() {
        let sample = MetricSample::new(1_700_000_000, 120.0);
        assert_eq!(
            sample.validate(MetricKind::BloodPressure),
            Err(SampleError::MissingSecondary(MetricKind::BloodPressure))
        );

        let paired = MetricSample::paired(1_700_000_000, 120.0, 80.0);
        assert!(paired.validate(MetricKind::BloodPressure).is_ok());
    }

    #[test]
    fn test_sample_json_secondary_defaults_to_none() {
        let sample: MetricSample =
            serde_json::from_str(r#"{"timestamp": 100, "value": 61.5}"#).unwrap();
        assert_eq!(sample.secondary, None);
    }
}

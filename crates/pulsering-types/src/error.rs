//! Error types for data parsing and sample validation.

use thiserror::Error;

/// Errors that can occur when parsing pulsering data.
///
/// This error type is platform-agnostic and does not include
/// storage-specific errors (those belong in pulsering-store).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Failed to parse data due to malformed or insufficient bytes.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unrecognized metric kind name.
    #[error("Unknown metric kind: {0}")]
    UnknownMetric(String),

    /// Unrecognized sleep stage code.
    #[error("Unknown sleep stage: {0}")]
    UnknownSleepStage(u8),

    /// Unrecognized ECG diagnosis code.
    #[error("Unknown diagnosis code: {0}")]
    UnknownDiagnosis(u8),
}

/// Result type alias using pulsering-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Why a raw sample was rejected during ingestion.
///
/// Validation is per-record: a rejected sample never aborts the rest
/// of its batch.
#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    /// Measurement timestamp must be a positive epoch-second value.
    #[error("Timestamp {0} is not a positive epoch time")]
    NonPositiveTimestamp(i64),

    /// Measurement timestamp lies beyond the representable calendar range.
    #[error("Timestamp {0} is beyond the representable calendar range")]
    TimestampOutOfRange(i64),

    /// Primary value is NaN or infinite.
    #[error("Value {0} is not finite")]
    NonFiniteValue(f64),

    /// Secondary value is NaN or infinite.
    #[error("Secondary value {0} is not finite")]
    NonFiniteSecondary(f64),

    /// Metric kind requires a paired secondary value (e.g. diastolic).
    #[error("Metric {0} requires a secondary value")]
    MissingSecondary(crate::MetricKind),
}

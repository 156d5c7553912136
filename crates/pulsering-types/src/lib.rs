//! Domain types for pulsering health-ring data.
//!
//! This crate provides the shared vocabulary used by the store, the
//! sync driver, and the CLI:
//!
//! - Metric kinds with their schema descriptors (aggregation mode,
//!   paired values) and raw timestamped samples
//! - Sleep sessions and stage segments
//! - ECG readings with an opaque length-prefixed waveform encoding
//! - Per-record sample validation and parse errors
//!
//! # Example
//!
//! ```
//! use pulsering_types::{MetricKind, MetricSample};
//!
//! let sample = MetricSample::new(1_700_000_000, 62.0);
//! assert!(sample.validate(MetricKind::HeartRate).is_ok());
//! ```

pub mod ecg;
pub mod error;
pub mod metric;
pub mod sleep;

pub use ecg::{decode_waveform, encode_waveform, DiagnosisCode, EcgReading};
pub use error::{ParseError, ParseResult, SampleError};
pub use metric::{Aggregation, MetricKind, MetricSample};
pub use sleep::{segment_stage_total, SleepSegment, SleepSession, SleepStage};

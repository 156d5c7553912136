//! Data models for stored data.

use serde::{Deserialize, Serialize};

use pulsering_types::{
    decode_waveform, DiagnosisCode, EcgReading, MetricKind, MetricSample, ParseResult,
    SleepSession, SleepStage,
};

/// A raw metric sample stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSample {
    /// Opaque record id (UUID), generated at insert.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Metric kind.
    pub metric: MetricKind,
    /// Measurement time, epoch seconds. Unique within (user, metric).
    pub timestamp: i64,
    /// Primary value.
    pub value: f64,
    /// Secondary value (diastolic, for blood pressure).
    pub secondary: Option<f64>,
    /// Ingestion batch time, epoch seconds.
    pub batch_time: i64,
    /// Remote-acknowledgment watermark.
    pub synced: bool,
    /// Store-managed creation time.
    pub created_at: i64,
    /// Store-managed last-update time.
    pub updated_at: i64,
}

impl StoredSample {
    /// Strip storage bookkeeping back down to the raw sample.
    #[must_use]
    pub fn to_sample(&self) -> MetricSample {
        MetricSample {
            timestamp: self.timestamp,
            value: self.value,
            secondary: self.secondary,
        }
    }
}

/// Per-batch ingestion report.
///
/// A redelivered batch is expected and harmless: duplicates count the
/// timestamps already present, rejected counts samples that failed
/// validation. Neither aborts the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Samples actually inserted.
    pub inserted: usize,
    /// Samples skipped because their timestamp was already present.
    pub duplicates: usize,
    /// Samples rejected by per-record validation.
    pub rejected: usize,
}

/// A daily rollup row for one (user, metric, day).
///
/// Fully recomputed from raw samples on every ingestion touching the
/// day, so it stays consistent under out-of-order and late-arriving
/// samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    /// Owning user.
    pub user_id: String,
    /// Metric kind.
    pub metric: MetricKind,
    /// Calendar day key, `YYYY-MM-DD` (UTC).
    pub day: String,
    /// Number of raw samples in the day. Always positive; an empty day
    /// has no summary row.
    pub sample_count: u64,
    /// Minimum primary value.
    pub min_value: f64,
    /// Maximum primary value.
    pub max_value: f64,
    /// Mean primary value.
    pub avg_value: f64,
    /// Sum of primary values (the headline figure for step counts).
    pub sum_value: f64,
    /// Minimum secondary value, for paired metrics.
    pub secondary_min: Option<f64>,
    /// Maximum secondary value, for paired metrics.
    pub secondary_max: Option<f64>,
    /// Mean secondary value, for paired metrics.
    pub secondary_avg: Option<f64>,
    /// Recomputation watermark.
    pub last_updated: i64,
}

/// A sleep session stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSleepSession {
    /// Opaque session id (UUID), generated at insert.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Nominal statistic time, epoch seconds.
    pub statistic_time: i64,
    /// Session start, epoch seconds.
    pub start_time: i64,
    /// Session end, epoch seconds.
    pub end_time: i64,
    /// Seconds of deep sleep.
    pub deep_seconds: i64,
    /// Seconds of light sleep.
    pub light_seconds: i64,
    /// Seconds of REM sleep.
    pub rem_seconds: i64,
    /// Seconds awake within the session.
    pub awake_seconds: i64,
    /// Total session seconds.
    pub total_seconds: i64,
    /// Ingestion batch time.
    pub batch_time: i64,
    /// Remote-acknowledgment watermark.
    pub synced: bool,
    /// Store-managed creation time.
    pub created_at: i64,
}

impl StoredSleepSession {
    /// Strip storage bookkeeping back down to the session summary.
    #[must_use]
    pub fn to_session(&self) -> SleepSession {
        SleepSession {
            statistic_time: self.statistic_time,
            start_time: self.start_time,
            end_time: self.end_time,
            deep_seconds: self.deep_seconds,
            light_seconds: self.light_seconds,
            rem_seconds: self.rem_seconds,
            awake_seconds: self.awake_seconds,
            total_seconds: self.total_seconds,
            batch_time: self.batch_time,
        }
    }
}

/// A stage segment stored in the database, owned by one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSegment {
    /// Database row id.
    pub id: i64,
    /// Owning session.
    pub session_id: String,
    /// Segment start, epoch seconds.
    pub start_time: i64,
    /// Segment end, epoch seconds.
    pub end_time: i64,
    /// Segment duration in seconds.
    pub duration: i64,
    /// Sleep stage.
    pub stage: SleepStage,
}

/// An ECG reading stored in the database.
///
/// The waveform stays an opaque encoded blob until [`waveform`] is
/// called; list queries never pay the decode cost.
///
/// [`waveform`]: StoredEcg::waveform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEcg {
    /// Owning user.
    pub user_id: String,
    /// Formatted timestamp key.
    pub recorded_at: String,
    /// Encoded waveform blob.
    pub waveform_blob: Vec<u8>,
    /// Derived HRV index.
    pub hrv_index: u8,
    /// Derived cardiac load index.
    pub load_index: u8,
    /// Derived pressure index.
    pub pressure_index: u8,
    /// Derived body index.
    pub body_index: u8,
    /// Device classification.
    pub diagnosis: DiagnosisCode,
    /// Remote-acknowledgment watermark.
    pub synced: bool,
    /// Store-managed creation time.
    pub created_at: i64,
}

impl StoredEcg {
    /// Decode the waveform blob.
    pub fn waveform(&self) -> ParseResult<Vec<i16>> {
        decode_waveform(&self.waveform_blob)
    }

    /// Decode into a full [`EcgReading`].
    pub fn to_reading(&self) -> ParseResult<EcgReading> {
        Ok(EcgReading {
            recorded_at: self.recorded_at.clone(),
            waveform: self.waveform()?,
            hrv_index: self.hrv_index,
            load_index: self.load_index,
            pressure_index: self.pressure_index,
            body_index: self.body_index,
            diagnosis: self.diagnosis,
        })
    }
}

//! Sleep sessions and their stage segments.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Sleep stage of a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SleepStage {
    /// Deep sleep.
    Deep = 0,
    /// Light sleep.
    Light = 1,
    /// REM sleep.
    Rem = 2,
    /// Awake interval inside a session.
    Awake = 3,
}

impl SleepStage {
    /// Stable stage code as stored in the segments table.
    #[must_use]
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for SleepStage {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SleepStage::Deep),
            1 => Ok(SleepStage::Light),
            2 => Ok(SleepStage::Rem),
            3 => Ok(SleepStage::Awake),
            other => Err(ParseError::UnknownSleepStage(other)),
        }
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepStage::Deep => write!(f, "deep"),
            SleepStage::Light => write!(f, "light"),
            SleepStage::Rem => write!(f, "rem"),
            SleepStage::Awake => write!(f, "awake"),
        }
    }
}

/// One stage interval within a sleep session.
///
/// Segments are owned exclusively by their session; deleting the
/// session removes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepSegment {
    /// Segment start, epoch seconds.
    pub start_time: i64,
    /// Segment end, epoch seconds.
    pub end_time: i64,
    /// Segment duration in seconds.
    pub duration: i64,
    /// Sleep stage of this interval.
    pub stage: SleepStage,
}

impl SleepSegment {
    /// Create a segment spanning `[start_time, end_time]`.
    #[must_use]
    pub fn new(start_time: i64, end_time: i64, stage: SleepStage) -> Self {
        Self {
            start_time,
            end_time,
            duration: end_time - start_time,
            stage,
        }
    }
}

/// Session-level sleep summary as reported by the ring.
///
/// Per-stage second counts are device-reported and only approximately
/// equal to the sum of that stage's segment durations; the store does
/// not enforce the relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepSession {
    /// Nominal statistic time of the session, epoch seconds.
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
    /// Ingestion batch time, epoch seconds.
    pub batch_time: i64,
}

impl SleepSession {
    /// Device-reported seconds for a stage.
    #[must_use]
    pub fn stage_seconds(&self, stage: SleepStage) -> i64 {
        match stage {
            SleepStage::Deep => self.deep_seconds,
            SleepStage::Light => self.light_seconds,
            SleepStage::Rem => self.rem_seconds,
            SleepStage::Awake => self.awake_seconds,
        }
    }
}

/// Sum of segment durations for one stage.
#[must_use]
pub fn segment_stage_total(segments: &[SleepSegment], stage: SleepStage) -> i64 {
    segments
        .iter()
        .filter(|s| s.stage == stage)
        .map(|s| s.duration)
        .sum()
}

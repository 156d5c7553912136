//! ECG readings and the opaque waveform encoding.
//!
//! Waveforms are stored as a length-prefixed little-endian blob and
//! decoded only on explicit read: a `u32` sample count followed by
//! that many `i16` samples.

use core::fmt;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Classification assigned to an ECG reading by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DiagnosisCode {
    /// Normal sinus rhythm.
    Normal = 0,
    /// Heart rate below the expected resting range.
    Bradycardia = 1,
    /// Heart rate above the expected resting range.
    Tachycardia = 2,
    /// Irregular rhythm detected.
    IrregularRhythm = 3,
    /// Reading too noisy to classify.
    Inconclusive = 4,
}

impl DiagnosisCode {
    /// Stable code as stored in the ECG table.
    #[must_use]
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for DiagnosisCode {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DiagnosisCode::Normal),
            1 => Ok(DiagnosisCode::Bradycardia),
            2 => Ok(DiagnosisCode::Tachycardia),
            3 => Ok(DiagnosisCode::IrregularRhythm),
            4 => Ok(DiagnosisCode::Inconclusive),
            other => Err(ParseError::UnknownDiagnosis(other)),
        }
    }
}

impl fmt::Display for DiagnosisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosisCode::Normal => write!(f, "normal"),
            DiagnosisCode::Bradycardia => write!(f, "bradycardia"),
            DiagnosisCode::Tachycardia => write!(f, "tachycardia"),
            DiagnosisCode::IrregularRhythm => write!(f, "irregular rhythm"),
            DiagnosisCode::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// A single ECG reading with its full waveform.
///
/// Unlike metric samples, ECG readings are keyed by a formatted
/// timestamp string (`YYYY-MM-DD HH:MM:SS`), matching the device's
/// report format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcgReading {
    /// Formatted timestamp key.
    pub recorded_at: String,
    /// Raw waveform samples.
    pub waveform: Vec<i16>,
    /// Derived HRV index, 0-100.
    pub hrv_index: u8,
    /// Derived cardiac load index, 0-100.
    pub load_index: u8,
    /// Derived pressure index, 0-100.
    pub pressure_index: u8,
    /// Derived body index, 0-100.
    pub body_index: u8,
    /// Device classification.
    pub diagnosis: DiagnosisCode,
}

impl EcgReading {
    /// Encode this reading's waveform as the stored blob.
    #[must_use]
    pub fn encoded_waveform(&self) -> Vec<u8> {
        encode_waveform(&self.waveform)
    }
}

/// Encode a waveform as a length-prefixed LE blob.
#[must_use]
pub fn encode_waveform(samples: &[i16]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(4 + samples.len() * 2);
    buf.put_u32_le(samples.len() as u32);
    for &s in samples {
        buf.put_i16_le(s);
    }
    buf.to_vec()
}

/// Decode a waveform blob produced by [`encode_waveform`].
pub fn decode_waveform(mut data: &[u8]) -> ParseResult<Vec<i16>> {
    if data.remaining() < 4 {
        return Err(ParseError::InvalidData(format!(
            "Waveform blob requires 4-byte length prefix, got {} bytes",
            data.remaining()
        )));
    }
    let count = data.get_u32_le() as usize;
    if data.remaining() != count * 2 {
        return Err(ParseError::InvalidData(format!(
            "Waveform blob declares {} samples but carries {} payload bytes",
            count,
            data.remaining()
        )));
    }
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        samples.push(data.get_i16_le());
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_waveform() {
        let samples: Vec<i16> = vec![0, -120, 512, i16::MAX, i16::MIN];
        let blob = encode_waveform(&samples);
        assert_eq!(blob.len(), 4 + samples.len() * 2);
        assert_eq!(decode_waveform(&blob).unwrap(), samples);
    }

    #[test]
    fn test_decode_empty_waveform() {
        let blob = encode_waveform(&[]);
        assert!(decode_waveform(&blob).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_missing_prefix() {
        let err = decode_waveform(&[0x01, 0x00]).unwrap_err();
        assert!(err.to_string().contains("length prefix"));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let mut blob = encode_waveform(&[1, 2, 3]);
        blob.truncate(blob.len() - 1);
        assert!(decode_waveform(&blob).is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_count() {
        // Prefix claims far more samples than the payload carries; must
        // fail before allocating.
        let mut blob = Vec::new();
        blob.extend_from_slice(&u32::MAX.to_le_bytes());
        blob.extend_from_slice(&[0x00; 8]);
        assert!(decode_waveform(&blob).is_err());
    }

    #[test]
    fn test_diagnosis_code_round_trip() {
        for code in 0..=4u8 {
            let diag = DiagnosisCode::try_from(code).unwrap();
            assert_eq!(diag.code(), code);
        }
        assert!(DiagnosisCode::try_from(200).is_err());
    }
}

//! ECG reading storage.
//!
//! Waveforms go in as opaque length-prefixed blobs and stay encoded
//! until a caller asks for them; list queries never decode.

use rusqlite::{OptionalExtension, Row};
use tracing::info;

use pulsering_types::{DiagnosisCode, EcgReading};

use crate::error::Result;
use crate::models::StoredEcg;
use crate::store::{now_ts, Store};

pub(crate) fn ecg_from_row(row: &Row<'_>) -> rusqlite::Result<StoredEcg> {
    let diagnosis = DiagnosisCode::try_from(row.get::<_, i64>(7)? as u8).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    Ok(StoredEcg {
        user_id: row.get(0)?,
        recorded_at: row.get(1)?,
        waveform_blob: row.get(2)?,
        hrv_index: row.get::<_, i64>(3)? as u8,
        load_index: row.get::<_, i64>(4)? as u8,
        pressure_index: row.get::<_, i64>(5)? as u8,
        body_index: row.get::<_, i64>(6)? as u8,
        diagnosis,
        synced: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(crate) const ECG_COLUMNS: &str =
    "user_id, recorded_at, waveform, hrv_index, load_index, pressure_index, \
     body_index, diagnosis, synced, created_at";

// ECG operations
impl Store {
    /// Insert an ECG reading, encoding its waveform.
    ///
    /// Readings are keyed by their formatted timestamp; redelivery of a
    /// known key is ignored. Returns whether the reading was inserted.
    pub fn insert_ecg(&self, user_id: &str, reading: &EcgReading) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO ecg_readings
             (user_id, recorded_at, waveform, hrv_index, load_index, pressure_index,
              body_index, diagnosis, synced, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
            rusqlite::params![
                user_id,
                reading.recorded_at,
                reading.encoded_waveform(),
                reading.hrv_index,
                reading.load_index,
                reading.pressure_index,
                reading.body_index,
                reading.diagnosis.code(),
                now_ts(),
            ],
        )?;

        if inserted > 0 {
            info!(
                "Stored ECG reading {} for {} ({} samples)",
                reading.recorded_at,
                user_id,
                reading.waveform.len()
            );
        }
        Ok(inserted > 0)
    }

    /// Get one ECG reading by its timestamp key.
    pub fn get_ecg(&self, user_id: &str, recorded_at: &str) -> Result<Option<StoredEcg>> {
        let sql = format!(
            "SELECT {ECG_COLUMNS} FROM ecg_readings WHERE user_id = ? AND recorded_at = ?"
        );

        let reading = self
            .conn
            .query_row(&sql, rusqlite::params![user_id, recorded_at], ecg_from_row)
            .optional()?;

        Ok(reading)
    }

    /// List a user's ECG readings, newest first. Waveforms stay encoded.
    pub fn list_ecg(&self, user_id: &str) -> Result<Vec<StoredEcg>> {
        let sql = format!(
            "SELECT {ECG_COLUMNS} FROM ecg_readings WHERE user_id = ?
             ORDER BY recorded_at DESC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map([user_id], ecg_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }
}

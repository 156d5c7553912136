//! Sync watermark tracking.
//!
//! Every record carries a `synced` flag: "has the remote endpoint
//! acknowledged this record". The store only selects pending records
//! and flips flags on explicit acknowledgment - retry and backoff
//! policy belong to the sync driver, not here. Un-synced records are
//! never mutated or lost while a sync attempt is outstanding.

use tracing::debug;

use pulsering_types::MetricKind;

use crate::ecg::ECG_COLUMNS;
use crate::error::Result;
use crate::models::{StoredEcg, StoredSample, StoredSleepSession};
use crate::sleep::SESSION_COLUMNS;
use crate::store::{now_ts, sample_from_row, Store, SAMPLE_COLUMNS};

/// Build a `?, ?, ...` placeholder list.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// Sync state operations
impl Store {
    /// Never-synced samples for a (user, metric) pair, oldest first.
    ///
    /// FIFO order keeps replay fair when the driver applies a global
    /// cap across metric kinds.
    pub fn pending_samples(
        &self,
        user_id: &str,
        kind: MetricKind,
        limit: u32,
    ) -> Result<Vec<StoredSample>> {
        let sql = format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples
             WHERE user_id = ? AND metric = ? AND synced = 0
             ORDER BY timestamp ASC LIMIT ?"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let samples = stmt
            .query_map(
                rusqlite::params![user_id, kind.as_str(), limit],
                sample_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(samples)
    }

    /// Mark samples as acknowledged by the remote endpoint.
    ///
    /// Idempotent: already-synced and unknown ids are no-ops. Returns
    /// the number of records actually flipped.
    pub fn mark_samples_synced(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE samples SET synced = 1, updated_at = ?
             WHERE synced = 0 AND id IN ({})",
            placeholders(ids.len())
        );

        let now = now_ts();
        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
        params.push(&now);
        for id in ids {
            params.push(id);
        }

        let changed = self.conn.execute(&sql, params.as_slice())?;
        debug!("Marked {} of {} sample ids synced", changed, ids.len());
        Ok(changed)
    }

    /// Never-synced sleep sessions for a user, oldest first.
    pub fn pending_sessions(&self, user_id: &str, limit: u32) -> Result<Vec<StoredSleepSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sleep_sessions
             WHERE user_id = ? AND synced = 0
             ORDER BY start_time ASC LIMIT ?"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(rusqlite::params![user_id, limit], |row| {
                Ok(StoredSleepSession {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    statistic_time: row.get(2)?,
                    start_time: row.get(3)?,
                    end_time: row.get(4)?,
                    deep_seconds: row.get(5)?,
                    light_seconds: row.get(6)?,
                    rem_seconds: row.get(7)?,
                    awake_seconds: row.get(8)?,
                    total_seconds: row.get(9)?,
                    batch_time: row.get(10)?,
                    synced: row.get(11)?,
                    created_at: row.get(12)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Mark sleep sessions as acknowledged. Idempotent.
    pub fn mark_sessions_synced(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE sleep_sessions SET synced = 1 WHERE synced = 0 AND id IN ({})",
            placeholders(ids.len())
        );

        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let changed = self.conn.execute(&sql, params.as_slice())?;
        Ok(changed)
    }

    /// Never-synced ECG readings for a user, oldest first.
    pub fn pending_ecg(&self, user_id: &str, limit: u32) -> Result<Vec<StoredEcg>> {
        let sql = format!(
            "SELECT {ECG_COLUMNS} FROM ecg_readings
             WHERE user_id = ? AND synced = 0
             ORDER BY recorded_at ASC LIMIT ?"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(rusqlite::params![user_id, limit], crate::ecg::ecg_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Mark ECG readings as acknowledged, by timestamp key. Idempotent.
    pub fn mark_ecg_synced(&self, user_id: &str, recorded_ats: &[String]) -> Result<usize> {
        if recorded_ats.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE ecg_readings SET synced = 1
             WHERE synced = 0 AND user_id = ? AND recorded_at IN ({})",
            placeholders(recorded_ats.len())
        );

        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(recorded_ats.len() + 1);
        params.push(&user_id);
        for key in recorded_ats {
            params.push(key);
        }

        let changed = self.conn.execute(&sql, params.as_slice())?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsering_types::MetricSample;

    fn seed_samples(store: &Store) {
        let samples = vec![
            MetricSample::new(300, 64.0),
            MetricSample::new(100, 60.0),
            MetricSample::new(200, 62.0),
        ];
        store
            .insert_batch("u-1", MetricKind::HeartRate, &samples, 1_000)
            .unwrap();
    }

    #[test]
    fn test_pending_is_fifo_oldest_first() {
        let store = Store::open_in_memory().unwrap();
        seed_samples(&store);

        let pending = store
            .pending_samples("u-1", MetricKind::HeartRate, 10)
            .unwrap();
        assert_eq!(
            pending.iter().map(|s| s.timestamp).collect::<Vec<_>>(),
            vec![100, 200, 300]
        );
    }

    #[test]
    fn test_pending_respects_limit() {
        let store = Store::open_in_memory().unwrap();
        seed_samples(&store);

        let pending = store
            .pending_samples("u-1", MetricKind::HeartRate, 2)
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].timestamp, 100);
    }

    #[test]
    fn test_marked_records_never_reappear() {
        let store = Store::open_in_memory().unwrap();
        seed_samples(&store);

        let pending = store
            .pending_samples("u-1", MetricKind::HeartRate, 10)
            .unwrap();
        let acked: Vec<String> = pending[..2].iter().map(|s| s.id.clone()).collect();

        assert_eq!(store.mark_samples_synced(&acked).unwrap(), 2);

        let remaining = store
            .pending_samples("u-1", MetricKind::HeartRate, 10)
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, 300);
        assert!(remaining.iter().all(|s| !acked.contains(&s.id)));
    }

    #[test]
    fn test_mark_is_idempotent_and_tolerates_unknown_ids() {
        let store = Store::open_in_memory().unwrap();
        seed_samples(&store);

        let pending = store
            .pending_samples("u-1", MetricKind::HeartRate, 10)
            .unwrap();
        let ids: Vec<String> = pending.iter().map(|s| s.id.clone()).collect();

        assert_eq!(store.mark_samples_synced(&ids).unwrap(), 3);
        // Second mark is a no-op
        assert_eq!(store.mark_samples_synced(&ids).unwrap(), 0);
        // Unknown id is a no-op, not an error
        assert_eq!(
            store
                .mark_samples_synced(&["no-such-id".to_string()])
                .unwrap(),
            0
        );
        // Empty set is a no-op
        assert_eq!(store.mark_samples_synced(&[]).unwrap(), 0);
    }

    #[test]
    fn test_pending_sessions_and_mark() {
        let store = Store::open_in_memory().unwrap();
        let session = pulsering_types::SleepSession {
            statistic_time: 1_000,
            start_time: 1_000,
            end_time: 2_000,
            deep_seconds: 0,
            light_seconds: 1_000,
            rem_seconds: 0,
            awake_seconds: 0,
            total_seconds: 1_000,
            batch_time: 5_000,
        };
        let id = store.insert_session("u-1", &session, &[]).unwrap();

        let pending = store.pending_sessions("u-1", 10).unwrap();
        assert_eq!(pending.len(), 1);

        assert_eq!(store.mark_sessions_synced(&[id]).unwrap(), 1);
        assert!(store.pending_sessions("u-1", 10).unwrap().is_empty());
    }

    #[test]
    fn test_pending_ecg_and_mark_scoped_to_user() {
        let store = Store::open_in_memory().unwrap();
        let reading = pulsering_types::EcgReading {
            recorded_at: "2023-11-14 07:31:02".to_string(),
            waveform: vec![1, 2, 3],
            hrv_index: 50,
            load_index: 50,
            pressure_index: 50,
            body_index: 50,
            diagnosis: pulsering_types::DiagnosisCode::Normal,
        };
        store.insert_ecg("u-1", &reading).unwrap();
        store.insert_ecg("u-2", &reading).unwrap();

        let key = vec![reading.recorded_at.clone()];
        assert_eq!(store.mark_ecg_synced("u-1", &key).unwrap(), 1);

        assert!(store.pending_ecg("u-1", 10).unwrap().is_empty());
        // Same key for another user stays pending
        assert_eq!(store.pending_ecg("u-2", 10).unwrap().len(), 1);
    }
}

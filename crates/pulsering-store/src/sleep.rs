//! Sleep session storage.
//!
//! Sessions own their stage segments (composition): a session and its
//! segments persist or vanish together, and deleting a session cascades
//! to every segment it owns.

use rusqlite::Row;
use tracing::info;

use pulsering_types::{SleepSegment, SleepSession};

use crate::error::Result;
use crate::models::{StoredSegment, StoredSleepSession};
use crate::store::{now_ts, stage_from_row, Store};

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSleepSession> {
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
}

pub(crate) const SESSION_COLUMNS: &str =
    "id, user_id, statistic_time, start_time, end_time, deep_seconds, light_seconds, \
     rem_seconds, awake_seconds, total_seconds, batch_time, synced, created_at";

// Sleep session operations
impl Store {
    /// Insert a session together with its owned segments.
    ///
    /// Transactional: either the session and every segment persist, or
    /// nothing does. Returns the generated session id.
    pub fn insert_session(
        &self,
        user_id: &str,
        session: &SleepSession,
        segments: &[SleepSegment],
    ) -> Result<String> {
        let tx = self.conn.unchecked_transaction()?;
        let id = uuid::Uuid::new_v4().to_string();

        tx.execute(
            "INSERT INTO sleep_sessions
             (id, user_id, statistic_time, start_time, end_time, deep_seconds,
              light_seconds, rem_seconds, awake_seconds, total_seconds, batch_time,
              synced, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12)",
            rusqlite::params![
                id,
                user_id,
                session.statistic_time,
                session.start_time,
                session.end_time,
                session.deep_seconds,
                session.light_seconds,
                session.rem_seconds,
                session.awake_seconds,
                session.total_seconds,
                session.batch_time,
                now_ts(),
            ],
        )?;

        for segment in segments {
            tx.execute(
                "INSERT INTO sleep_segments (session_id, start_time, end_time, duration, stage)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id,
                    segment.start_time,
                    segment.end_time,
                    segment.duration,
                    segment.stage.code(),
                ],
            )?;
        }

        tx.commit()?;

        info!(
            "Stored sleep session {} for {} with {} segments",
            id,
            user_id,
            segments.len()
        );
        Ok(id)
    }

    /// Delete a session, cascading to its segments.
    ///
    /// Returns whether a session was actually removed. No orphan
    /// segments may survive the delete.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sleep_sessions WHERE id = ?", [id])?;
        Ok(removed > 0)
    }

    /// Query sessions whose start falls in `[start, end]`, ascending by
    /// start time.
    pub fn query_sessions(
        &self,
        user_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<StoredSleepSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sleep_sessions
             WHERE user_id = ? AND start_time >= ? AND start_time <= ?
             ORDER BY start_time ASC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(rusqlite::params![user_id, start, end], session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Segments owned by a session, ascending by start time.
    pub fn session_segments(&self, session_id: &str) -> Result<Vec<StoredSegment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, start_time, end_time, duration, stage
             FROM sleep_segments WHERE session_id = ? ORDER BY start_time ASC",
        )?;

        let segments = stmt
            .query_map([session_id], |row| {
                Ok(StoredSegment {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    start_time: row.get(2)?,
                    end_time: row.get(3)?,
                    duration: row.get(4)?,
                    stage: stage_from_row(row, 5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsering_types::SleepStage;

    fn session(start: i64) -> SleepSession {
        SleepSession {
            statistic_time: start,
            start_time: start,
            end_time: start + 28_800,
            deep_seconds: 7_200,
            light_seconds: 14_400,
            rem_seconds: 5_400,
            awake_seconds: 1_800,
            total_seconds: 28_800,
            batch_time: start + 30_000,
        }
    }

    fn segments(start: i64) -> Vec<SleepSegment> {
        vec![
            SleepSegment::new(start, start + 7_200, SleepStage::Deep),
            SleepSegment::new(start + 7_200, start + 21_600, SleepStage::Light),
        ]
    }

    #[test]
    fn test_insert_and_query_session() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_session("u-1", &session(1_000), &segments(1_000))
            .unwrap();

        let sessions = store.query_sessions("u-1", 0, 10_000).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].deep_seconds, 7_200);

        let segs = store.session_segments(&id).unwrap();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].stage, SleepStage::Deep);
        assert_eq!(segs[1].stage, SleepStage::Light);
    }

    #[test]
    fn test_delete_session_cascades() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_session("u-1", &session(1_000), &segments(1_000))
            .unwrap();
        assert_eq!(store.session_segments(&id).unwrap().len(), 2);

        assert!(store.delete_session(&id).unwrap());

        // Zero orphan segments
        assert!(store.session_segments(&id).unwrap().is_empty());
        let orphans: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM sleep_segments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_delete_unknown_session_is_noop() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.delete_session("no-such-id").unwrap());
    }

    #[test]
    fn test_query_sessions_range_and_order() {
        let store = Store::open_in_memory().unwrap();
        store.insert_session("u-1", &session(50_000), &[]).unwrap();
        store.insert_session("u-1", &session(10_000), &[]).unwrap();
        store.insert_session("u-2", &session(10_000), &[]).unwrap();

        let sessions = store.query_sessions("u-1", 0, 100_000).unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].start_time < sessions[1].start_time);

        let narrowed = store.query_sessions("u-1", 0, 20_000).unwrap();
        assert_eq!(narrowed.len(), 1);
    }
}

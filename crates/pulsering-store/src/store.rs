//! Main store implementation.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use rusqlite::{Connection, Row};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use pulsering_types::{MetricKind, MetricSample, SleepStage};

use crate::aggregate::{day_key, recompute_day_tx};
use crate::error::{Error, Result};
use crate::models::{IngestOutcome, StoredSample};
use crate::queries::SampleQuery;
use crate::schema;

/// SQLite-based store for ring health data.
///
/// One store handle owns one connection; collaborators receive the
/// handle explicitly rather than going through process-wide state.
/// Each write operation is a single transaction - the store, not its
/// callers, owns atomicity.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        // Foreign keys for segment cascade, WAL for concurrent readers
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

/// Current epoch time in seconds.
pub(crate) fn now_ts() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Column list matching [`sample_from_row`].
pub(crate) const SAMPLE_COLUMNS: &str =
    "id, user_id, metric, timestamp, value, secondary, batch_time, synced, created_at, updated_at";

/// Map a text column back to a typed value via its `TryFrom`/`FromStr` impl.
fn column_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn metric_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<MetricKind> {
    row.get::<_, String>(idx)?
        .parse()
        .map_err(|e| column_error(idx, e))
}

pub(crate) fn stage_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<SleepStage> {
    SleepStage::try_from(row.get::<_, i64>(idx)? as u8).map_err(|e| column_error(idx, e))
}

pub(crate) fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSample> {
    Ok(StoredSample {
        id: row.get(0)?,
        user_id: row.get(1)?,
        metric: metric_from_row(row, 2)?,
        timestamp: row.get(3)?,
        value: row.get(4)?,
        secondary: row.get(5)?,
        batch_time: row.get(6)?,
        synced: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

// Sample operations
impl Store {
    /// Insert a device batch of raw samples.
    ///
    /// Validation rejects malformed samples per-record without aborting
    /// the rest of the batch; timestamps already present for the
    /// (user, metric) pair are skipped, keeping the first-delivered
    /// value. Daily summaries for every touched calendar day are
    /// recomputed inside the same transaction, so redelivering an
    /// identical batch is a no-op end to end.
    pub fn insert_batch(
        &self,
        user_id: &str,
        kind: MetricKind,
        samples: &[MetricSample],
        batch_time: i64,
    ) -> Result<IngestOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_ts();

        let mut outcome = IngestOutcome::default();
        let mut touched_days: BTreeSet<String> = BTreeSet::new();

        for sample in samples {
            if let Err(reason) = sample.validate(kind) {
                warn!("Rejected {} sample at {}: {}", kind, sample.timestamp, reason);
                outcome.rejected += 1;
                continue;
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO samples
                 (id, user_id, metric, timestamp, value, secondary, batch_time,
                  synced, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                rusqlite::params![
                    uuid::Uuid::new_v4().to_string(),
                    user_id,
                    kind.as_str(),
                    sample.timestamp,
                    sample.value,
                    sample.secondary,
                    batch_time,
                    now,
                ],
            )?;

            if inserted == 0 {
                outcome.duplicates += 1;
            } else {
                outcome.inserted += 1;
                touched_days.insert(day_key(sample.timestamp)?);
            }
        }

        for day in &touched_days {
            recompute_day_tx(&tx, user_id, kind, day)?;
        }

        tx.commit()?;

        info!(
            "Ingested {} batch for {}: {} inserted, {} duplicate, {} rejected",
            kind, user_id, outcome.inserted, outcome.duplicates, outcome.rejected
        );
        Ok(outcome)
    }

    /// Query samples with filters.
    pub fn query_samples(&self, query: &SampleQuery) -> Result<Vec<StoredSample>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let samples = stmt
            .query_map(params_ref.as_slice(), sample_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(samples)
    }

    /// Get the sample with the highest measurement timestamp.
    pub fn latest_sample(&self, user_id: &str, kind: MetricKind) -> Result<Option<StoredSample>> {
        let query = SampleQuery::new().user(user_id).metric(kind).limit(1);
        let mut samples = self.query_samples(&query)?;
        Ok(samples.pop())
    }

    /// Get all samples belonging to the most recent ingestion batch.
    ///
    /// Returns every row sharing the maximum `batch_time` for the
    /// (user, metric) pair, ascending by timestamp - "what did the last
    /// sync bring in", as opposed to the latest single measurement.
    pub fn latest_batch(&self, user_id: &str, kind: MetricKind) -> Result<Vec<StoredSample>> {
        let sql = format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples
             WHERE user_id = ?1 AND metric = ?2
               AND batch_time = (SELECT MAX(batch_time) FROM samples
                                 WHERE user_id = ?1 AND metric = ?2)
             ORDER BY timestamp ASC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let samples = stmt
            .query_map(rusqlite::params![user_id, kind.as_str()], sample_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(samples)
    }

    /// All measurement timestamps already present for a (user, metric)
    /// pair.
    ///
    /// Used by the device integration to pre-filter a payload before
    /// calling [`insert_batch`](Store::insert_batch).
    pub fn existing_timestamps(&self, user_id: &str, kind: MetricKind) -> Result<HashSet<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT timestamp FROM samples WHERE user_id = ? AND metric = ?")?;

        let timestamps = stmt
            .query_map(rusqlite::params![user_id, kind.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<i64>, _>>()?;

        Ok(timestamps)
    }

    /// Count stored samples for a (user, metric) pair.
    pub fn count_samples(&self, user_id: &str, kind: MetricKind) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM samples WHERE user_id = ? AND metric = ?",
            rusqlite::params![user_id, kind.as_str()],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Bulk-purge one metric for a user, including its daily summaries.
    ///
    /// Returns the number of raw samples removed. Used for resets and
    /// testing; normal operation never deletes samples.
    pub fn purge_metric(&self, user_id: &str, kind: MetricKind) -> Result<u64> {
        let tx = self.conn.unchecked_transaction()?;

        let removed = tx.execute(
            "DELETE FROM samples WHERE user_id = ? AND metric = ?",
            rusqlite::params![user_id, kind.as_str()],
        )?;
        tx.execute(
            "DELETE FROM daily_summaries WHERE user_id = ? AND metric = ?",
            rusqlite::params![user_id, kind.as_str()],
        )?;

        tx.commit()?;

        info!("Purged {} {} samples for {}", removed, kind, user_id);
        Ok(removed as u64)
    }

    /// Bulk-purge everything: samples, summaries, sleep data, ECG.
    pub fn purge_all(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM samples", [])?;
        tx.execute("DELETE FROM daily_summaries", [])?;
        tx.execute("DELETE FROM sleep_sessions", [])?;
        tx.execute("DELETE FROM ecg_readings", [])?;

        tx.commit()?;

        info!("Purged all stored data");
        Ok(())
    }
}

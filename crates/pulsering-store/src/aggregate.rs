//! Daily aggregate rollups.
//!
//! Summaries are derived state: whenever new raw samples land in a
//! calendar day, the whole day is recomputed from the raw rows rather
//! than patched incrementally. That keeps the summary consistent with
//! current raw data under out-of-order and late-arriving samples.

use rusqlite::{Connection, OptionalExtension, Row};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pulsering_types::MetricKind;

use crate::error::{Error, Result};
use crate::models::DailySummary;
use crate::store::{metric_from_row, now_ts, Store};

/// Calendar-day key (UTC) for a measurement timestamp, `YYYY-MM-DD`.
pub fn day_key(timestamp: i64) -> Result<String> {
    let fmt = format_description!("[year]-[month]-[day]");
    let date = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| Error::InvalidTimestamp(timestamp))?
        .date();
    date.format(&fmt)
        .map_err(|_| Error::InvalidTimestamp(timestamp))
}

/// Epoch-second bounds `[start, end)` of a calendar-day key.
pub fn day_bounds(day: &str) -> Result<(i64, i64)> {
    let fmt = format_description!("[year]-[month]-[day]");
    let date = Date::parse(day, &fmt).map_err(|_| Error::InvalidDay(day.to_string()))?;
    let start = date.midnight().assume_utc().unix_timestamp();
    Ok((start, start + 86_400))
}

/// Recompute one (user, metric, day) summary inside an open transaction.
///
/// Full replace: the existing row is overwritten from current raw
/// samples, or deleted when the day is empty - absence is the "no
/// data" representation and is distinct from a zero-valued day.
pub(crate) fn recompute_day_tx(
    conn: &Connection,
    user_id: &str,
    kind: MetricKind,
    day: &str,
) -> Result<()> {
    let (start, end) = day_bounds(day)?;

    let (count, min, max, avg, sum, sec_min, sec_max, sec_avg) = conn.query_row(
        "SELECT COUNT(*), MIN(value), MAX(value), AVG(value), SUM(value),
                MIN(secondary), MAX(secondary), AVG(secondary)
         FROM samples
         WHERE user_id = ?1 AND metric = ?2 AND timestamp >= ?3 AND timestamp < ?4",
        rusqlite::params![user_id, kind.as_str(), start, end],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<f64>>(6)?,
                row.get::<_, Option<f64>>(7)?,
            ))
        },
    )?;

    if count == 0 {
        conn.execute(
            "DELETE FROM daily_summaries WHERE user_id = ? AND metric = ? AND day = ?",
            rusqlite::params![user_id, kind.as_str(), day],
        )?;
        debug!("Cleared empty {} summary for {} on {}", kind, user_id, day);
        return Ok(());
    }

    conn.execute(
        "INSERT INTO daily_summaries
         (user_id, metric, day, sample_count, min_value, max_value, avg_value,
          sum_value, secondary_min, secondary_max, secondary_avg, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(user_id, metric, day) DO UPDATE SET
            sample_count = excluded.sample_count,
            min_value = excluded.min_value,
            max_value = excluded.max_value,
            avg_value = excluded.avg_value,
            sum_value = excluded.sum_value,
            secondary_min = excluded.secondary_min,
            secondary_max = excluded.secondary_max,
            secondary_avg = excluded.secondary_avg,
            last_updated = excluded.last_updated",
        rusqlite::params![
            user_id,
            kind.as_str(),
            day,
            count,
            min.unwrap_or_default(),
            max.unwrap_or_default(),
            avg.unwrap_or_default(),
            sum.unwrap_or_default(),
            sec_min,
            sec_max,
            sec_avg,
            now_ts(),
        ],
    )?;

    Ok(())
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<DailySummary> {
    Ok(DailySummary {
        user_id: row.get(0)?,
        metric: metric_from_row(row, 1)?,
        day: row.get(2)?,
        sample_count: row.get::<_, i64>(3)? as u64,
        min_value: row.get(4)?,
        max_value: row.get(5)?,
        avg_value: row.get(6)?,
        sum_value: row.get(7)?,
        secondary_min: row.get(8)?,
        secondary_max: row.get(9)?,
        secondary_avg: row.get(10)?,
        last_updated: row.get(11)?,
    })
}

const SUMMARY_COLUMNS: &str = "user_id, metric, day, sample_count, min_value, max_value, \
     avg_value, sum_value, secondary_min, secondary_max, secondary_avg, last_updated";

// Daily aggregate operations
impl Store {
    /// Recompute the summary for a single (user, metric, day).
    ///
    /// Ingestion already does this for touched days; this entry point
    /// exists for backfill and repair.
    pub fn recompute_day(&self, user_id: &str, kind: MetricKind, day: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        recompute_day_tx(&tx, user_id, kind, day)?;
        tx.commit()?;
        Ok(())
    }

    /// Recompute summaries for a set of days in one transaction.
    ///
    /// Cancellable: a cancel observed between days rolls the whole
    /// transaction back and returns [`Error::Cancelled`] - the store is
    /// never left partially recomputed. Returns the number of days
    /// processed on success.
    pub fn recompute_days(
        &self,
        user_id: &str,
        kind: MetricKind,
        days: &[String],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        for day in days {
            if cancel.is_cancelled() {
                tx.rollback()?;
                info!("Recompute of {} {} days cancelled, rolled back", days.len(), kind);
                return Err(Error::Cancelled);
            }
            recompute_day_tx(&tx, user_id, kind, day)?;
        }

        tx.commit()?;
        Ok(days.len())
    }

    /// Get the summary for a single day, if the day has data.
    pub fn get_daily(
        &self,
        user_id: &str,
        kind: MetricKind,
        day: &str,
    ) -> Result<Option<DailySummary>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summaries
             WHERE user_id = ? AND metric = ? AND day = ?"
        );

        let summary = self
            .conn
            .query_row(
                &sql,
                rusqlite::params![user_id, kind.as_str(), day],
                summary_from_row,
            )
            .optional()?;

        Ok(summary)
    }

    /// Query summaries over an inclusive day range, ascending by day.
    pub fn query_daily(
        &self,
        user_id: &str,
        kind: MetricKind,
        from_day: &str,
        to_day: &str,
    ) -> Result<Vec<DailySummary>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summaries
             WHERE user_id = ? AND metric = ? AND day >= ? AND day <= ?
             ORDER BY day ASC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(
                rusqlite::params![user_id, kind.as_str(), from_day, to_day],
                summary_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }
}

//! Query builder for stored metric samples.
//!
//! [`SampleQuery`] follows the builder pattern for filtering and
//! paginating raw samples. Re-issuing the same query always yields the
//! same result set absent new inserts.
//!
//! # Example
//!
//! ```
//! use pulsering_store::{SampleQuery, Store};
//! use pulsering_types::MetricKind;
//!
//! let store = Store::open_in_memory()?;
//!
//! // Last night's heart-rate samples, chronological
//! let query = SampleQuery::new()
//!     .user("u-1")
//!     .metric(MetricKind::HeartRate)
//!     .since(1_700_000_000)
//!     .until(1_700_028_800)
//!     .oldest_first();
//!
//! let samples = store.query_samples(&query)?;
//! # Ok::<(), pulsering_store::Error>(())
//! ```

use pulsering_types::MetricKind;

/// Fluent query builder for raw metric samples.
///
/// All filter methods are optional and can be chained in any order.
/// By default results are ordered by `timestamp` descending (newest
/// first); range queries for charting usually want [`oldest_first`].
///
/// [`oldest_first`]: SampleQuery::oldest_first
#[derive(Debug, Default, Clone)]
pub struct SampleQuery {
    /// Filter by user id.
    pub user_id: Option<String>,
    /// Filter by metric kind.
    pub metric: Option<MetricKind>,
    /// Include only samples measured at or after this epoch time.
    pub since: Option<i64>,
    /// Include only samples measured at or before this epoch time.
    pub until: Option<i64>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending (newest first). Default: true.
    pub newest_first: bool,
}

impl SampleQuery {
    /// Create a new query with default settings.
    ///
    /// Default behavior:
    /// - No user or metric filter
    /// - No time range filter
    /// - No limit (all matching records)
    /// - Ordered by newest first
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by user id.
    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Filter by metric kind.
    pub fn metric(mut self, kind: MetricKind) -> Self {
        self.metric = Some(kind);
        self
    }

    /// Filter to samples measured at or after this epoch time.
    pub fn since(mut self, timestamp: i64) -> Self {
        self.since = Some(timestamp);
        self
    }

    /// Filter to samples measured at or before this epoch time.
    pub fn until(mut self, timestamp: i64) -> Self {
        self.until = Some(timestamp);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    ///
    /// Use with `limit()` for pagination.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results by oldest first (ascending by `timestamp`).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref user_id) = self.user_id {
            conditions.push("user_id = ?");
            params.push(Box::new(user_id.clone()));
        }

        if let Some(metric) = self.metric {
            conditions.push("metric = ?");
            params.push(Box::new(metric.as_str()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(until));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, user_id, metric, timestamp, value, secondary, batch_time, \
             synced, created_at, updated_at \
             FROM samples {} ORDER BY timestamp {}",
            where_clause, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

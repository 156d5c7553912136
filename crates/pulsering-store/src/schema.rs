//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        // Fresh database - create all tables
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- Raw metric samples, one generic table for all vital kinds.
        -- timestamp is the natural key within (user, metric); redelivered
        -- batches hit the UNIQUE constraint and are ignored.
        CREATE TABLE IF NOT EXISTS samples (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            metric TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            value REAL NOT NULL,
            secondary REAL,
            batch_time INTEGER NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(user_id, metric, timestamp)
        );
        CREATE INDEX IF NOT EXISTS idx_samples_metric_time
            ON samples(user_id, metric, timestamp);
        CREATE INDEX IF NOT EXISTS idx_samples_pending
            ON samples(user_id, metric, synced, timestamp);
        CREATE INDEX IF NOT EXISTS idx_samples_batch
            ON samples(user_id, metric, batch_time);

        -- Daily rollups, fully recomputed from raw samples. An empty day
        -- has no row; absence is the "no data" representation.
        CREATE TABLE IF NOT EXISTS daily_summaries (
            user_id TEXT NOT NULL,
            metric TEXT NOT NULL,
            day TEXT NOT NULL,
            sample_count INTEGER NOT NULL,
            min_value REAL NOT NULL,
            max_value REAL NOT NULL,
            avg_value REAL NOT NULL,
            sum_value REAL NOT NULL,
            secondary_min REAL,
            secondary_max REAL,
            secondary_avg REAL,
            last_updated INTEGER NOT NULL,
            PRIMARY KEY (user_id, metric, day)
        );

        -- Sleep sessions and their owned stage segments
        CREATE TABLE IF NOT EXISTS sleep_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            statistic_time INTEGER NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            deep_seconds INTEGER NOT NULL,
            light_seconds INTEGER NOT NULL,
            rem_seconds INTEGER NOT NULL,
            awake_seconds INTEGER NOT NULL,
            total_seconds INTEGER NOT NULL,
            batch_time INTEGER NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user_time
            ON sleep_sessions(user_id, start_time);

        CREATE TABLE IF NOT EXISTS sleep_segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES sleep_sessions(id) ON DELETE CASCADE,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            duration INTEGER NOT NULL,
            stage INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_segments_session
            ON sleep_segments(session_id);

        -- ECG readings, keyed by the device's formatted timestamp string.
        -- The waveform is an opaque length-prefixed blob decoded on read.
        CREATE TABLE IF NOT EXISTS ecg_readings (
            user_id TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            waveform BLOB NOT NULL,
            hrv_index INTEGER NOT NULL,
            load_index INTEGER NOT NULL,
            pressure_index INTEGER NOT NULL,
            body_index INTEGER NOT NULL,
            diagnosis INTEGER NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, recorded_at)
        );
        "#,
    )?;

    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    // Add future migrations here
    // if old_version < 2 { migrate_to_v2(conn)?; }

    let _ = old_version;
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"samples".to_string()));
        assert!(tables.contains(&"daily_summaries".to_string()));
        assert!(tables.contains(&"sleep_sessions".to_string()));
        assert!(tables.contains(&"sleep_segments".to_string()));
        assert!(tables.contains(&"ecg_readings".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_schema_version_tracking() {
        let conn = Connection::open_in_memory().unwrap();

        // Fresh database should have version 0
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        // After initialization, should have current version
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}

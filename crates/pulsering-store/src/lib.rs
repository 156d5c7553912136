//! Embedded time-series store for pulsering health data.
//!
//! This crate provides SQLite-based storage for ring biometrics,
//! enabling offline access, deduplicated batch ingestion, and
//! efficient queries.
//!
//! # Features
//!
//! - One generic sample table for all vital-sign kinds, driven by the
//!   kind's schema descriptor (no per-type store code)
//! - Idempotent batch ingestion with per-record validation and
//!   duplicate-timestamp dedup
//! - Daily summaries, fully recomputed for every touched day
//! - Sleep sessions with cascading stage segments
//! - ECG readings with lazily decoded waveform blobs
//! - Per-record sync watermarks for replay to a remote endpoint
//!
//! # Example
//!
//! ```no_run
//! use pulsering_store::{SampleQuery, Store};
//! use pulsering_types::{MetricKind, MetricSample};
//!
//! let store = Store::open_default()?;
//!
//! let batch = vec![MetricSample::new(1_700_000_000, 62.0)];
//! let outcome = store.insert_batch("u-1", MetricKind::HeartRate, &batch, 1_700_000_100)?;
//! println!("inserted {}", outcome.inserted);
//!
//! let query = SampleQuery::new()
//!     .user("u-1")
//!     .metric(MetricKind::HeartRate)
//!     .limit(10);
//! let samples = store.query_samples(&query)?;
//! # Ok::<(), pulsering_store::Error>(())
//! ```

mod aggregate;
mod ecg;
mod error;
mod models;
mod queries;
mod schema;
mod sleep;
mod store;
mod sync;

pub use aggregate::{day_bounds, day_key};
pub use error::{Error, Result};
pub use models::{
    DailySummary, IngestOutcome, StoredEcg, StoredSample, StoredSegment, StoredSleepSession,
};
pub use queries::SampleQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/pulsering/data.db`
/// - macOS: `~/Library/Application Support/pulsering/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\pulsering\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("pulsering")
        .join("data.db")
}

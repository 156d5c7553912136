//! Remote sync driver for the pulsering store.
//!
//! Sits between the local store and the backend: selects never-synced
//! records oldest-first, uploads them through the [`RemoteEndpoint`]
//! seam, and marks exactly the acknowledged subset. Retry, backoff,
//! and scheduling policy belong to the caller; a failed or partial
//! pass simply leaves records pending for the next one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//! use pulsering_store::Store;
//! use pulsering_sync::Pusher;
//! # use pulsering_sync::{EndpointError, RemoteEndpoint};
//! # use pulsering_store::{StoredEcg, StoredSample, StoredSleepSession};
//! # use pulsering_types::MetricKind;
//! # struct Backend;
//! # #[async_trait::async_trait]
//! # impl RemoteEndpoint for Backend {
//! #     async fn upload_samples(&self, _: MetricKind, _: &[StoredSample]) -> Result<Vec<String>, EndpointError> { Ok(vec![]) }
//! #     async fn upload_sessions(&self, _: &[StoredSleepSession]) -> Result<Vec<String>, EndpointError> { Ok(vec![]) }
//! #     async fn upload_ecg(&self, _: &[StoredEcg]) -> Result<Vec<String>, EndpointError> { Ok(vec![]) }
//! # }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(Mutex::new(Store::open_default()?));
//! let pusher = Pusher::new(store, Backend);
//! let report = pusher.push_all("u-1").await?;
//! println!("{} acknowledged", report.acknowledged);
//! # Ok(())
//! # }
//! ```

mod endpoint;
mod pusher;

pub use endpoint::{EndpointError, RemoteEndpoint};
pub use pusher::{PushError, PushReport, Pusher, DEFAULT_CHUNK_SIZE};

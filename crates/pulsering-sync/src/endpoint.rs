//! The remote upload seam.

use async_trait::async_trait;

use pulsering_store::{StoredEcg, StoredSample, StoredSleepSession};
use pulsering_types::MetricKind;

/// Errors reported by a remote endpoint implementation.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Endpoint could not be reached. Records stay pending and are
    /// replayed on the next cycle.
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    /// Endpoint refused the upload.
    #[error("Endpoint rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// A remote sync endpoint accepting batched uploads.
///
/// Implementations return the ids the backend actually acknowledged;
/// on partial acknowledgment the driver marks only that subset synced.
/// Transport, authentication, timeout, and retry policy all live
/// behind this trait.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// Upload a chunk of metric samples; return acknowledged record ids.
    async fn upload_samples(
        &self,
        kind: MetricKind,
        batch: &[StoredSample],
    ) -> Result<Vec<String>, EndpointError>;

    /// Upload a chunk of sleep sessions; return acknowledged session ids.
    async fn upload_sessions(
        &self,
        batch: &[StoredSleepSession],
    ) -> Result<Vec<String>, EndpointError>;

    /// Upload a chunk of ECG readings; return acknowledged timestamp keys.
    async fn upload_ecg(&self, batch: &[StoredEcg]) -> Result<Vec<String>, EndpointError>;
}

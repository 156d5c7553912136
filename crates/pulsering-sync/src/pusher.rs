//! Single-pass sync driver.
//!
//! The pusher drains never-synced records from the store in chunks,
//! hands them to the remote endpoint, and marks exactly the
//! acknowledged subset. One pass, no retries, no backoff: an endpoint
//! failure or partial acknowledgment leaves the remainder pending for
//! the next cycle, and pending records are never mutated by a failed
//! attempt.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pulsering_store::Store;
use pulsering_types::MetricKind;

use crate::endpoint::{EndpointError, RemoteEndpoint};

/// Default number of records uploaded per endpoint call.
pub const DEFAULT_CHUNK_SIZE: u32 = 100;

/// Errors that can occur while driving a sync pass.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Local store failure.
    #[error("Store error: {0}")]
    Store(#[from] pulsering_store::Error),

    /// Remote endpoint failure. Unacknowledged records stay pending.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Records handed to the endpoint.
    pub uploaded: usize,
    /// Records the endpoint acknowledged and the store marked synced.
    pub acknowledged: usize,
}

impl PushReport {
    fn absorb(&mut self, other: PushReport) {
        self.uploaded += other.uploaded;
        self.acknowledged += other.acknowledged;
    }
}

/// Drives pending records from a store to a remote endpoint.
pub struct Pusher<E> {
    store: Arc<Mutex<Store>>,
    endpoint: E,
    chunk_size: u32,
}

impl<E: RemoteEndpoint> Pusher<E> {
    /// Create a pusher with the default chunk size.
    pub fn new(store: Arc<Mutex<Store>>, endpoint: E) -> Self {
        Self {
            store,
            endpoint,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the per-upload chunk size.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Push pending samples of one metric kind.
    pub async fn push_metric(
        &self,
        user_id: &str,
        kind: MetricKind,
    ) -> Result<PushReport, PushError> {
        let mut report = PushReport::default();

        loop {
            let pending = {
                let store = self.store.lock().await;
                store.pending_samples(user_id, kind, self.chunk_size)?
            };
            if pending.is_empty() {
                break;
            }

            debug!("Uploading {} pending {} samples", pending.len(), kind);
            let acked = self.endpoint.upload_samples(kind, &pending).await?;

            let marked = {
                let store = self.store.lock().await;
                store.mark_samples_synced(&acked)?
            };
            report.uploaded += pending.len();
            report.acknowledged += marked;

            // Keep draining only while the store records a full chunk as
            // synced; anything less (partial ack, unknown ids) leaves the
            // remainder for the next cycle instead of re-offering it in a
            // loop that never advances.
            if marked < pending.len() {
                warn!(
                    "Endpoint acknowledged {} of {} {} samples, leaving rest pending",
                    marked,
                    pending.len(),
                    kind
                );
                break;
            }
        }

        Ok(report)
    }

    /// Push pending sleep sessions.
    pub async fn push_sleep(&self, user_id: &str) -> Result<PushReport, PushError> {
        let mut report = PushReport::default();

        loop {
            let pending = {
                let store = self.store.lock().await;
                store.pending_sessions(user_id, self.chunk_size)?
            };
            if pending.is_empty() {
                break;
            }

            let acked = self.endpoint.upload_sessions(&pending).await?;
            let marked = {
                let store = self.store.lock().await;
                store.mark_sessions_synced(&acked)?
            };
            report.uploaded += pending.len();
            report.acknowledged += marked;

            if marked < pending.len() {
                break;
            }
        }

        Ok(report)
    }

    /// Push pending ECG readings.
    pub async fn push_ecg(&self, user_id: &str) -> Result<PushReport, PushError> {
        let mut report = PushReport::default();

        loop {
            let pending = {
                let store = self.store.lock().await;
                store.pending_ecg(user_id, self.chunk_size)?
            };
            if pending.is_empty() {
                break;
            }

            let acked = self.endpoint.upload_ecg(&pending).await?;
            let marked = {
                let store = self.store.lock().await;
                store.mark_ecg_synced(user_id, &acked)?
            };
            report.uploaded += pending.len();
            report.acknowledged += marked;

            if marked < pending.len() {
                break;
            }
        }

        Ok(report)
    }

    /// Push everything pending for a user: every metric kind, then
    /// sleep sessions, then ECG readings.
    pub async fn push_all(&self, user_id: &str) -> Result<PushReport, PushError> {
        let mut report = PushReport::default();

        for kind in MetricKind::ALL {
            report.absorb(self.push_metric(user_id, kind).await?);
        }
        report.absorb(self.push_sleep(user_id).await?);
        report.absorb(self.push_ecg(user_id).await?);

        info!(
            "Sync pass for {}: {} uploaded, {} acknowledged",
            user_id, report.uploaded, report.acknowledged
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pulsering_store::{StoredEcg, StoredSample, StoredSleepSession};
    use pulsering_types::{DiagnosisCode, EcgReading, MetricSample, SleepSession};

    /// Test double standing in for the REST backend.
    struct MockEndpoint {
        /// Acknowledge at most this many records per upload call.
        ack_per_call: usize,
        /// Fail every call when set.
        fail: bool,
        /// Acknowledge with ids the store has never issued.
        unknown_ids: bool,
        calls: AtomicUsize,
    }

    impl MockEndpoint {
        fn ack_all() -> Self {
            Self {
                ack_per_call: usize::MAX,
                fail: false,
                unknown_ids: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn ack_first(n: usize) -> Self {
            Self {
                ack_per_call: n,
                ..Self::ack_all()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ack_all()
            }
        }

        fn ack_unknown_ids() -> Self {
            Self {
                unknown_ids: true,
                ..Self::ack_all()
            }
        }

        fn ack(&self, ids: Vec<String>) -> Result<Vec<String>, EndpointError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EndpointError::Unreachable("connection refused".into()));
            }
            if self.unknown_ids {
                return Ok((0..ids.len()).map(|i| format!("unknown-{i}")).collect());
            }
            Ok(ids.into_iter().take(self.ack_per_call).collect())
        }
    }

    #[async_trait]
    impl RemoteEndpoint for MockEndpoint {
        async fn upload_samples(
            &self,
            _kind: MetricKind,
            batch: &[StoredSample],
        ) -> Result<Vec<String>, EndpointError> {
            self.ack(batch.iter().map(|s| s.id.clone()).collect())
        }

        async fn upload_sessions(
            &self,
            batch: &[StoredSleepSession],
        ) -> Result<Vec<String>, EndpointError> {
            self.ack(batch.iter().map(|s| s.id.clone()).collect())
        }

        async fn upload_ecg(&self, batch: &[StoredEcg]) -> Result<Vec<String>, EndpointError> {
            self.ack(batch.iter().map(|r| r.recorded_at.clone()).collect())
        }
    }

    fn store_with_samples(n: usize) -> Arc<Mutex<Store>> {
        let store = Store::open_in_memory().unwrap();
        let samples: Vec<MetricSample> = (0..n)
            .map(|i| MetricSample::new(100 + i as i64, 60.0))
            .collect();
        store
            .insert_batch("u-1", MetricKind::HeartRate, &samples, 1_000)
            .unwrap();
        Arc::new(Mutex::new(store))
    }

    #[tokio::test]
    async fn test_push_metric_drains_in_chunks() {
        let store = store_with_samples(5);
        let pusher = Pusher::new(Arc::clone(&store), MockEndpoint::ack_all()).chunk_size(2);

        let report = pusher.push_metric("u-1", MetricKind::HeartRate).await.unwrap();
        assert_eq!(report.uploaded, 5);
        assert_eq!(report.acknowledged, 5);
        // 2 + 2 + 1
        assert_eq!(pusher.endpoint.calls.load(Ordering::SeqCst), 3);

        let store = store.lock().await;
        assert!(store
            .pending_samples("u-1", MetricKind::HeartRate, 10)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_partial_ack_marks_only_acked_subset() {
        let store = store_with_samples(4);
        let pusher = Pusher::new(Arc::clone(&store), MockEndpoint::ack_first(3)).chunk_size(10);

        let report = pusher.push_metric("u-1", MetricKind::HeartRate).await.unwrap();
        assert_eq!(report.uploaded, 4);
        assert_eq!(report.acknowledged, 3);

        // The unacknowledged record stays pending for the next cycle
        let store = store.lock().await;
        let remaining = store
            .pending_samples("u-1", MetricKind::HeartRate, 10)
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, 103);
    }

    #[tokio::test]
    async fn test_unrecognized_ack_ids_do_not_spin_the_drain_loop() {
        let store = store_with_samples(3);
        // Full-length ack, but none of the ids match the pending set:
        // no store progress, so the pass must stop after one call.
        let pusher = Pusher::new(Arc::clone(&store), MockEndpoint::ack_unknown_ids());

        let report = pusher.push_metric("u-1", MetricKind::HeartRate).await.unwrap();
        assert_eq!(report.uploaded, 3);
        assert_eq!(report.acknowledged, 0);
        assert_eq!(pusher.endpoint.calls.load(Ordering::SeqCst), 1);

        let store = store.lock().await;
        assert_eq!(
            store
                .pending_samples("u-1", MetricKind::HeartRate, 10)
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_endpoint_failure_leaves_all_pending() {
        let store = store_with_samples(3);
        let pusher = Pusher::new(Arc::clone(&store), MockEndpoint::failing());

        let err = pusher
            .push_metric("u-1", MetricKind::HeartRate)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Endpoint(_)));

        let store = store.lock().await;
        assert_eq!(
            store
                .pending_samples("u-1", MetricKind::HeartRate, 10)
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_push_all_covers_sleep_and_ecg() {
        let store = store_with_samples(2);
        {
            let guard = store.lock().await;
            let session = SleepSession {
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
            guard.insert_session("u-1", &session, &[]).unwrap();
            guard
                .insert_ecg(
                    "u-1",
                    &EcgReading {
                        recorded_at: "2023-11-14 07:31:02".to_string(),
                        waveform: vec![1, 2, 3],
                        hrv_index: 50,
                        load_index: 50,
                        pressure_index: 50,
                        body_index: 50,
                        diagnosis: DiagnosisCode::Normal,
                    },
                )
                .unwrap();
        }

        let pusher = Pusher::new(Arc::clone(&store), MockEndpoint::ack_all());
        let report = pusher.push_all("u-1").await.unwrap();
        assert_eq!(report.uploaded, 4);
        assert_eq!(report.acknowledged, 4);

        let store = store.lock().await;
        assert!(store.pending_sessions("u-1", 10).unwrap().is_empty());
        assert!(store.pending_ecg("u-1", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_is_a_noop() {
        let store = store_with_samples(2);
        let pusher = Pusher::new(Arc::clone(&store), MockEndpoint::ack_all());

        pusher.push_metric("u-1", MetricKind::HeartRate).await.unwrap();
        let second = pusher.push_metric("u-1", MetricKind::HeartRate).await.unwrap();
        assert_eq!(second, PushReport::default());
    }
}

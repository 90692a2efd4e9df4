//! Phase sequencer. Runs Downloading -> MeasuringLatency -> Uploading on a
//! background worker, chaining phases with ordinary sequential control flow;
//! no two phases run concurrently against the same session.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::download::DownloadTest;
use super::ping::LatencyTest;
use super::session::{CancelToken, LatencyCell};
use super::upload::UploadTest;
use super::{SpeedTestResult, TestPhase, TestUpdate};
use crate::error::TestError;
use crate::settings::Settings;

pub struct Engine {
    settings: Settings,
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Spawn one full test sequence. Events are delivered on `updates` in
    /// order; the handle exposes cancellation and the latency snapshot.
    pub fn start(&self, updates: mpsc::Sender<TestUpdate>) -> SessionHandle {
        let cancel = CancelToken::new();
        let latency = Arc::new(LatencyCell::default());
        let sequence = Sequence {
            settings: self.settings.clone(),
            cancel: cancel.clone(),
            latency: Arc::clone(&latency),
        };
        let handle = tokio::spawn(sequence.run(updates));
        SessionHandle {
            cancel,
            latency,
            handle,
        }
    }
}

/// Caller's view of a running sequence.
pub struct SessionHandle {
    cancel: CancelToken,
    latency: Arc<LatencyCell>,
    handle: JoinHandle<Result<SpeedTestResult, TestError>>,
}

impl SessionHandle {
    /// Request cancellation. Idempotent; safe from any thread. In-flight
    /// interval callbacks that raced the flag may still fire once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone of the session's cancellation token, for callers that want to
    /// wire cancellation into their own signal handling.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Most recent mean latency, 0.0 until measured.
    pub fn latency_ms(&self) -> f64 {
        self.latency.load()
    }

    pub async fn wait(self) -> Result<SpeedTestResult, TestError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(TestError::Io(e.to_string())),
        }
    }
}

struct Sequence {
    settings: Settings,
    cancel: CancelToken,
    latency: Arc<LatencyCell>,
}

impl Sequence {
    async fn run(self, updates: mpsc::Sender<TestUpdate>) -> Result<SpeedTestResult, TestError> {
        // Download phase.
        self.enter(&updates, TestPhase::Downloading).await;
        let mut test = DownloadTest::new(&self.settings, self.cancel.clone());
        let (tx, mut rx) = mpsc::channel(32);
        let worker = tokio::spawn(async move { test.run(tx).await });
        while let Some(mbps) = rx.recv().await {
            let _ = updates.send(TestUpdate::DownloadInstant(mbps)).await;
        }
        let download_mbps = match join(worker).await {
            Ok(avg) => avg,
            Err(e) => return self.abort(&updates, TestPhase::Downloading, e).await,
        };
        if self.cancel.is_cancelled() {
            return self.cancelled(&updates).await;
        }
        let _ = updates.send(TestUpdate::DownloadComplete(download_mbps)).await;

        // Latency phase. Failure here degrades to the last-known snapshot
        // rather than aborting the sequence.
        self.enter(&updates, TestPhase::MeasuringLatency).await;
        let mut jitter_ms = 0.0;
        match LatencyTest::new(&self.settings, self.cancel.clone()).run().await {
            Ok(result) => {
                self.latency.store(result.avg_ms);
                jitter_ms = result.jitter_ms;
                let _ = updates
                    .send(TestUpdate::LatencyComplete {
                        avg_ms: result.avg_ms,
                        jitter_ms: result.jitter_ms,
                    })
                    .await;
            }
            Err(e) if e.is_cancelled() => return self.cancelled(&updates).await,
            Err(e) => warn!(error = %e, "latency measurement failed, keeping last-known value"),
        }
        if self.cancel.is_cancelled() {
            return self.cancelled(&updates).await;
        }

        // Upload phase.
        self.enter(&updates, TestPhase::Uploading).await;
        let mut test = UploadTest::new(&self.settings, self.cancel.clone());
        let (tx, mut rx) = mpsc::channel(32);
        let worker = tokio::spawn(async move { test.run(tx).await });
        while let Some(mbps) = rx.recv().await {
            let _ = updates.send(TestUpdate::UploadInstant(mbps)).await;
        }
        let upload_mbps = match join(worker).await {
            Ok(avg) => avg,
            Err(e) => return self.abort(&updates, TestPhase::Uploading, e).await,
        };
        if self.cancel.is_cancelled() {
            return self.cancelled(&updates).await;
        }
        let _ = updates.send(TestUpdate::UploadComplete(upload_mbps)).await;

        let result = SpeedTestResult {
            download_mbps,
            upload_mbps,
            latency_ms: self.latency.load(),
            jitter_ms,
            completed_at: SystemTime::now(),
        };
        info!(
            download_mbps = result.download_mbps,
            upload_mbps = result.upload_mbps,
            latency_ms = result.latency_ms,
            "sequence complete"
        );
        let _ = updates
            .send(TestUpdate::SequenceComplete(result.clone()))
            .await;
        self.enter(&updates, TestPhase::Completed).await;
        Ok(result)
    }

    async fn enter(&self, updates: &mpsc::Sender<TestUpdate>, phase: TestPhase) {
        let _ = updates.send(TestUpdate::PhaseChanged(phase)).await;
    }

    async fn cancelled(
        &self,
        updates: &mpsc::Sender<TestUpdate>,
    ) -> Result<SpeedTestResult, TestError> {
        info!("sequence cancelled");
        self.enter(updates, TestPhase::Cancelled).await;
        Err(TestError::Cancelled)
    }

    async fn abort(
        &self,
        updates: &mpsc::Sender<TestUpdate>,
        phase: TestPhase,
        error: TestError,
    ) -> Result<SpeedTestResult, TestError> {
        if error.is_cancelled() || self.cancel.is_cancelled() {
            return self.cancelled(updates).await;
        }
        warn!(?phase, error = %error, "phase failed");
        let _ = updates
            .send(TestUpdate::PhaseFailed {
                phase,
                message: error.to_string(),
            })
            .await;
        self.enter(updates, TestPhase::Failed).await;
        Err(error)
    }
}

async fn join(worker: JoinHandle<Result<f64, TestError>>) -> Result<f64, TestError> {
    match worker.await {
        Ok(result) => result,
        Err(e) => Err(TestError::Io(e.to_string())),
    }
}

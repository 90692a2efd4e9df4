use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::session::CancelToken;
use super::window::{IntervalSampler, SpeedWindow};
use crate::error::TestError;
use crate::settings::Settings;

/// Streams an oversized response body and samples instantaneous throughput
/// on the configured interval until cancellation, stream end, or the
/// wall-clock cap.
pub struct DownloadTest {
    url: String,
    duration_cap: Duration,
    sample_interval: Duration,
    window_size: usize,
    connect_timeout: Duration,
    request_timeout: Duration,
    cancel: CancelToken,
}

impl DownloadTest {
    pub fn new(settings: &Settings, cancel: CancelToken) -> Self {
        Self {
            url: settings.download_request_url(),
            duration_cap: settings.duration_cap,
            sample_interval: settings.sample_interval,
            window_size: settings.window_size,
            connect_timeout: settings.connect_timeout,
            request_timeout: settings.request_timeout,
            cancel,
        }
    }

    /// Smoothed readings go out on `progress_tx`; the return value is the
    /// final average over every completed interval (0.0 if none completed).
    pub async fn run(&mut self, progress_tx: mpsc::Sender<f64>) -> Result<f64, TestError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| self.fail(TestError::from_reqwest(e)))?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.fail(TestError::from_reqwest(e)))?;
        if !response.status().is_success() {
            return Err(self.fail(TestError::HttpStatus(response.status().as_u16())));
        }
        let mut stream = response.bytes_stream();

        let started = Instant::now();
        let mut sampler = IntervalSampler::new(self.sample_interval, Duration::ZERO);
        let mut window = SpeedWindow::new(self.window_size);

        loop {
            if self.cancel.is_cancelled() {
                debug!("download cancelled");
                return Err(TestError::Cancelled);
            }
            let chunk = match stream.next().await {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(self.fail(TestError::from_reqwest(e))),
            };
            let elapsed = started.elapsed();
            if let Some(sample) = sampler.on_bytes(chunk.len(), elapsed) {
                window.record(sample.mbps);
                let _ = progress_tx.send(window.smoothed()).await;
            }
            if elapsed >= self.duration_cap {
                break;
            }
        }

        let avg = window.final_average();
        info!(avg_mbps = avg, elapsed_ms = started.elapsed().as_millis() as u64, "download phase done");
        Ok(avg)
    }

    // A user-initiated cancellation suppresses error reporting for the phase.
    fn fail(&self, e: TestError) -> TestError {
        if self.cancel.is_cancelled() {
            TestError::Cancelled
        } else {
            e
        }
    }
}

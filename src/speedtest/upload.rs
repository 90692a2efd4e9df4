use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::session::CancelToken;
use super::window::{IntervalSampler, SpeedWindow};
use super::Sample;
use crate::error::TestError;
use crate::settings::Settings;

const CHUNK_SIZE: usize = 65_536;

/// Streams a synthesized payload through an instrumented request body. The
/// byte source refuses to yield once the cancel flag is set or the cap has
/// elapsed, and reports interval samples back to the supervising task. A
/// watchdog bounds transports whose completion signal hangs past the cap.
pub struct UploadTest {
    url: String,
    payload: Bytes,
    duration_cap: Duration,
    sample_interval: Duration,
    warmup: Duration,
    watchdog_deadline: Duration,
    window_size: usize,
    connect_timeout: Duration,
    request_timeout: Duration,
    cancel: CancelToken,
}

/// State owned by the request-body stream. The sampler lives here so the
/// byte counters have exactly one writer.
struct ByteSource {
    payload: Bytes,
    offset: usize,
    started: Instant,
    cap: Duration,
    sampler: IntervalSampler,
    cancel: CancelToken,
    sample_tx: mpsc::UnboundedSender<Sample>,
}

impl ByteSource {
    fn next_chunk(&mut self) -> Option<Bytes> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let elapsed = self.started.elapsed();
        if elapsed >= self.cap {
            return None;
        }
        let end = (self.offset + CHUNK_SIZE).min(self.payload.len());
        let chunk = self.payload.slice(self.offset..end);
        // Cycle the buffer; the transfer is bounded by the cap, not the
        // payload length.
        self.offset = if end == self.payload.len() { 0 } else { end };
        if let Some(sample) = self.sampler.on_bytes(chunk.len(), elapsed) {
            let _ = self.sample_tx.send(sample);
        }
        Some(chunk)
    }
}

impl UploadTest {
    pub fn new(settings: &Settings, cancel: CancelToken) -> Self {
        let mut data = vec![0u8; settings.payload_size.max(CHUNK_SIZE)];
        StdRng::from_entropy().fill_bytes(&mut data);
        Self {
            url: settings.upload_url.clone(),
            payload: Bytes::from(data),
            duration_cap: settings.duration_cap,
            sample_interval: settings.sample_interval,
            warmup: settings.upload_warmup,
            watchdog_deadline: settings.watchdog_deadline(),
            window_size: settings.window_size,
            connect_timeout: settings.connect_timeout,
            request_timeout: settings.request_timeout,
            cancel,
        }
    }

    pub async fn run(&mut self, progress_tx: mpsc::Sender<f64>) -> Result<f64, TestError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| self.fail(TestError::from_reqwest(e)))?;

        let (sample_tx, mut sample_rx) = mpsc::unbounded_channel::<Sample>();
        let started = Instant::now();
        let source = ByteSource {
            payload: self.payload.clone(),
            offset: 0,
            started,
            cap: self.duration_cap,
            sampler: IntervalSampler::new(self.sample_interval, self.warmup),
            cancel: self.cancel.clone(),
            sample_tx,
        };
        let body_stream = futures::stream::unfold(source, |mut source| async move {
            source
                .next_chunk()
                .map(|chunk| (Ok::<Bytes, std::io::Error>(chunk), source))
        });

        let request = client
            .post(&self.url)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send();
        tokio::pin!(request);
        let watchdog = tokio::time::sleep(self.watchdog_deadline);
        tokio::pin!(watchdog);

        let mut window = SpeedWindow::new(self.window_size);
        let mut source_done = false;

        loop {
            tokio::select! {
                sample = sample_rx.recv(), if !source_done => {
                    match sample {
                        Some(s) => {
                            window.record(s.mbps);
                            let _ = progress_tx.send(window.smoothed()).await;
                        }
                        None => source_done = true,
                    }
                }
                result = &mut request => {
                    match result {
                        Ok(response) if !response.status().is_success() => {
                            return Err(self.fail(TestError::UploadRejected(
                                response.status().as_u16(),
                            )));
                        }
                        Ok(_) => {}
                        Err(e) => return Err(self.fail(TestError::from_reqwest_upload(e))),
                    }
                    // Fold in samples that raced the completion.
                    while let Ok(s) = sample_rx.try_recv() {
                        window.record(s.mbps);
                    }
                    break;
                }
                _ = &mut watchdog => {
                    // Dropping the request force-terminates the transfer;
                    // completion is synthesized from the collected samples.
                    warn!(
                        error = %TestError::TransportHang,
                        deadline_ms = self.watchdog_deadline.as_millis() as u64,
                        "upload watchdog fired, synthesizing completion"
                    );
                    break;
                }
            }
        }

        if self.cancel.is_cancelled() {
            debug!("upload cancelled");
            return Err(TestError::Cancelled);
        }
        let avg = window.final_average();
        info!(avg_mbps = avg, elapsed_ms = started.elapsed().as_millis() as u64, "upload phase done");
        Ok(avg)
    }

    fn fail(&self, e: TestError) -> TestError {
        if self.cancel.is_cancelled() {
            TestError::Cancelled
        } else {
            e
        }
    }
}

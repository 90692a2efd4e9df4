use std::time::{Duration, Instant};

use tracing::debug;

use super::session::CancelToken;
use crate::error::TestError;
use crate::settings::Settings;

/// Sequential lightweight HEAD probes against a low-latency target. A single
/// slow or dropped probe must not abort the measurement; only a run where
/// every probe fails is terminal for the phase.
pub struct LatencyTest {
    url: String,
    probe_count: usize,
    probe_timeout: Duration,
    cancel: CancelToken,
    samples: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct LatencyResult {
    pub avg_ms: f64,
    pub jitter_ms: f64,
}

impl LatencyTest {
    pub fn new(settings: &Settings, cancel: CancelToken) -> Self {
        Self {
            url: settings.ping_url.clone(),
            probe_count: settings.probe_count,
            probe_timeout: Duration::from_secs(5),
            cancel,
            samples: Vec::new(),
        }
    }

    pub async fn run(&mut self) -> Result<LatencyResult, TestError> {
        let client = reqwest::Client::builder()
            .timeout(self.probe_timeout)
            .build()
            .map_err(TestError::from_reqwest)?;

        self.samples.clear();

        for probe in 0..self.probe_count {
            if self.cancel.is_cancelled() {
                // Abort early; whatever partial average exists is returned.
                break;
            }
            let start = Instant::now();
            match client.head(&self.url).send().await {
                Ok(response) if response.status().is_success() => {
                    let ms = start.elapsed().as_secs_f64() * 1000.0;
                    self.samples.push(ms);
                }
                Ok(response) => {
                    debug!(probe, status = %response.status(), "latency probe rejected");
                }
                Err(e) => {
                    debug!(probe, error = %e, "latency probe failed");
                }
            }
        }

        if self.samples.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(TestError::Cancelled);
            }
            return Err(TestError::AllProbesFailed(self.probe_count));
        }
        Ok(summarize(&self.samples))
    }
}

fn summarize(samples: &[f64]) -> LatencyResult {
    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    let jitter = if samples.len() > 1 {
        let variance = samples.iter().map(|&x| (x - avg).powi(2)).sum::<f64>()
            / (samples.len() - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };
    LatencyResult {
        avg_ms: avg,
        jitter_ms: jitter,
    }
}

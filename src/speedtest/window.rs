use std::collections::VecDeque;
use std::time::Duration;

use super::Sample;

/// Sliding-window averager. Keeps the last `capacity` readings for the
/// smoothed live value and every reading for the final average. Not
/// thread-safe; the phase worker is its sole writer.
#[derive(Debug)]
pub struct SpeedWindow {
    window: VecDeque<f64>,
    all: Vec<f64>,
    capacity: usize,
}

impl SpeedWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            all: Vec::new(),
            capacity,
        }
    }

    pub fn record(&mut self, mbps: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(mbps);
        self.all.push(mbps);
    }

    /// Mean of the current window; 0.0 when empty.
    pub fn smoothed(&self) -> f64 {
        mean(self.window.iter())
    }

    /// Mean of every recorded reading; 0.0 when nothing was recorded, which
    /// is the documented result for a phase that produced no completed
    /// interval before cancellation or timeout.
    pub fn final_average(&self) -> f64 {
        mean(self.all.iter())
    }
}

fn mean<'a>(values: impl ExactSizeIterator<Item = &'a f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Interval tick accumulator shared by the download and upload paths.
///
/// Feed it byte counts tagged with elapsed-time-since-phase-start; whenever a
/// full sample interval has passed it computes the instantaneous Mbps over
/// that interval and resets. Readings taken before `warmup` has elapsed are
/// discarded (the counters still reset, so the first kept sample covers one
/// interval, not the whole warm-up).
#[derive(Debug)]
pub struct IntervalSampler {
    interval: Duration,
    warmup: Duration,
    last_tick: Duration,
    bytes: u64,
}

impl IntervalSampler {
    pub fn new(interval: Duration, warmup: Duration) -> Self {
        Self {
            interval,
            warmup,
            last_tick: Duration::ZERO,
            bytes: 0,
        }
    }

    pub fn on_bytes(&mut self, count: usize, elapsed: Duration) -> Option<Sample> {
        self.bytes += count as u64;
        let since_tick = elapsed.saturating_sub(self.last_tick);
        if since_tick < self.interval {
            return None;
        }
        let mbps = (self.bytes as f64 * 8.0) / (1_000_000.0 * since_tick.as_secs_f64());
        self.bytes = 0;
        self.last_tick = elapsed;
        if elapsed < self.warmup {
            return None;
        }
        Some(Sample {
            at_ms: elapsed.as_millis() as u64,
            mbps,
        })
    }
}

pub mod download;
pub mod orchestrator;
pub mod ping;
pub mod session;
pub mod upload;
pub mod window;

use std::time::SystemTime;

/// Combined result of one full test sequence, handed to the caller for
/// persistence. The engine keeps no reference to it.
#[derive(Debug, Clone)]
pub struct SpeedTestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub completed_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Idle,
    Downloading,
    MeasuringLatency,
    Uploading,
    Completed,
    Cancelled,
    Failed,
}

impl TestPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TestPhase::Completed | TestPhase::Cancelled | TestPhase::Failed
        )
    }
}

/// One timestamped interval reading, relative to phase start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at_ms: u64,
    pub mbps: f64,
}

/// Event stream consumed by the caller. Within a phase, instants arrive in
/// timestamp order and strictly before the phase's terminal event; exactly
/// one of `*Complete` / `PhaseFailed` is delivered per phase.
#[derive(Debug, Clone)]
pub enum TestUpdate {
    PhaseChanged(TestPhase),
    DownloadInstant(f64),
    DownloadComplete(f64),
    LatencyComplete { avg_ms: f64, jitter_ms: f64 },
    UploadInstant(f64),
    UploadComplete(f64),
    PhaseFailed { phase: TestPhase, message: String },
    SequenceComplete(SpeedTestResult),
}

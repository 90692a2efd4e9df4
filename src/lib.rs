//! Phase-sequenced network throughput and latency measurement engine.
//!
//! Runs a download phase, a latency phase, and an upload phase in order,
//! sampling instantaneous throughput on a short interval and smoothing it
//! over a sliding window for live display; the full-run mean is the
//! persisted result. Cancellation is cooperative via a shared token, and the
//! upload phase is bounded by a watchdog on top of its wall-clock cap.

pub mod error;
pub mod feedback;
pub mod settings;
pub mod speedtest;

pub use error::TestError;
pub use settings::Settings;
pub use speedtest::orchestrator::{Engine, SessionHandle};
pub use speedtest::session::CancelToken;
pub use speedtest::{Sample, SpeedTestResult, TestPhase, TestUpdate};

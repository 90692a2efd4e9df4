//! Engine error taxonomy.
//!
//! Every I/O fault is caught at the sampler boundary and translated into one
//! of these variants. Cancellation is carried as `Cancelled` so callers can
//! suppress reporting instead of surfacing it as a failure.

use std::error::Error as _;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("could not connect: {0}")]
    Connect(String),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("transfer timed out")]
    Timeout,

    #[error("transport hang: no completion within cap plus grace")]
    TransportHang,

    #[error("upload rejected by endpoint: HTTP {0}")]
    UploadRejected(u16),

    #[error("connection lost during upload: {0}")]
    UploadReset(String),

    #[error("all {0} latency probes failed")]
    AllProbesFailed(usize),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("cancelled")]
    Cancelled,
}

impl TestError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TestError::Cancelled)
    }

    /// Classify a reqwest fault into the engine taxonomy.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return TestError::Timeout;
        }
        if let Some(status) = e.status() {
            return TestError::HttpStatus(status.as_u16());
        }
        let detail = chain_text(&e);
        if e.is_connect() {
            let lower = detail.to_lowercase();
            if lower.contains("dns") || lower.contains("resolve") {
                return TestError::Dns(detail);
            }
            if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake")
            {
                return TestError::Tls(detail);
            }
            return TestError::Connect(detail);
        }
        TestError::Io(detail)
    }

    /// Like [`from_reqwest`](Self::from_reqwest), but residual mid-body
    /// faults become `UploadReset` rather than generic I/O.
    pub fn from_reqwest_upload(e: reqwest::Error) -> Self {
        match Self::from_reqwest(e) {
            TestError::Io(detail) => TestError::UploadReset(detail),
            TestError::HttpStatus(code) => TestError::UploadRejected(code),
            other => other,
        }
    }
}

/// Flatten the error source chain into one message; reqwest's top-level
/// display often hides the interesting cause (DNS vs TLS vs reset).
fn chain_text(e: &reqwest::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

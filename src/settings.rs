use std::time::Duration;

/// Engine configuration. The duration constants are tuned empirically; treat
/// them as parameters, not invariants.
#[derive(Debug, Clone)]
pub struct Settings {
    pub download_url: String,
    pub upload_url: String,
    pub ping_url: String,
    /// Number of sequential latency probes per measurement.
    pub probe_count: usize,
    /// Wall-clock cap on each transfer phase.
    pub duration_cap: Duration,
    /// Cadence at which interval samples are taken.
    pub sample_interval: Duration,
    /// Upload samples taken before this much of the phase has elapsed are
    /// discarded (local buffering and TCP slow-start dominate them).
    pub upload_warmup: Duration,
    /// Extra time past the cap before the upload watchdog force-terminates
    /// the transfer.
    pub watchdog_grace: Duration,
    /// Bytes requested from the download endpoint. Intentionally more than
    /// can be transferred inside the cap.
    pub download_size: u64,
    /// Size of the synthesized upload payload buffer. The buffer is cycled,
    /// so the transfer is bounded by the cap rather than the buffer.
    pub payload_size: usize,
    /// Sliding window length for the smoothed live reading.
    pub window_size: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_url: "https://speed.cloudflare.com/__down".to_string(),
            upload_url: "https://speed.cloudflare.com/__up".to_string(),
            ping_url: "https://speed.cloudflare.com/__down?bytes=0".to_string(),
            probe_count: 5,
            duration_cap: Duration::from_millis(7000),
            sample_interval: Duration::from_millis(200),
            upload_warmup: Duration::from_millis(1500),
            watchdog_grace: Duration::from_millis(1500),
            download_size: 1_000_000_000,
            payload_size: 4_000_000,
            window_size: 10,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl Settings {
    pub fn download_request_url(&self) -> String {
        format!("{}?bytes={}", self.download_url, self.download_size)
    }

    /// Deadline for the upload watchdog, relative to phase start.
    pub fn watchdog_deadline(&self) -> Duration {
        self.duration_cap + self.watchdog_grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_constants() {
        let s = Settings::default();
        assert_eq!(s.duration_cap, Duration::from_millis(7000));
        assert_eq!(s.sample_interval, Duration::from_millis(200));
        assert_eq!(s.upload_warmup, Duration::from_millis(1500));
        assert_eq!(s.window_size, 10);
        assert_eq!(s.probe_count, 5);
    }

    #[test]
    fn watchdog_deadline_extends_past_cap() {
        let s = Settings::default();
        assert_eq!(s.watchdog_deadline(), Duration::from_millis(8500));
        assert!(s.watchdog_deadline() > s.duration_cap);
    }

    #[test]
    fn download_request_url_carries_oversized_request() {
        let s = Settings::default();
        assert_eq!(
            s.download_request_url(),
            "https://speed.cloudflare.com/__down?bytes=1000000000"
        );
    }
}

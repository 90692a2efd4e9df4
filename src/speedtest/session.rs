//! Cross-thread session state: the cooperative cancellation token and the
//! latency snapshot. These are the only two pieces of state shared between
//! the caller and the phase workers; both are single scalar cells, so plain
//! atomics suffice.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked by sampler loops at each chunk
/// read and interval boundary. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; safe from any thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lock-free `f64` cell holding the most recent mean latency in ms.
#[derive(Debug, Default)]
pub struct LatencyCell(AtomicU64);

impl LatencyCell {
    pub fn store(&self, ms: f64) {
        self.0.store(ms.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn latency_cell_round_trips() {
        let cell = LatencyCell::default();
        assert_eq!(cell.load(), 0.0);
        cell.store(23.75);
        assert_eq!(cell.load(), 23.75);
    }
}

use serde::Serialize;
use std::time::Duration;

/// Throughput and remaining-time estimate for a running job
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rate {
    /// Bytes discarded per second of active (unpaused) time
    pub throughput_bps: Option<f64>,
    pub eta: Option<Duration>,
}

impl Rate {
    /// Both figures are unknown until some time has passed and at least one
    /// unit has finished.
    pub fn compute(completed: usize, total: usize, bytes_done: u64, elapsed: Duration) -> Self {
        if completed == 0 || elapsed.is_zero() {
            return Self::default();
        }

        let secs = elapsed.as_secs_f64();
        let remaining = total.saturating_sub(completed);

        Self {
            throughput_bps: Some(bytes_done as f64 / secs),
            eta: Some(Duration::from_secs_f64(secs * remaining as f64 / completed as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_before_first_unit() {
        assert_eq!(Rate::compute(0, 100, 0, Duration::from_secs(3)), Rate::default());
    }

    #[test]
    fn test_unknown_without_elapsed_time() {
        let rate = Rate::compute(5, 100, 1 << 20, Duration::ZERO);
        assert!(rate.throughput_bps.is_none());
        assert!(rate.eta.is_none());
    }

    #[test]
    fn test_throughput_and_eta() {
        let rate = Rate::compute(25, 100, 100 * 1024 * 1024, Duration::from_secs(10));
        assert_eq!(rate.throughput_bps, Some(10.0 * 1024.0 * 1024.0));
        assert_eq!(rate.eta, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_eta_is_zero_when_done() {
        let rate = Rate::compute(100, 100, 4096, Duration::from_millis(1500));
        assert_eq!(rate.eta, Some(Duration::ZERO));
    }
}

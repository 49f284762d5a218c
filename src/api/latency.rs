//! In-memory histogram of per-participant scoring time.
//! Covers selection, realized-path lookup and CRPS for one participant.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Percentiles in microseconds; `None` until something was recorded.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
    pub max_us: Option<u64>,
}

/// Shared scoring latency. Evaluator records, API reads.
pub struct ScoringLatency {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl ScoringLatency {
    /// Tracks 1us to 10 minutes, 3 significant figures. Longer samples saturate.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 600_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(h) = self.inner.lock() else {
            return LatencySnapshot::default();
        };
        if h.is_empty() {
            return LatencySnapshot::default();
        }
        LatencySnapshot {
            samples: h.len(),
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
            max_us: Some(h.max()),
        }
    }
}

impl Default for ScoringLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_no_percentiles() {
        let snap = ScoringLatency::new().snapshot();
        assert_eq!(snap.samples, 0);
        assert!(snap.p50_us.is_none());
    }

    #[test]
    fn records_and_clamps() {
        let lat = ScoringLatency::new();
        lat.record(Duration::from_micros(0));
        lat.record(Duration::from_millis(5));
        lat.record(Duration::from_secs(3_600));
        let snap = lat.snapshot();
        assert_eq!(snap.samples, 3);
        assert!(snap.max_us.unwrap() >= 599_000_000);
    }
}

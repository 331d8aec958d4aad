//! In-memory latency histogram for endpoint requests.
//! Shared by every transport client of one scrape stage.

use std::sync::Mutex;
use std::time::Duration;

use tracing::info;

/// Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// Create a new histogram. Tracks 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record_us(&self, us: u64) {
        if let Ok(mut h) = self.inner.lock() {
            h.saturating_record(us.max(1));
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        self.record_us(us);
    }

    /// Return (p50_us, p95_us, p99_us). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        let p50 = h.value_at_quantile(0.5);
        let p95 = h.value_at_quantile(0.95);
        let p99 = h.value_at_quantile(0.99);
        (Some(p50), Some(p95), Some(p99))
    }

    /// Sample count.
    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn log_summary(&self, stage: &str) {
        let (p50, p95, p99) = self.percentiles();
        let ms = |v: Option<u64>| {
            v.map(|us| format!("{:.1}ms", us as f64 / 1000.0))
                .unwrap_or_else(|| "n/a".to_string())
        };
        info!(
            stage,
            requests = self.len(),
            "[{stage}] {} requests | latency p50={} p95={} p99={}",
            self.len(),
            ms(p50),
            ms(p95),
            ms(p99),
        );
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert_eq!(stats.percentiles(), (None, None, None));
        assert_eq!(stats.len(), 0);
    }

    #[test]
    fn percentiles_follow_samples() {
        let stats = LatencyStats::new();
        for ms in 1..=100u64 {
            stats.record(Duration::from_millis(ms));
        }
        let (p50, _, p99) = stats.percentiles();
        let p50 = p50.unwrap();
        assert!((49_000..=51_000).contains(&p50), "p50={p50}");
        assert!(p99.unwrap() >= 98_000);
        assert_eq!(stats.len(), 100);
    }
}

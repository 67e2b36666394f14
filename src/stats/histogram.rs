//! Transfer-time histogram using HdrHistogram
//!
//! Records per-worker phase times and summarises them as percentiles. Values
//! are stored in microseconds; transfers range from well under a millisecond
//! on loopback to minutes for large files on slow links.
//!
//! # Example
//!
//! ```
//! use filepulse::stats::histogram::LatencyHistogram;
//! use std::time::Duration;
//!
//! let mut hist = LatencyHistogram::new();
//! hist.record(Duration::from_millis(120));
//! hist.record(Duration::from_millis(340));
//!
//! let summary = hist.summary().unwrap();
//! assert_eq!(summary.count, 2);
//! ```

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest recordable value: one hour in microseconds
const MAX_MICROS: u64 = 3_600_000_000;

/// Histogram of phase durations
///
/// 3 significant digits; values outside 1us..1h are clamped.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

/// Distribution summary of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_MICROS, 3)
            .expect("histogram bounds are constant and valid");
        Self { histogram }
    }

    /// Record one duration
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        let micros = (elapsed.as_micros() as u64).clamp(1, MAX_MICROS);
        // In range after clamping
        let _ = self.histogram.record(micros);
    }

    /// Value at a percentile (0.0 - 100.0), or None if empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_micros(
            self.histogram.value_at_percentile(percentile),
        ))
    }

    pub fn min(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| Duration::from_micros(self.histogram.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| Duration::from_micros(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| Duration::from_micros(self.histogram.mean() as u64))
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Summary of all recorded samples, or None if empty
    pub fn summary(&self) -> Option<LatencySummary> {
        Some(LatencySummary {
            count: self.len(),
            min: self.min()?,
            mean: self.mean()?,
            p50: self.percentile(50.0)?,
            p90: self.percentile(90.0)?,
            p99: self.percentile(99.0)?,
            max: self.max()?,
        })
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Duration> for LatencyHistogram {
    fn from_iter<I: IntoIterator<Item = Duration>>(iter: I) -> Self {
        let mut hist = Self::new();
        for elapsed in iter {
            hist.record(elapsed);
        }
        hist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let hist = LatencyHistogram::new();
        assert!(hist.is_empty());
        assert!(hist.percentile(50.0).is_none());
        assert!(hist.summary().is_none());
    }

    #[test]
    fn test_percentiles() {
        let hist: LatencyHistogram = (1..=100).map(|i| Duration::from_millis(i * 10)).collect();

        let p50 = hist.percentile(50.0).unwrap();
        let p99 = hist.percentile(99.0).unwrap();
        assert!(p50.as_millis() >= 495 && p50.as_millis() <= 505);
        assert!(p99.as_millis() >= 985 && p99.as_millis() <= 995);
    }

    #[test]
    fn test_summary() {
        let hist: LatencyHistogram = [1000, 2000, 1500]
            .into_iter()
            .map(Duration::from_millis)
            .collect();

        let summary = hist.summary().unwrap();
        assert_eq!(summary.count, 3);
        assert!(summary.min.as_millis() >= 999 && summary.min.as_millis() <= 1001);
        assert!(summary.max.as_millis() >= 1998 && summary.max.as_millis() <= 2002);
        assert!(summary.mean.as_millis() >= 1495 && summary.mean.as_millis() <= 1505);
    }

    #[test]
    fn test_clamping() {
        let mut hist = LatencyHistogram::new();
        hist.record(Duration::ZERO);
        hist.record(Duration::from_secs(2 * 3600));
        assert_eq!(hist.len(), 2);
        assert!(hist.max().unwrap() <= Duration::from_secs(3601));
    }
}

//! Latency aggregation for one benchmarked operation

use std::time::Duration;

use serde::Serialize;

/// How one gateway call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Blocked,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub iterations: usize,
    pub total_time_ms: f64,
    pub avg_time_ms: f64,
    pub p50_time_ms: f64,
    pub p95_time_ms: f64,
    pub p99_time_ms: f64,
    pub ops_per_second: f64,
    pub success_count: usize,
    pub blocked_count: usize,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationStats {
    /// Entry for an operation that could not be run at all.
    pub fn failed(iterations: usize, error: impl Into<String>) -> Self {
        Self {
            iterations,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Collects per-call samples for one operation.
#[derive(Debug, Default)]
pub struct Recorder {
    samples_ms: Vec<f64>,
    success: usize,
    blocked: usize,
    errors: usize,
}

impl Recorder {
    pub fn with_capacity(iterations: usize) -> Self {
        Self {
            samples_ms: Vec::with_capacity(iterations),
            ..Self::default()
        }
    }

    pub fn record(&mut self, elapsed: Duration, outcome: CallOutcome) {
        self.samples_ms.push(elapsed.as_secs_f64() * 1000.0);
        match outcome {
            CallOutcome::Success => self.success += 1,
            CallOutcome::Blocked => self.blocked += 1,
            CallOutcome::Error => self.errors += 1,
        }
    }

    pub fn finish(mut self) -> OperationStats {
        let iterations = self.samples_ms.len();
        self.samples_ms.sort_by(f64::total_cmp);
        let total_time_ms: f64 = self.samples_ms.iter().sum();
        let avg_time_ms = if iterations == 0 {
            0.0
        } else {
            total_time_ms / iterations as f64
        };
        let ops_per_second = if total_time_ms > 0.0 {
            iterations as f64 * 1000.0 / total_time_ms
        } else {
            0.0
        };

        OperationStats {
            iterations,
            total_time_ms,
            avg_time_ms,
            p50_time_ms: nearest_rank(&self.samples_ms, 50.0),
            p95_time_ms: nearest_rank(&self.samples_ms, 95.0),
            p99_time_ms: nearest_rank(&self.samples_ms, 99.0),
            ops_per_second,
            success_count: self.success,
            blocked_count: self.blocked,
            error_count: self.errors,
            error: None,
        }
    }
}

/// Nearest-rank percentile of an ascending sample; `0.0` when empty.
pub fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_rank() {
        let samples: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(nearest_rank(&samples, 50.0), 50.0);
        assert_eq!(nearest_rank(&samples, 95.0), 95.0);
        assert_eq!(nearest_rank(&samples, 99.0), 99.0);

        assert_eq!(nearest_rank(&[7.0], 99.0), 7.0);
        assert_eq!(nearest_rank(&[1.0, 2.0, 3.0], 50.0), 2.0);
        assert_eq!(nearest_rank(&[], 50.0), 0.0);
    }

    #[test]
    fn test_recorder_counts_and_throughput() {
        let mut recorder = Recorder::with_capacity(4);
        recorder.record(Duration::from_millis(2), CallOutcome::Success);
        recorder.record(Duration::from_millis(4), CallOutcome::Blocked);
        recorder.record(Duration::from_millis(1), CallOutcome::Success);
        recorder.record(Duration::from_millis(3), CallOutcome::Error);

        let stats = recorder.finish();
        assert_eq!(stats.iterations, 4);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.blocked_count, 1);
        assert_eq!(stats.error_count, 1);
        assert!((stats.total_time_ms - 10.0).abs() < 1e-9);
        assert!((stats.avg_time_ms - 2.5).abs() < 1e-9);
        assert!((stats.p50_time_ms - 2.0).abs() < 1e-9);
        assert!((stats.p99_time_ms - 4.0).abs() < 1e-9);
        assert!((stats.ops_per_second - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_recorder() {
        let stats = Recorder::default().finish();
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.ops_per_second, 0.0);
    }
}

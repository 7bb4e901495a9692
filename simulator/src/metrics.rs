//! Simulation metrics.

use std::collections::VecDeque;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Operations that committed.
    pub successful_operations: u64,
    /// Operations refused by a ledger rule.
    pub rejected_operations: u64,
    /// Operations that hit a storage or internal fault.
    pub failed_operations: u64,
    /// Latency samples (µs) of committed operations.
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            successful_operations: 0,
            rejected_operations: 0,
            failed_operations: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed operation.
    pub fn record_success(&mut self, latency_us: u64) {
        self.total_operations += 1;
        self.successful_operations += 1;

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Record an operation the ledger refused.
    pub fn record_rejection(&mut self) {
        self.total_operations += 1;
        self.rejected_operations += 1;
    }

    /// Record a failed operation.
    pub fn record_failure(&mut self) {
        self.total_operations += 1;
        self.failed_operations += 1;
    }

    /// Merge another worker's counters into this one.
    pub fn merge(&mut self, other: &SimulationMetrics) {
        self.total_operations += other.total_operations;
        self.successful_operations += other.successful_operations;
        self.rejected_operations += other.rejected_operations;
        self.failed_operations += other.failed_operations;
        for sample in &other.latency_samples {
            if self.latency_samples.len() >= self.max_samples {
                self.latency_samples.pop_front();
            }
            self.latency_samples.push_back(*sample);
        }
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations as f64 / self.total_operations as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_success(100);
        metrics.record_success(200);
        metrics.record_success(150);
        metrics.record_rejection();

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.successful_operations, 3);
        assert_eq!(metrics.rejected_operations, 1);
        assert_eq!(metrics.average_latency_us(), 150);
        assert_eq!(metrics.p50_latency_us(), 150);
        assert_eq!(metrics.p99_latency_us(), 200);
        assert_eq!(metrics.success_rate(), 0.75);
    }

    #[test]
    fn test_merge() {
        let mut total = SimulationMetrics::new();
        let mut worker = SimulationMetrics::new();
        worker.record_success(10);
        worker.record_failure();

        total.merge(&worker);
        total.merge(&worker);

        assert_eq!(total.total_operations, 4);
        assert_eq!(total.failed_operations, 2);
        assert_eq!(total.average_latency_us(), 10);
    }
}

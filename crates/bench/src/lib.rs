//! Shared criterion settings for the workspace benchmarks.

use std::time::Duration;

use criterion::BenchmarkGroup;
use criterion::measurement::Measurement;

/// Sequence length from which a workload gets the longer measurement window.
const LARGE_INPUT_THRESHOLD: usize = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeProfile {
    /// Workloads that finish in microseconds.
    Small,
    Medium,
}

impl RuntimeProfile {
    pub fn for_size(size: usize) -> Self {
        if size >= LARGE_INPUT_THRESHOLD {
            Self::Medium
        } else {
            Self::Small
        }
    }

    fn settings(self) -> (usize, u64, u64) {
        // (sample size, warm-up ms, measurement ms)
        match self {
            Self::Small => (15, 100, 200),
            Self::Medium => (15, 500, 1000),
        }
    }

    pub fn apply<M: Measurement>(self, group: &mut BenchmarkGroup<'_, M>) {
        let (samples, warm_up_ms, measure_ms) = self.settings();
        group.sample_size(samples);
        group.warm_up_time(Duration::from_millis(warm_up_ms));
        group.measurement_time(Duration::from_millis(measure_ms));
    }
}

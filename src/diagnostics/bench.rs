//! Tiny in-handler micro benchmark.
//!
//! Repeats an operation and derives the average cost per iteration and the
//! implied throughput. Good enough to compare hosts, not a profiler.

use std::time::Duration;

use serde::{Serialize, Serializer};

use super::clock::{MonotonicSource, SystemMonotonic};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchResult {
    pub iterations: u64,
    #[serde(rename = "total_ms", serialize_with = "serialize_ms")]
    pub total: Duration,
    #[serde(rename = "avg_ms", serialize_with = "serialize_ms")]
    pub avg_per_iteration: Duration,
    /// Zero when the run took no measurable time.
    pub ops_per_sec: f64,
}

/// Run `op` `iterations` times against the process clock.
pub fn run<F: FnMut()>(iterations: u64, op: F) -> BenchResult {
    run_with(&SystemMonotonic, iterations, op)
}

/// Same as [`run`], timed by `source`.
pub fn run_with<S, F>(source: &S, iterations: u64, mut op: F) -> BenchResult
where
    S: MonotonicSource,
    F: FnMut(),
{
    if iterations == 0 {
        return BenchResult {
            iterations: 0,
            total: Duration::ZERO,
            avg_per_iteration: Duration::ZERO,
            ops_per_sec: 0.0,
        };
    }

    let start = source.now();
    for _ in 0..iterations {
        op();
    }
    let total = source.now().saturating_duration_since(start);

    let avg_nanos = total.as_nanos() / u128::from(iterations);
    let secs = total.as_secs_f64();
    BenchResult {
        iterations,
        total,
        avg_per_iteration: Duration::from_nanos(u64::try_from(avg_nanos).unwrap_or(u64::MAX)),
        ops_per_sec: if secs > 0.0 { iterations as f64 / secs } else { 0.0 },
    }
}

fn serialize_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

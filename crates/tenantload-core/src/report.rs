//! Per-query samples and their reduction into latency reports.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{HarnessError, HarnessResult, QueryError};

/// Outcome of one query attempt. Immutable once recorded.
#[derive(Debug, Clone)]
pub struct QuerySample {
    /// Tenant the query was scoped to.
    pub tenant: String,
    /// Moment the request was issued.
    pub started_at: Instant,
    /// Wall-clock time until completion, recorded on success and failure alike.
    pub duration: Duration,
    /// Failure, if any.
    pub error: Option<QueryError>,
}

impl QuerySample {
    /// Records a successful attempt.
    #[must_use]
    pub fn success(tenant: impl Into<String>, started_at: Instant, duration: Duration) -> Self {
        Self {
            tenant: tenant.into(),
            started_at,
            duration,
            error: None,
        }
    }

    /// Records a failed attempt.
    #[must_use]
    pub fn failure(
        tenant: impl Into<String>,
        started_at: Instant,
        duration: Duration,
        error: QueryError,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            started_at,
            duration,
            error: Some(error),
        }
    }

    /// `true` when the attempt succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Instant the attempt completed.
    #[must_use]
    pub fn finished_at(&self) -> Instant {
        self.started_at + self.duration
    }
}

/// Summary statistics of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyReport {
    /// Concurrency level (batch size) the report belongs to.
    pub concurrency: usize,
    /// Arithmetic mean of all durations.
    pub mean: Duration,
    /// Nearest-rank 99th percentile.
    pub p99: Duration,
}

impl LatencyReport {
    /// Reduces a batch of durations into mean and p99.
    ///
    /// p99 is the element at `floor(0.99 * count)` of the ascending sort. For
    /// batches smaller than 100 this is the maximum. Input order does not matter.
    pub fn reduce(concurrency: usize, durations: &[Duration]) -> HarnessResult<Self> {
        if durations.is_empty() {
            return Err(HarnessError::EmptyBatch);
        }

        let total: Duration = durations.iter().sum();
        let mean = total / durations.len() as u32;

        let mut sorted = durations.to_vec();
        sorted.sort_unstable();
        let index = (0.99 * sorted.len() as f64) as usize;
        let p99 = sorted[index.min(sorted.len() - 1)];

        Ok(Self {
            concurrency,
            mean,
            p99,
        })
    }

    /// Reduces a batch of samples, counting failed attempts too.
    pub fn from_samples(concurrency: usize, samples: &[QuerySample]) -> HarnessResult<Self> {
        let durations: Vec<Duration> = samples.iter().map(|s| s.duration).collect();
        Self::reduce(concurrency, &durations)
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "concurrency={} mean={:?} p99={:?}",
            self.concurrency, self.mean, self.p99
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryFailure;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    #[test]
    fn test_identical_durations() {
        let d = Duration::from_millis(42);
        for count in [1, 2, 10, 99, 100, 250] {
            let report = LatencyReport::reduce(count, &vec![d; count]).unwrap();
            assert_eq!(report.mean, d);
            assert_eq!(report.p99, d);
        }
    }

    #[test]
    fn test_order_independent() {
        let durations = ms(&[5, 80, 13, 2, 40, 7, 300, 21]);
        let mut reversed = durations.clone();
        reversed.reverse();
        let mut rotated = durations.clone();
        rotated.rotate_left(3);

        let a = LatencyReport::reduce(8, &durations).unwrap();
        assert_eq!(a, LatencyReport::reduce(8, &reversed).unwrap());
        assert_eq!(a, LatencyReport::reduce(8, &rotated).unwrap());
    }

    #[test]
    fn test_p99_is_max_for_small_batches() {
        let report = LatencyReport::reduce(3, &ms(&[10, 30, 20])).unwrap();
        assert_eq!(report.mean, Duration::from_millis(20));
        assert_eq!(report.p99, Duration::from_millis(30));
    }

    #[test]
    fn test_p99_nearest_rank_for_large_batches() {
        // 1..=200ms: floor(0.99 * 200) = 198 -> 199ms
        let durations: Vec<Duration> = (1..=200).map(Duration::from_millis).collect();
        let report = LatencyReport::reduce(200, &durations).unwrap();
        assert_eq!(report.p99, Duration::from_millis(199));
    }

    #[test]
    fn test_empty_batch_fails() {
        assert!(matches!(
            LatencyReport::reduce(0, &[]),
            Err(HarnessError::EmptyBatch)
        ));
    }

    #[test]
    fn test_failed_samples_contribute_timing() {
        let now = Instant::now();
        let samples = vec![
            QuerySample::success("A", now, Duration::from_millis(10)),
            QuerySample::failure(
                "A",
                now,
                Duration::from_millis(30),
                QueryError::new("A", QueryFailure::Application("x".into())),
            ),
        ];
        let report = LatencyReport::from_samples(2, &samples).unwrap();
        assert_eq!(report.mean, Duration::from_millis(20));
        assert_eq!(report.p99, Duration::from_millis(30));
    }

    #[test]
    fn test_summary_line_format() {
        let report = LatencyReport::reduce(2, &ms(&[1, 3])).unwrap();
        assert_eq!(report.to_string(), "concurrency=2 mean=2ms p99=3ms");
    }
}

//! Fixed-size concurrent query batches.
//!
//! A batch spawns one task per worker, then waits for all of them before
//! returning. Samples come back in worker-index order no matter in which
//! order the tasks complete.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tenantload_core::{
    HarnessResult, LatencyReport, QueryError, QueryFailure, QuerySample, RngSource, VectorRange,
};
use tokio::task::JoinHandle;
use tracing::error;

use crate::executor::QueryExecutor;

/// Samples of one finished batch, index-aligned with the worker assignments.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    samples: Vec<QuerySample>,
}

impl BatchOutcome {
    pub fn samples(&self) -> &[QuerySample] {
        &self.samples
    }

    /// Batch size.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of failed attempts.
    pub fn failures(&self) -> usize {
        self.samples.iter().filter(|s| !s.is_ok()).count()
    }

    /// Error of the attempt that completed first among the failed ones.
    pub fn first_error(&self) -> Option<&QueryError> {
        self.samples
            .iter()
            .filter(|s| s.error.is_some())
            .min_by_key(|s| s.finished_at())
            .and_then(|s| s.error.as_ref())
    }

    /// Reduces the batch into a latency report for its concurrency level.
    pub fn report(&self) -> HarnessResult<LatencyReport> {
        LatencyReport::from_samples(self.len(), &self.samples)
    }
}

/// Runs one query per assignment concurrently and waits for all of them.
///
/// `query_fn` is called once per worker with its index and tenant, and the
/// returned futures are spawned before any is awaited. A task that panics is
/// recorded as a failed sample for its tenant, so the outcome always has
/// exactly `assignments.len()` samples.
pub async fn run_batch<F, Fut>(assignments: Vec<String>, mut query_fn: F) -> BatchOutcome
where
    F: FnMut(usize, String) -> Fut,
    Fut: Future<Output = QuerySample> + Send + 'static,
{
    let batch_started = Instant::now();

    let handles: Vec<(String, JoinHandle<QuerySample>)> = assignments
        .into_iter()
        .enumerate()
        .map(|(index, tenant)| {
            let handle = tokio::spawn(query_fn(index, tenant.clone()));
            (tenant, handle)
        })
        .collect();

    let mut samples = Vec::with_capacity(handles.len());
    for (tenant, handle) in handles {
        match handle.await {
            Ok(sample) => samples.push(sample),
            Err(join_err) => {
                error!(tenant = %tenant, error = %join_err, "query worker aborted");
                let failure = QueryError::new(
                    tenant.clone(),
                    QueryFailure::WorkerAborted(join_err.to_string()),
                );
                samples.push(QuerySample::failure(
                    tenant,
                    batch_started,
                    batch_started.elapsed(),
                    failure,
                ));
            }
        }
    }

    BatchOutcome { samples }
}

/// Runs query batches with freshly generated vectors.
///
/// Each worker gets its own forked generator, so no random state is shared
/// between concurrently running tasks.
#[derive(Clone)]
pub struct ConcurrencyRunner {
    executor: Arc<QueryExecutor>,
    rng: RngSource,
    dimensions: usize,
    range: VectorRange,
}

impl ConcurrencyRunner {
    pub fn new(
        executor: Arc<QueryExecutor>,
        rng: RngSource,
        dimensions: usize,
        range: VectorRange,
    ) -> Self {
        Self {
            executor,
            rng,
            dimensions,
            range,
        }
    }

    /// Runs one batch, one worker per entry of `assignments`.
    pub async fn run(&self, assignments: Vec<String>) -> BatchOutcome {
        run_batch(assignments, |_, tenant| {
            let executor = Arc::clone(&self.executor);
            let vector = self.rng.vector_generator(self.range).generate(self.dimensions);
            async move { executor.run(&tenant, vector).await.sample }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok_sample(tenant: &str, millis: u64) -> QuerySample {
        QuerySample::success(tenant, Instant::now(), Duration::from_millis(millis))
    }

    #[tokio::test]
    async fn test_returns_one_sample_per_worker() {
        for n in [1usize, 2, 7, 50] {
            let assignments = vec!["A".to_string(); n];
            let outcome =
                run_batch(assignments, |i, t| async move { ok_sample(&t, i as u64) }).await;
            assert_eq!(outcome.len(), n);
            assert_eq!(outcome.failures(), 0);
        }
    }

    #[tokio::test]
    async fn test_samples_follow_assignment_order() {
        let assignments: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        // Later workers finish first
        let outcome = run_batch(assignments, |i, t| async move {
            tokio::time::sleep(Duration::from_millis(40 - 10 * i as u64)).await;
            ok_sample(&t, 1)
        })
        .await;

        let tenants: Vec<&str> = outcome.samples().iter().map(|s| s.tenant.as_str()).collect();
        assert_eq!(tenants, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_panicking_worker_becomes_failed_sample() {
        let assignments = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let outcome = run_batch(assignments, |i, t| async move {
            if i == 1 {
                panic!("worker blew up");
            }
            ok_sample(&t, 1)
        })
        .await;

        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.failures(), 1);
        let err = outcome.first_error().unwrap();
        assert_eq!(err.tenant, "B");
        assert!(matches!(err.failure, QueryFailure::WorkerAborted(_)));
    }

    #[test]
    fn test_first_error_is_earliest_completion() {
        let base = Instant::now();
        let failed = |tenant: &str, millis: u64| {
            QuerySample::failure(
                tenant,
                base,
                Duration::from_millis(millis),
                QueryError::new(tenant, QueryFailure::Application(tenant.to_string())),
            )
        };
        let outcome = BatchOutcome {
            samples: vec![
                failed("late", 30),
                QuerySample::success("fine", base, Duration::from_millis(1)),
                failed("early", 10),
            ],
        };

        assert_eq!(outcome.first_error().unwrap().tenant, "early");
        assert_eq!(outcome.failures(), 2);
        assert_eq!(outcome.report().unwrap().concurrency, 3);
    }
}

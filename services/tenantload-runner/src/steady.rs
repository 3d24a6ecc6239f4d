//! Steady per-tenant query load.
//!
//! A fixed set of users each issue a fixed number of queries against one
//! tenant at a jittered rate. Failures are counted, never fatal.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tenantload_core::config::SteadyConfig;
use tenantload_core::metrics::{GaugeGuard, QUERYING_TENANTS, QUERYING_USERS};
use tenantload_core::{LatencyReport, QuerySample, RngSource, TenantPool, VectorRange};
use tracing::{error, info, warn};

use crate::executor::{observe, QueryExecutor, Scenario};
use crate::pacing::Clock;

/// Queries between two progress log lines of one user.
const PROGRESS_EVERY: usize = 100;

/// Result of a steady run.
#[derive(Debug, Clone)]
pub struct SteadySummary {
    pub users: usize,
    pub tenants: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub aborted_users: usize,
    /// `None` when no query ran.
    pub report: Option<LatencyReport>,
}

pub struct SteadyDriver {
    executor: Arc<QueryExecutor>,
    clock: Arc<dyn Clock>,
    pool: TenantPool,
    config: SteadyConfig,
    dimensions: usize,
    range: VectorRange,
    rng: RngSource,
}

impl SteadyDriver {
    pub fn new(
        executor: Arc<QueryExecutor>,
        clock: Arc<dyn Clock>,
        pool: TenantPool,
        config: SteadyConfig,
        dimensions: usize,
        range: VectorRange,
        rng: RngSource,
    ) -> Self {
        Self {
            executor,
            clock,
            pool,
            config,
            dimensions,
            range,
            rng,
        }
    }

    /// Tenants picked with replacement, each repeated once per parallel user.
    fn user_assignments(&self) -> Vec<String> {
        let mut picker = self.rng.fork();
        let picked: Vec<String> = (0..self.config.tenant_count)
            .map(|_| self.pool.pick_random(&mut picker).to_string())
            .collect();

        let mut users = Vec::with_capacity(picked.len() * self.config.parallel_per_tenant);
        for _ in 0..self.config.parallel_per_tenant {
            users.extend(picked.iter().cloned());
        }
        users
    }

    pub async fn run(&self) -> SteadySummary {
        let users = self.user_assignments();
        let tenants = users.iter().collect::<HashSet<_>>().len();
        let average_wait = self.config.average_wait();
        let total = self.config.queries_per_user;

        info!(
            users = users.len(),
            tenants,
            queries_per_user = total,
            average_wait_ms = average_wait.as_millis() as u64,
            "starting steady load"
        );
        let querying_tenants = GaugeGuard::new(&QUERYING_TENANTS, tenants as i64);

        let handles: Vec<_> = users
            .iter()
            .map(|tenant| {
                let tenant = tenant.clone();
                let executor = Arc::clone(&self.executor);
                let clock = Arc::clone(&self.clock);
                let mut jitter = self.rng.fork();
                let mut vectors = self.rng.vector_generator(self.range);
                let dimensions = self.dimensions;

                tokio::spawn(async move {
                    let _querying = GaugeGuard::new(&QUERYING_USERS, 1);
                    let mut samples = Vec::with_capacity(total);
                    for i in 0..total {
                        let wait = average_wait.mul_f64(2.0 * jitter.gen::<f64>());
                        clock.sleep(wait).await;

                        let outcome = executor.run(&tenant, vectors.generate(dimensions)).await;
                        observe(Scenario::Steady, &outcome.sample);
                        if let Some(err) = &outcome.sample.error {
                            warn!(tenant = %tenant, error = %err, "query failed");
                        }
                        samples.push(outcome.sample);

                        if i % PROGRESS_EVERY == 0 {
                            info!(tenant = %tenant, "progress: {i}/{total}");
                        }
                    }
                    samples
                })
            })
            .collect();

        let mut samples: Vec<QuerySample> = Vec::new();
        let mut aborted_users = 0;
        for (tenant, joined) in users
            .iter()
            .zip(futures::future::join_all(handles).await)
        {
            match joined {
                Ok(user_samples) => samples.extend(user_samples),
                Err(join_err) => {
                    error!(tenant = %tenant, error = %join_err, "steady user aborted");
                    aborted_users += 1;
                }
            }
        }
        drop(querying_tenants);

        let failed = samples.iter().filter(|s| !s.is_ok()).count();
        let report = LatencyReport::from_samples(users.len(), &samples).ok();
        if let Some(report) = &report {
            info!(
                scenario = %Scenario::Steady,
                succeeded = samples.len() - failed,
                failed,
                "{report}"
            );
        }

        SteadySummary {
            users: users.len(),
            tenants,
            succeeded: samples.len() - failed,
            failed,
            aborted_users,
            report,
        }
    }
}

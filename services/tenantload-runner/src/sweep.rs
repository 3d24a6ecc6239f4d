//! Concurrency sweep: the same tenant vs. distinct tenants at rising levels.

use rand::rngs::StdRng;
use tenantload_core::config::SweepConfig;
use tenantload_core::metrics::BATCH_P99;
use tenantload_core::{LatencyReport, QueryError, TenantPool};
use tracing::{error, info, warn};

use crate::executor::{observe, Scenario};
use crate::runner::{BatchOutcome, ConcurrencyRunner};

/// Latency of one batch of the sweep.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub iteration: usize,
    pub scenario: Scenario,
    pub report: LatencyReport,
    pub failures: usize,
    pub first_error: Option<QueryError>,
}

/// Everything a sweep produced, in execution order.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub reports: Vec<ScenarioReport>,
}

impl SweepSummary {
    /// First error of every batch that had one.
    pub fn errors(&self) -> impl Iterator<Item = &QueryError> {
        self.reports.iter().filter_map(|r| r.first_error.as_ref())
    }

    /// Reports of one scenario.
    pub fn scenario(&self, scenario: Scenario) -> impl Iterator<Item = &ScenarioReport> {
        self.reports.iter().filter(move |r| r.scenario == scenario)
    }
}

/// Drives the sweep over the configured concurrency levels.
pub struct SweepDriver {
    runner: ConcurrencyRunner,
    pool: TenantPool,
    config: SweepConfig,
    rng: StdRng,
}

impl SweepDriver {
    pub fn new(runner: ConcurrencyRunner, pool: TenantPool, config: SweepConfig, rng: StdRng) -> Self {
        Self {
            runner,
            pool,
            config,
            rng,
        }
    }

    /// Runs every iteration. For each level the single-tenant batch runs
    /// first, then the many-tenants batch. A failing batch is reported and the
    /// sweep moves on.
    pub async fn run(&mut self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let levels = self.config.levels.clone();

        for iteration in 0..self.config.iterations {
            let tenant = self.pool.pick_random(&mut self.rng).to_string();
            info!(
                iteration,
                tenant = %tenant,
                "starting sweep iteration: one tenant vs. many tenants"
            );

            for &level in &levels {
                let single = self.runner.run(vec![tenant.clone(); level]).await;
                summary
                    .reports
                    .extend(Self::record(iteration, Scenario::SingleTenant, single));

                let assignments = self.many_tenant_assignments(level);
                let many = self.runner.run(assignments).await;
                summary
                    .reports
                    .extend(Self::record(iteration, Scenario::ManyTenants, many));
            }
        }

        summary
    }

    /// `level` tenants for the many-tenants batch, distinct while the pool allows.
    fn many_tenant_assignments(&mut self, level: usize) -> Vec<String> {
        let sampled = self.pool.sample(level, &mut self.rng);
        if sampled.len() >= level {
            return sampled;
        }

        warn!(
            level,
            pool_size = sampled.len(),
            "tenant pool smaller than concurrency level, reusing tenants"
        );
        sampled.iter().cycle().take(level).cloned().collect()
    }

    fn record(iteration: usize, scenario: Scenario, outcome: BatchOutcome) -> Option<ScenarioReport> {
        if outcome.is_empty() {
            warn!(scenario = %scenario, "skipping batch without samples");
            return None;
        }
        for sample in outcome.samples() {
            observe(scenario, sample);
        }

        let report = match outcome.report() {
            Ok(report) => report,
            Err(err) => {
                warn!(scenario = %scenario, error = %err, "skipping batch without samples");
                return None;
            }
        };

        info!(
            scenario = %scenario,
            concurrency = report.concurrency,
            mean_ms = report.mean.as_secs_f64() * 1000.0,
            p99_ms = report.p99.as_secs_f64() * 1000.0,
            "{report}"
        );
        BATCH_P99
            .with_label_values(&[scenario.as_str(), &report.concurrency.to_string()])
            .set(report.p99.as_secs_f64());

        let first_error = outcome.first_error().cloned();
        if let Some(err) = &first_error {
            error!(
                scenario = %scenario,
                concurrency = report.concurrency,
                failures = outcome.failures(),
                error = %err,
                "batch had failing queries"
            );
        }

        Some(ScenarioReport {
            iteration,
            scenario,
            report,
            failures: outcome.failures(),
            first_error,
        })
    }
}

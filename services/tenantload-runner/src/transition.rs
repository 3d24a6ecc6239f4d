//! Bulk tenant status churn.
//!
//! Moves tenants to one activity status in fixed-size cycles and waits for
//! the service to report each cycle as done before starting the next.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tenantload_core::config::TransitionConfig;
use tenantload_core::metrics::{result_label, TENANT_TRANSITIONS, TRANSITION_DURATION};
use tenantload_core::{ActivityStatus, HarnessError, HarnessResult, Tenant, TenantService};
use tracing::{info, warn};

use crate::pacing::Clock;

/// Result of a transition run.
#[derive(Debug, Clone)]
pub struct TransitionSummary {
    pub target: ActivityStatus,
    /// Tenants the run was asked to move; `None` means all eligible ones.
    pub requested: Option<usize>,
    pub cycles: usize,
    /// Tenants observed in the target status after their cycle.
    pub transitioned: usize,
    pub failed_updates: usize,
    pub timed_out_cycles: usize,
    pub elapsed: Duration,
}

impl TransitionSummary {
    /// Every update landed, no cycle timed out and the requested total was reached.
    pub fn is_complete(&self) -> bool {
        self.failed_updates == 0
            && self.timed_out_cycles == 0
            && self.requested.map_or(true, |n| self.transitioned >= n)
    }
}

/// How one cycle ended.
struct CycleOutcome {
    transitioned: usize,
    failed_updates: usize,
    timed_out: bool,
}

pub struct TransitionDriver {
    service: Arc<dyn TenantService>,
    clock: Arc<dyn Clock>,
    collection: String,
    target: ActivityStatus,
    config: TransitionConfig,
}

impl TransitionDriver {
    pub fn new(
        service: Arc<dyn TenantService>,
        clock: Arc<dyn Clock>,
        collection: impl Into<String>,
        target: ActivityStatus,
        config: TransitionConfig,
    ) -> Self {
        Self {
            service,
            clock,
            collection: collection.into(),
            target,
            config,
        }
    }

    /// Runs cycles until the requested total is reached or no tenant is left
    /// to move. Each tenant is attempted at most once per run.
    ///
    /// Listing failures abort the run. Failed updates and timed out cycles
    /// are counted and the run continues.
    pub async fn run(&self) -> HarnessResult<TransitionSummary> {
        let started = self.clock.now();
        let mut attempted: HashSet<String> = HashSet::new();
        let mut summary = TransitionSummary {
            target: self.target,
            requested: self.config.total,
            cycles: 0,
            transitioned: 0,
            failed_updates: 0,
            timed_out_cycles: 0,
            elapsed: Duration::ZERO,
        };

        info!(
            status = %self.target.as_str(),
            per_cycle = self.config.per_cycle,
            total = ?self.config.total,
            "starting tenant status transition"
        );

        loop {
            let remaining = match self.config.total {
                Some(total) if summary.transitioned >= total => break,
                Some(total) => total - summary.transitioned,
                None => usize::MAX,
            };

            let tenants = self.list().await?;
            let batch: Vec<String> = tenants
                .iter()
                .filter(|t| t.activity_status != self.target && !attempted.contains(&t.name))
                .take(self.config.per_cycle.min(remaining))
                .map(|t| t.name.clone())
                .collect();

            if batch.is_empty() {
                let pending = tenants
                    .iter()
                    .filter(|t| t.activity_status != self.target)
                    .count();
                info!(
                    status = %self.target.as_str(),
                    pending,
                    "no tenants left to transition"
                );
                break;
            }

            attempted.extend(batch.iter().cloned());
            summary.cycles += 1;
            let outcome = self.cycle(summary.cycles, &batch).await?;
            summary.transitioned += outcome.transitioned;
            summary.failed_updates += outcome.failed_updates;
            if outcome.timed_out {
                summary.timed_out_cycles += 1;
            }
        }

        summary.elapsed = self.clock.now() - started;
        TRANSITION_DURATION
            .with_label_values(&[self.target.as_str(), "run"])
            .observe(summary.elapsed.as_secs_f64());

        if summary.is_complete() {
            info!(
                status = %self.target.as_str(),
                cycles = summary.cycles,
                transitioned = summary.transitioned,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "tenant status transition finished"
            );
        } else {
            warn!(
                status = %self.target.as_str(),
                cycles = summary.cycles,
                transitioned = summary.transitioned,
                requested = ?summary.requested,
                failed_updates = summary.failed_updates,
                timed_out_cycles = summary.timed_out_cycles,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "not every tenant was transitioned"
            );
        }
        Ok(summary)
    }

    async fn cycle(&self, cycle: usize, batch: &[String]) -> HarnessResult<CycleOutcome> {
        let started = self.clock.now();
        let results = join_all(batch.iter().map(|tenant| {
            self.service
                .update_tenant_status(&self.collection, tenant, self.target)
        }))
        .await;

        let mut updated = Vec::with_capacity(batch.len());
        let mut failed_updates = 0;
        for (tenant, result) in batch.iter().zip(results) {
            TENANT_TRANSITIONS
                .with_label_values(&[self.target.as_str(), result_label(result.is_ok())])
                .inc();
            match result {
                Ok(()) => updated.push(tenant.as_str()),
                Err(err) => {
                    warn!(tenant = %tenant, error = %err, "status update failed");
                    failed_updates += 1;
                }
            }
        }

        let (transitioned, timed_out) = self.wait_for_status(&updated).await?;
        let elapsed = self.clock.now() - started;
        TRANSITION_DURATION
            .with_label_values(&[self.target.as_str(), "cycle"])
            .observe(elapsed.as_secs_f64());

        if timed_out {
            warn!(
                cycle,
                status = %self.target.as_str(),
                transitioned,
                pending = updated.len() - transitioned,
                elapsed_ms = elapsed.as_millis() as u64,
                "timed out waiting for tenant status"
            );
        } else {
            info!(
                cycle,
                status = %self.target.as_str(),
                transitioned,
                elapsed_ms = elapsed.as_millis() as u64,
                "cycle finished"
            );
        }

        Ok(CycleOutcome {
            transitioned,
            failed_updates,
            timed_out,
        })
    }

    /// Polls until every tenant in `names` reports the target status.
    /// Returns how many did and whether the wait timed out.
    async fn wait_for_status(&self, names: &[&str]) -> HarnessResult<(usize, bool)> {
        if names.is_empty() {
            return Ok((0, false));
        }

        let deadline = self.clock.now() + self.config.wait_timeout();
        loop {
            let tenants = self.list().await?;
            let done = tenants
                .iter()
                .filter(|t| t.activity_status == self.target && names.contains(&t.name.as_str()))
                .count();

            if done == names.len() {
                return Ok((done, false));
            }
            if self.clock.now() >= deadline {
                return Ok((done, true));
            }
            self.clock.sleep(self.config.poll_interval()).await;
        }
    }

    async fn list(&self) -> HarnessResult<Vec<Tenant>> {
        self.service
            .list_tenants(&self.collection)
            .await
            .map_err(|e| HarnessError::tenant_fetch(self.collection.as_str(), e))
    }
}

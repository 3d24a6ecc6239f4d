//! Wiring between configuration, the tenant service and the drivers.

use std::sync::Arc;
use std::time::Instant;

use tenantload_client::HttpTenantService;
use tenantload_core::{
    ActivityStatus, HarnessConfig, HarnessError, HarnessResult, RngSource, Tenant, TenantPool,
    TenantService,
};
use tracing::info;

use crate::executor::QueryExecutor;
use crate::pacing::{Clock, TokioClock};
use crate::runner::ConcurrencyRunner;
use crate::simulation::{SimulationDriver, SimulationSummary, UserContext, UserSettings};
use crate::steady::{SteadyDriver, SteadySummary};
use crate::sweep::{SweepDriver, SweepSummary};
use crate::transition::{TransitionDriver, TransitionSummary};

/// One configured harness run against one service.
pub struct Harness {
    config: HarnessConfig,
    service: Arc<dyn TenantService>,
    clock: Arc<dyn Clock>,
    rng: RngSource,
}

impl Harness {
    /// Connects to the configured HTTP target.
    pub fn connect(config: HarnessConfig) -> HarnessResult<Self> {
        let service = HttpTenantService::connect(&config.target)?;
        info!(base_url = %service.base_url(), "connected to tenant service");
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Uses an already constructed service.
    pub fn with_service(config: HarnessConfig, service: Arc<dyn TenantService>) -> Self {
        let rng = RngSource::from_optional_seed(config.seed);
        Self {
            config,
            service,
            clock: Arc::new(TokioClock),
            rng,
        }
    }

    /// Replaces the time source used for pacing and polling.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetches every tenant of the configured collection.
    pub async fn fetch_tenants(&self) -> HarnessResult<Vec<Tenant>> {
        let collection = &self.config.target.collection;
        let started = Instant::now();
        let tenants = self
            .service
            .list_tenants(collection)
            .await
            .map_err(|e| HarnessError::tenant_fetch(collection.as_str(), e))?;

        let hot = tenants
            .iter()
            .filter(|t| t.activity_status == ActivityStatus::Hot)
            .count();
        let cold = tenants
            .iter()
            .filter(|t| t.activity_status == ActivityStatus::Cold)
            .count();
        info!(
            collection = %collection,
            count = tenants.len(),
            hot,
            cold,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieved list of {} tenants",
            tenants.len()
        );
        Ok(tenants)
    }

    /// Fetches tenants and builds the pool, applying the status filter.
    pub async fn tenant_pool(&self) -> HarnessResult<TenantPool> {
        let tenants = self.fetch_tenants().await?;
        TenantPool::from_tenants(
            &self.config.target.collection,
            &tenants,
            self.config.target.tenant_status,
        )
    }

    fn executor(&self) -> Arc<QueryExecutor> {
        Arc::new(QueryExecutor::new(
            Arc::clone(&self.service),
            self.config.target.collection.clone(),
            self.config.query.limit,
        ))
    }

    /// Runs the concurrency sweep.
    pub async fn sweep(&self) -> HarnessResult<SweepSummary> {
        let pool = self.tenant_pool().await?;
        let runner = ConcurrencyRunner::new(
            self.executor(),
            self.rng.clone(),
            self.config.query.dimensions,
            self.config.query.vector_range,
        );
        let mut driver = SweepDriver::new(runner, pool, self.config.sweep.clone(), self.rng.fork());
        Ok(driver.run().await)
    }

    /// Runs the sustained-user simulation.
    pub async fn simulate(&self) -> HarnessResult<SimulationSummary> {
        let pool = self.tenant_pool().await?;
        let simulation = &self.config.simulation;
        let ctx = Arc::new(UserContext {
            service: Arc::clone(&self.service),
            executor: self.executor(),
            clock: Arc::clone(&self.clock),
            settings: UserSettings::new(
                self.config.target.collection.clone(),
                self.config.query.dimensions,
                self.config.query.vector_range,
                simulation,
            ),
        });
        let driver = SimulationDriver::new(
            ctx,
            pool,
            simulation.users,
            simulation.launch.clone(),
            self.rng.clone(),
        );
        Ok(driver.run().await)
    }

    /// Runs steady per-tenant load.
    pub async fn steady(&self) -> HarnessResult<SteadySummary> {
        let pool = self.tenant_pool().await?;
        let driver = SteadyDriver::new(
            self.executor(),
            Arc::clone(&self.clock),
            pool,
            self.config.steady.clone(),
            self.config.query.dimensions,
            self.config.query.vector_range,
            self.rng.clone(),
        );
        Ok(driver.run().await)
    }

    /// Moves tenants to `target` in cycles.
    pub async fn transition(&self, target: ActivityStatus) -> HarnessResult<TransitionSummary> {
        let driver = TransitionDriver::new(
            Arc::clone(&self.service),
            Arc::clone(&self.clock),
            self.config.target.collection.clone(),
            target,
            self.config.transition.clone(),
        );
        driver.run().await
    }
}

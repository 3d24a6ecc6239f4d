//! Simulated users cycling tenants between COLD and HOT.
//!
//! Each user runs activate -> query until deadline -> deactivate against one
//! randomly picked tenant. Users are launched on a shrinking interval and
//! overlap freely; two users may pick the same tenant.

use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use rand::rngs::StdRng;
use rand::Rng;
use tenantload_core::config::{LaunchConfig, SimulationConfig};
use tenantload_core::metrics::{result_label, GaugeGuard, QUERYING_USERS, TENANT_TRANSITIONS};
use tenantload_core::{
    ActivityStatus, LifecycleError, RngSource, ServiceError, TenantPool, TenantService,
    VectorGenerator, VectorRange,
};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::collector::ErrorCollector;
use crate::executor::{observe, QueryExecutor, Scenario};
use crate::pacing::{Clock, LaunchSchedule};

/// Lifecycle phase of one simulated user.
#[derive(Debug)]
pub enum UserState {
    Activating,
    Querying { deadline: Instant },
    Deactivating,
    Done(Result<(), LifecycleError>),
}

/// Settings shared by every user of a run.
#[derive(Debug, Clone)]
pub struct UserSettings {
    pub collection: String,
    pub dimensions: usize,
    pub vector_range: VectorRange,
    pub query_deadline: Duration,
    pub sleep_min: Duration,
    pub sleep_max: Duration,
    pub cleanup_on_failure: bool,
}

impl UserSettings {
    pub fn new(
        collection: impl Into<String>,
        dimensions: usize,
        vector_range: VectorRange,
        config: &SimulationConfig,
    ) -> Self {
        let (sleep_min, sleep_max) = config.sleep_bounds();
        Self {
            collection: collection.into(),
            dimensions,
            vector_range,
            query_deadline: config.query_deadline(),
            sleep_min,
            sleep_max,
            cleanup_on_failure: config.cleanup_on_failure,
        }
    }
}

/// Dependencies shared by every user of a run.
pub struct UserContext {
    pub service: Arc<dyn TenantService>,
    pub executor: Arc<QueryExecutor>,
    pub clock: Arc<dyn Clock>,
    pub settings: UserSettings,
}

/// How one user ended.
#[derive(Debug)]
pub struct UserOutcome {
    pub user: usize,
    pub tenant: String,
    pub queries: usize,
    pub result: Result<(), LifecycleError>,
}

/// One user bound to one tenant.
pub struct SimulatedUser {
    id: usize,
    tenant: String,
    ctx: Arc<UserContext>,
    rng: StdRng,
    vectors: VectorGenerator,
    queries: usize,
}

impl SimulatedUser {
    pub fn new(id: usize, tenant: impl Into<String>, ctx: Arc<UserContext>, rng: &RngSource) -> Self {
        let vectors = rng.vector_generator(ctx.settings.vector_range);
        Self {
            id,
            tenant: tenant.into(),
            ctx,
            rng: rng.fork(),
            vectors,
            queries: 0,
        }
    }

    /// Runs the lifecycle to completion.
    pub async fn run(mut self) -> UserOutcome {
        let mut state = UserState::Activating;
        loop {
            state = match state {
                UserState::Done(result) => {
                    return UserOutcome {
                        user: self.id,
                        tenant: self.tenant,
                        queries: self.queries,
                        result,
                    }
                }
                state => self.step(state).await,
            };
        }
    }

    async fn step(&mut self, state: UserState) -> UserState {
        match state {
            UserState::Activating => match self.set_status(ActivityStatus::Hot).await {
                Ok(()) => UserState::Querying {
                    deadline: self.ctx.clock.now() + self.ctx.settings.query_deadline,
                },
                Err(source) => UserState::Done(Err(LifecycleError::Activate {
                    tenant: self.tenant.clone(),
                    source,
                })),
            },
            UserState::Querying { deadline } => {
                let querying = GaugeGuard::new(&QUERYING_USERS, 1);
                let result = self.query_until(deadline).await;
                drop(querying);
                match result {
                    Ok(()) => UserState::Deactivating,
                    Err(err) => {
                        if self.ctx.settings.cleanup_on_failure {
                            if let Err(cleanup) = self.set_status(ActivityStatus::Cold).await {
                                warn!(tenant = %self.tenant, error = %cleanup, "cleanup deactivation failed");
                            }
                        }
                        UserState::Done(Err(err))
                    }
                }
            }
            UserState::Deactivating => match self.set_status(ActivityStatus::Cold).await {
                Ok(()) => UserState::Done(Ok(())),
                Err(source) => UserState::Done(Err(LifecycleError::Deactivate {
                    tenant: self.tenant.clone(),
                    source,
                })),
            },
            done @ UserState::Done(_) => done,
        }
    }

    async fn query_until(&mut self, deadline: Instant) -> Result<(), LifecycleError> {
        while self.ctx.clock.now() < deadline {
            let vector = self.vectors.generate(self.ctx.settings.dimensions);
            let outcome = self.ctx.executor.run(&self.tenant, vector).await;
            observe(Scenario::UserSimulation, &outcome.sample);
            self.queries += 1;

            if let Some(err) = outcome.sample.error {
                return Err(err.into());
            }

            let pause = self.pause();
            self.ctx.clock.sleep(pause).await;
        }
        Ok(())
    }

    fn pause(&mut self) -> Duration {
        let (min, max) = (self.ctx.settings.sleep_min, self.ctx.settings.sleep_max);
        if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        }
    }

    async fn set_status(&self, status: ActivityStatus) -> Result<(), ServiceError> {
        let started = StdInstant::now();
        let result = self
            .ctx
            .service
            .update_tenant_status(&self.ctx.settings.collection, &self.tenant, status)
            .await;
        TENANT_TRANSITIONS
            .with_label_values(&[status.as_str(), result_label(result.is_ok())])
            .inc();

        if result.is_ok() {
            let verb = match status {
                ActivityStatus::Cold => "deactivated",
                _ => "activated",
            };
            info!(
                tenant = %self.tenant,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "{verb} tenant"
            );
        }
        result
    }
}

/// Result of a simulation run.
#[derive(Debug, Default)]
pub struct SimulationSummary {
    pub launched: usize,
    pub completed: usize,
    pub queries: usize,
    pub errors: Vec<LifecycleError>,
}

/// Launches simulated users on a ramp and waits for all of them.
pub struct SimulationDriver {
    ctx: Arc<UserContext>,
    pool: TenantPool,
    users: usize,
    launch: LaunchConfig,
    rng: RngSource,
}

impl SimulationDriver {
    pub fn new(
        ctx: Arc<UserContext>,
        pool: TenantPool,
        users: usize,
        launch: LaunchConfig,
        rng: RngSource,
    ) -> Self {
        Self {
            ctx,
            pool,
            users,
            launch,
            rng,
        }
    }

    pub async fn run(&self) -> SimulationSummary {
        let collector = ErrorCollector::new(self.users);
        let mut picker = self.rng.fork();
        let mut handles = Vec::with_capacity(self.users);

        for (id, interval) in (0..self.users).zip(LaunchSchedule::new(&self.launch)) {
            let tenant = self.pool.pick_random(&mut picker).to_string();
            let user = SimulatedUser::new(id, tenant.clone(), Arc::clone(&self.ctx), &self.rng);
            let reporter = collector.reporter();

            let handle = tokio::spawn(async move {
                let outcome = user.run().await;
                if let Err(err) = &outcome.result {
                    error!(tenant = %outcome.tenant, phase = err.phase(), error = %err, "user failed");
                    reporter.report(err.clone());
                }
                outcome
            });
            handles.push((tenant, handle));

            if id + 1 < self.users {
                self.ctx.clock.sleep(interval).await;
            }
        }
        info!(users = self.users, "all users launched");

        let mut summary = SimulationSummary {
            launched: handles.len(),
            ..SimulationSummary::default()
        };
        for (tenant, handle) in handles {
            match handle.await {
                Ok(outcome) => {
                    summary.queries += outcome.queries;
                    if outcome.result.is_ok() {
                        summary.completed += 1;
                    }
                }
                Err(join_err) => {
                    collector.reporter().report(LifecycleError::Aborted {
                        tenant,
                        message: join_err.to_string(),
                    });
                }
            }
        }

        summary.errors = collector.drain();
        summary
    }
}

//! In-memory `TenantService` double shared by the integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tenantload_core::{
    ActivityStatus, HarnessConfig, ResponseError, SearchRequest, SearchResponse, ServiceError,
    ServiceResult, Tenant, TenantService,
};

/// Counts every call and fails on demand. Successful status updates are
/// applied to the tenant list unless `ignoring_updates` is set.
#[derive(Default)]
pub struct FakeTenantService {
    tenants: Mutex<Vec<Tenant>>,
    ignore_updates: bool,
    fail_list: bool,
    fail_activate: bool,
    fail_deactivate: bool,
    fail_search: bool,
    embedded_error: bool,

    pub activations: AtomicUsize,
    pub deactivations: AtomicUsize,
    pub searches: AtomicUsize,
    /// Tenant of every search, in call order.
    pub searched: Mutex<Vec<String>>,
}

impl FakeTenantService {
    pub fn with_tenants(names: &[&str]) -> Self {
        Self {
            tenants: Mutex::new(
                names
                    .iter()
                    .map(|n| Tenant::new(*n, ActivityStatus::Cold))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn with_statuses(tenants: Vec<Tenant>) -> Self {
        Self {
            tenants: Mutex::new(tenants),
            ..Self::default()
        }
    }

    /// Accepts status updates without ever applying them.
    pub fn ignoring_updates(mut self) -> Self {
        self.ignore_updates = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_activate(mut self) -> Self {
        self.fail_activate = true;
        self
    }

    pub fn failing_deactivate(mut self) -> Self {
        self.fail_deactivate = true;
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn embedded_search_error(mut self) -> Self {
        self.embedded_error = true;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn searched(&self) -> Vec<String> {
        self.searched.lock().clone()
    }

    pub fn count_with_status(&self, status: ActivityStatus) -> usize {
        self.tenants
            .lock()
            .iter()
            .filter(|t| t.activity_status == status)
            .count()
    }
}

fn unavailable() -> ServiceError {
    ServiceError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[async_trait]
impl TenantService for FakeTenantService {
    async fn list_tenants(&self, _collection: &str) -> ServiceResult<Vec<Tenant>> {
        if self.fail_list {
            return Err(ServiceError::Transport("connection refused".to_string()));
        }
        Ok(self.tenants.lock().clone())
    }

    async fn update_tenant_status(
        &self,
        _collection: &str,
        tenant: &str,
        status: ActivityStatus,
    ) -> ServiceResult<()> {
        match status {
            ActivityStatus::Hot => {
                self.activations.fetch_add(1, Ordering::SeqCst);
                if self.fail_activate {
                    return Err(unavailable());
                }
            }
            _ => {
                self.deactivations.fetch_add(1, Ordering::SeqCst);
                if self.fail_deactivate {
                    return Err(unavailable());
                }
            }
        }
        if !self.ignore_updates {
            if let Some(t) = self.tenants.lock().iter_mut().find(|t| t.name == tenant) {
                t.activity_status = status;
            }
        }
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> ServiceResult<SearchResponse> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.searched.lock().push(request.tenant.clone());

        if self.fail_search {
            return Err(ServiceError::Transport("connection reset".to_string()));
        }
        if self.embedded_error {
            return Ok(SearchResponse {
                hits: 0,
                errors: vec![ResponseError {
                    message: format!("tenant {} is not active", request.tenant),
                }],
            });
        }
        Ok(SearchResponse::with_hits(request.limit))
    }
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Plain-text subscriber at `info` writing into this buffer.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish()
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Small, fast configuration with a fixed seed.
pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.target.collection = "MultiTenancyTest".to_string();
    config.query.dimensions = 8;
    config.seed = Some(7);
    config.sweep.levels = vec![1, 2];
    config.simulation.users = 5;
    config.simulation.query_deadline_ms = 0;
    config.simulation.sleep_min_ms = 1000;
    config.simulation.sleep_max_ms = 2000;
    config
}

//! Single timed similarity query.

use std::sync::Arc;
use std::time::Instant;

use tenantload_core::metrics::{result_label, QUERY_DURATION, QUERY_RESULTS};
use tenantload_core::{
    QueryError, QueryFailure, QuerySample, SearchRequest, SearchResponse, TenantService,
};
use tracing::info;

/// Which driver produced a query, used as a log field and metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Every worker of a batch queries the same tenant.
    SingleTenant,
    /// Every worker of a batch queries a different tenant.
    ManyTenants,
    /// Long-lived simulated users.
    UserSimulation,
    /// Fixed-rate per-tenant users.
    Steady,
}

impl Scenario {
    /// Label value used in logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SingleTenant => "single_tenant",
            Self::ManyTenants => "many_tenants",
            Self::UserSimulation => "user_simulation",
            Self::Steady => "steady",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`QueryExecutor::run`]: the recorded sample plus the raw response, if any.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub sample: QuerySample,
    pub response: Option<SearchResponse>,
}

impl QueryOutcome {
    /// Converts into the response or the query error.
    pub fn into_result(self) -> Result<SearchResponse, QueryError> {
        match (self.sample.error, self.response) {
            (Some(err), _) => Err(err),
            (None, Some(response)) => Ok(response),
            (None, None) => Ok(SearchResponse::default()),
        }
    }
}

/// Issues tenant-scoped similarity searches and times them.
pub struct QueryExecutor {
    service: Arc<dyn TenantService>,
    collection: String,
    limit: usize,
}

impl QueryExecutor {
    pub fn new(service: Arc<dyn TenantService>, collection: impl Into<String>, limit: usize) -> Self {
        Self {
            service,
            collection: collection.into(),
            limit,
        }
    }

    /// Runs one search against `tenant`.
    ///
    /// The duration covers issuance to completion and is recorded whether the
    /// call succeeded, failed in transport, or returned embedded errors (the
    /// first of which becomes the sample's error).
    pub async fn run(&self, tenant: &str, vector: Vec<f32>) -> QueryOutcome {
        let request = SearchRequest {
            collection: self.collection.clone(),
            tenant: tenant.to_string(),
            limit: self.limit,
            vector,
        };

        let started_at = Instant::now();
        let result = self.service.search(&request).await;
        let duration = started_at.elapsed();

        let (error, response) = match result {
            Ok(response) => {
                let error = response.first_error().map(|e| {
                    QueryError::new(tenant, QueryFailure::Application(e.message.clone()))
                });
                (error, Some(response))
            }
            Err(err) => (Some(QueryError::new(tenant, err)), None),
        };

        info!(
            tenant,
            elapsed_ms = duration.as_millis() as u64,
            ok = error.is_none(),
            "query finished"
        );

        QueryOutcome {
            sample: QuerySample {
                tenant: tenant.to_string(),
                started_at,
                duration,
                error,
            },
            response,
        }
    }
}

/// Records a finished sample in the query metrics.
pub fn observe(scenario: Scenario, sample: &QuerySample) {
    QUERY_DURATION
        .with_label_values(&[scenario.as_str()])
        .observe(sample.duration.as_secs_f64());
    QUERY_RESULTS
        .with_label_values(&[scenario.as_str(), result_label(sample.is_ok())])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tenantload_core::{
        ActivityStatus, ResponseError, ServiceError, ServiceResult, Tenant,
    };

    enum Reply {
        Hits(usize),
        Embedded(Vec<&'static str>),
        Transport,
    }

    struct StubService {
        reply: Reply,
        delay: Duration,
    }

    #[async_trait]
    impl TenantService for StubService {
        async fn list_tenants(&self, _collection: &str) -> ServiceResult<Vec<Tenant>> {
            Ok(Vec::new())
        }

        async fn update_tenant_status(
            &self,
            _collection: &str,
            _tenant: &str,
            _status: ActivityStatus,
        ) -> ServiceResult<()> {
            Ok(())
        }

        async fn search(&self, request: &SearchRequest) -> ServiceResult<SearchResponse> {
            assert_eq!(request.collection, "Coll");
            assert_eq!(request.limit, 10);
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Reply::Hits(n) => Ok(SearchResponse::with_hits(*n)),
                Reply::Embedded(messages) => Ok(SearchResponse {
                    hits: 0,
                    errors: messages
                        .iter()
                        .map(|m| ResponseError {
                            message: m.to_string(),
                        })
                        .collect(),
                }),
                Reply::Transport => Err(ServiceError::Transport("connection reset".into())),
            }
        }
    }

    fn executor(reply: Reply, delay: Duration) -> QueryExecutor {
        QueryExecutor::new(Arc::new(StubService { reply, delay }), "Coll", 10)
    }

    #[tokio::test]
    async fn test_successful_query_is_timed() {
        let outcome = executor(Reply::Hits(10), Duration::from_millis(20))
            .run("A", vec![0.0; 4])
            .await;

        assert!(outcome.sample.is_ok());
        assert_eq!(outcome.sample.tenant, "A");
        assert!(outcome.sample.duration >= Duration::from_millis(20));
        assert_eq!(outcome.into_result().unwrap().hits, 10);
    }

    #[tokio::test]
    async fn test_first_embedded_error_is_surfaced() {
        let outcome = executor(
            Reply::Embedded(vec!["first problem", "second problem"]),
            Duration::ZERO,
        )
        .run("B", vec![0.0; 4])
        .await;

        let err = outcome.sample.error.clone().unwrap();
        assert_eq!(err.tenant, "B");
        assert_eq!(
            err.failure,
            QueryFailure::Application("first problem".to_string())
        );
        assert!(outcome.response.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_still_records_duration() {
        let outcome = executor(Reply::Transport, Duration::from_millis(15))
            .run("C", vec![0.0; 4])
            .await;

        assert!(outcome.sample.duration >= Duration::from_millis(15));
        assert!(matches!(
            outcome.sample.error.as_ref().map(|e| &e.failure),
            Some(QueryFailure::Transport(ServiceError::Transport(_)))
        ));
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_scenario_labels() {
        assert_eq!(Scenario::SingleTenant.to_string(), "single_tenant");
        assert_eq!(Scenario::ManyTenants.as_str(), "many_tenants");
    }
}

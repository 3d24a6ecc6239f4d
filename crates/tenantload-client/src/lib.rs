//! HTTP implementation of [`TenantService`] for tenant-aware vector services.
//!
//! Endpoints used:
//! - `GET  /v1/schema/{collection}/tenants`
//! - `PUT  /v1/schema/{collection}/tenants`
//! - `POST /v1/graphql` (tenant-scoped `nearVector` search)

mod graphql;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Serialize;
use tracing::debug;

use tenantload_core::config::TargetConfig;
use tenantload_core::{
    ActivityStatus, HarnessError, HarnessResult, SearchRequest, SearchResponse, ServiceError,
    ServiceResult, Tenant, TenantService,
};

pub use graphql::{near_vector_query, parse_search_response};

/// Upper bound on the response body kept in [`ServiceError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// reqwest-backed [`TenantService`].
#[derive(Debug, Clone)]
pub struct HttpTenantService {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct TenantUpdate<'a> {
    name: &'a str,
    #[serde(rename = "activityStatus")]
    activity_status: ActivityStatus,
}

#[derive(Serialize)]
struct GraphQlRequest {
    query: String,
}

impl HttpTenantService {
    /// Builds a client for the configured target.
    ///
    /// Fails with [`HarnessError::Connection`] when the base URL is invalid or
    /// the HTTP client cannot be constructed. No request is sent.
    pub fn connect(target: &TargetConfig) -> HarnessResult<Self> {
        let base_url = Url::parse(&target.base_url())
            .map_err(|e| HarnessError::connection(format!("invalid base url: {e}")))?;

        let mut builder = Client::builder().pool_max_idle_per_host(64);
        if let Some(timeout) = target.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| HarnessError::connection(format!("failed to build http client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ServiceResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Transport(format!("invalid endpoint `{path}`: {e}")))
    }

    fn tenants_endpoint(&self, collection: &str) -> ServiceResult<Url> {
        self.endpoint(&format!("v1/schema/{collection}/tenants"))
    }
}

/// Maps transport failures and non-success statuses to [`ServiceError`].
async fn check_status(result: reqwest::Result<Response>) -> ServiceResult<Response> {
    let response = result.map_err(|e| ServiceError::Transport(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl TenantService for HttpTenantService {
    async fn list_tenants(&self, collection: &str) -> ServiceResult<Vec<Tenant>> {
        let url = self.tenants_endpoint(collection)?;
        let response = check_status(self.client.get(url).send().await).await?;
        let tenants: Vec<Tenant> = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        debug!(collection, count = tenants.len(), "listed tenants");
        Ok(tenants)
    }

    async fn update_tenant_status(
        &self,
        collection: &str,
        tenant: &str,
        status: ActivityStatus,
    ) -> ServiceResult<()> {
        let url = self.tenants_endpoint(collection)?;
        let body = [TenantUpdate {
            name: tenant,
            activity_status: status,
        }];
        check_status(self.client.put(url).json(&body).send().await).await?;
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> ServiceResult<SearchResponse> {
        let url = self.endpoint("v1/graphql")?;
        let body = GraphQlRequest {
            query: near_vector_query(request),
        };
        let response = check_status(self.client.post(url).json(&body).send().await).await?;
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(parse_search_response(&request.collection, &payload))
    }
}

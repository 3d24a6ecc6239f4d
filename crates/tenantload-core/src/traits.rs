use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;
use crate::tenant::{ActivityStatus, Tenant};

/// Tenant-scoped nearest-vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Collection (class) to search.
    pub collection: String,
    /// Tenant the search is scoped to.
    pub tenant: String,
    /// Maximum number of hits.
    pub limit: usize,
    /// Query vector.
    pub vector: Vec<f32>,
}

/// Application-level error embedded in an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Error message reported by the service.
    pub message: String,
}

/// Search response. Hits are counted but never interpreted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Number of hits returned.
    pub hits: usize,
    /// Embedded application errors, in the order the service reported them.
    pub errors: Vec<ResponseError>,
}

impl SearchResponse {
    /// Response carrying `hits` results and no errors.
    #[must_use]
    pub fn with_hits(hits: usize) -> Self {
        Self {
            hits,
            errors: Vec::new(),
        }
    }

    /// First embedded error, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&ResponseError> {
        self.errors.first()
    }
}

/// The three operations the harness needs from the data service.
#[async_trait]
pub trait TenantService: Send + Sync {
    /// Lists the tenants of a collection.
    async fn list_tenants(&self, collection: &str) -> ServiceResult<Vec<Tenant>>;

    /// Sets the activity status of one tenant.
    async fn update_tenant_status(
        &self,
        collection: &str,
        tenant: &str,
        status: ActivityStatus,
    ) -> ServiceResult<()>;

    /// Runs a tenant-scoped similarity search.
    async fn search(&self, request: &SearchRequest) -> ServiceResult<SearchResponse>;
}

//! Core domain types and traits for the tenantload harness.

pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod tenant;
pub mod traits;
pub mod vector;

pub use config::HarnessConfig;
pub use error::{
    HarnessError, HarnessResult, LifecycleError, QueryError, QueryFailure, ServiceError,
    ServiceResult,
};
pub use report::{LatencyReport, QuerySample};
pub use tenant::{ActivityStatus, Tenant, TenantPool};
pub use traits::{ResponseError, SearchRequest, SearchResponse, TenantService};
pub use vector::{RngSource, VectorGenerator, VectorRange};

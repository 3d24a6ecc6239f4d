use thiserror::Error;

/// Failure reported by the transport layer of a [`TenantService`](crate::TenantService).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The request never produced a response (connect, reset, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenient result alias for service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Why a single similarity query failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryFailure {
    /// The transport call itself failed.
    #[error(transparent)]
    Transport(#[from] ServiceError),

    /// The service answered but embedded an application-level error.
    #[error("application error: {0}")]
    Application(String),

    /// The worker running the query panicked or was aborted.
    #[error("worker aborted: {0}")]
    WorkerAborted(String),
}

/// A failed similarity query against one tenant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("query against tenant `{tenant}` failed: {failure}")]
pub struct QueryError {
    /// Tenant the query was scoped to.
    pub tenant: String,
    /// Underlying cause.
    pub failure: QueryFailure,
}

impl QueryError {
    /// Creates a `QueryError` for the given tenant.
    #[must_use]
    pub fn new(tenant: impl Into<String>, failure: impl Into<QueryFailure>) -> Self {
        Self {
            tenant: tenant.into(),
            failure: failure.into(),
        }
    }

    /// Returns `true` when the error came from the response payload rather than the transport.
    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self.failure, QueryFailure::Application(_))
    }
}

/// Failure that terminates one simulated user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Activating the tenant (COLD -> HOT) failed.
    #[error("failed to activate tenant `{tenant}`: {source}")]
    Activate {
        /// Tenant being activated.
        tenant: String,
        /// Underlying service error.
        source: ServiceError,
    },

    /// A query inside the querying loop failed.
    #[error("query loop aborted: {0}")]
    Query(#[from] QueryError),

    /// Deactivating the tenant (HOT -> COLD) failed.
    #[error("failed to deactivate tenant `{tenant}`: {source}")]
    Deactivate {
        /// Tenant being deactivated.
        tenant: String,
        /// Underlying service error.
        source: ServiceError,
    },

    /// The user task panicked or was aborted before reaching a terminal state.
    #[error("user task for tenant `{tenant}` aborted: {message}")]
    Aborted {
        /// Tenant assigned to the task.
        tenant: String,
        /// Join error details.
        message: String,
    },
}

impl LifecycleError {
    /// Tenant the failing user was assigned to.
    #[must_use]
    pub fn tenant(&self) -> &str {
        match self {
            Self::Activate { tenant, .. }
            | Self::Deactivate { tenant, .. }
            | Self::Aborted { tenant, .. } => tenant,
            Self::Query(err) => &err.tenant,
        }
    }

    /// Short phase label used in logs and metrics.
    #[must_use]
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Query(_) => "query",
            Self::Deactivate { .. } => "deactivate",
            Self::Aborted { .. } => "aborted",
        }
    }
}

/// Canonical error type for harness runs.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The service client could not be constructed or reached. Fatal.
    #[error("connection error: {message}")]
    Connection {
        /// Human-readable details.
        message: String,
    },

    /// Listing the tenants of the target collection failed. Fatal.
    #[error("failed to fetch tenants for collection `{collection}`: {source}")]
    TenantFetch {
        /// Collection whose tenants were requested.
        collection: String,
        /// Underlying service error.
        source: ServiceError,
    },

    /// The tenant pool is empty. Fatal precondition.
    #[error("no tenants found for collection `{collection}`")]
    EmptyTenantSet {
        /// Collection that has no (matching) tenants.
        collection: String,
    },

    /// A batch produced no durations to reduce.
    #[error("cannot reduce an empty batch")]
    EmptyBatch,

    /// Per-call query failure.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Per-user lifecycle failure.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error (metrics listener, config template, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Creates a `Connection` variant.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a `TenantFetch` variant.
    #[must_use]
    pub fn tenant_fetch(collection: impl Into<String>, source: ServiceError) -> Self {
        Self::TenantFetch {
            collection: collection.into(),
            source,
        }
    }

    /// Creates an `EmptyTenantSet` variant.
    #[must_use]
    pub fn empty_tenant_set(collection: impl Into<String>) -> Self {
        Self::EmptyTenantSet {
            collection: collection.into(),
        }
    }

    /// Returns `true` for errors that must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Query(_) | Self::Lifecycle(_))
    }
}

/// Convenient result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

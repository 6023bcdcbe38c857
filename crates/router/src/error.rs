//! Error types for the tenant router.
//!
//! Errors are grouped by category the same way callers need to react to them:
//! tenant resolution, configuration, record lookups, validation and backend
//! failures. Every category is wrapped by [`RouterError`] so the calling layer
//! can match on the kind it cares about without losing detail.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::registry::RegistryKey;

/// The primary error type for all router operations.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Tenant resolution errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Configuration errors (raised while building a router)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Record lookup errors
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend and connection errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The router stopped admitting operations.
    #[error("router is shutting down")]
    ShuttingDown,
}

impl RouterError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::Tenant(_) => ErrorKind::BadRequest,
            RouterError::Config(_) => ErrorKind::Configuration,
            RouterError::Record(RecordError::NotFound { .. }) => ErrorKind::NotFound,
            RouterError::Record(RecordError::AlreadyExists { .. }) => ErrorKind::Conflict,
            RouterError::Validation(_) => ErrorKind::BadRequest,
            RouterError::Backend(BackendError::ConnectionFailed { .. })
            | RouterError::Backend(BackendError::RegistryClosed)
            | RouterError::ShuttingDown => ErrorKind::Unavailable,
            RouterError::Backend(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if this is a [`RecordError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RouterError::Record(RecordError::NotFound { .. }))
    }

    /// Returns `true` if the tenant could not be resolved from the context.
    pub fn is_missing_tenant(&self) -> bool {
        matches!(self, RouterError::Tenant(TenantError::MissingTenantContext { .. }))
    }
}

/// Coarse error classification used to map failures to caller responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller sent something unusable (400).
    BadRequest,
    /// Nothing matched in the caller's tenant scope (404).
    NotFound,
    /// A uniqueness rule was violated (409).
    Conflict,
    /// Storage is unreachable or the router is closing (503).
    Unavailable,
    /// The router was misconfigured.
    Configuration,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::BadRequest => write!(f, "bad-request"),
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Unavailable => write!(f, "unavailable"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Errors related to tenant resolution.
#[derive(Error, Debug)]
pub enum TenantError {
    /// No usable tenant identifier was found in the operation context.
    #[error("missing tenant id in operation context (expected '{field}')")]
    MissingTenantContext { field: String },

    /// The tenant id cannot be used to name a physical database.
    #[error("tenant id '{tenant}' cannot name a database: {reason}")]
    InvalidDatabaseName { tenant: String, reason: String },
}

/// Errors raised while building a router from its configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configured isolation strategy is not recognized.
    #[error("unknown isolation strategy: '{strategy}'")]
    UnknownStrategy { strategy: String },

    /// Per-database isolation needs a way to name tenant databases.
    #[error("per-database strategy requires a tenant database name function or prefix")]
    MissingTenantDbName,

    /// The base URI is empty.
    #[error("base uri must not be empty")]
    MissingBaseUri,

    /// The tenant header name is not a valid header name.
    #[error("invalid tenant header name: '{header}'")]
    InvalidTenantHeader { header: String },

    /// The same entity name was registered twice.
    #[error("entity registered twice: {entity}")]
    DuplicateEntity { entity: String },

    /// Other invalid settings.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors related to records in a tenant's scope.
#[derive(Error, Debug)]
pub enum RecordError {
    /// No record matched in the caller's tenant scope.
    ///
    /// Covers both "absent" and "owned by another tenant".
    #[error("record not found: {entity}/{id}")]
    NotFound { entity: String, id: String },

    /// A record violating a uniqueness rule already exists.
    #[error("record already exists: {entity} with {field} = '{value}'")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },
}

/// Errors related to entity schemas and record validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The entity name is not registered with the repository.
    #[error("unknown entity: {entity}")]
    UnknownEntity { entity: String },

    /// A field required by the entity schema is missing.
    #[error("missing required field '{field}' for {entity}")]
    MissingRequiredField { entity: String, field: String },

    /// The record content is invalid.
    #[error("invalid {entity} record: {message}")]
    InvalidRecord { entity: String, message: String },
}

/// Errors originating from connections and the storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Opening a connection for a registry key failed.
    #[error("connection failed for {key} ({uri}): {message}")]
    ConnectionFailed {
        key: RegistryKey,
        uri: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The connection registry has been closed.
    #[error("connection registry is closed")]
    RegistryClosed,

    /// The connection was used after being closed.
    #[error("connection to {uri} is closed")]
    ConnectionClosed { uri: String },

    /// Query execution error.
    #[error("query failed on {namespace}: {message}")]
    QueryError { namespace: String, message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for BackendError {
    fn from(err: mongodb::error::Error) -> Self {
        BackendError::Internal {
            backend_name: "mongodb".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantId;

    #[test]
    fn test_not_found_display() {
        let err = RouterError::Record(RecordError::NotFound {
            entity: "Order".to_string(),
            id: "123".to_string(),
        });
        assert_eq!(err.to_string(), "record not found: Order/123");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_tenant_kind() {
        let err: RouterError = TenantError::MissingTenantContext {
            field: "x-tenant-id".to_string(),
        }
        .into();
        assert!(err.is_missing_tenant());
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.to_string().contains("x-tenant-id"));
    }

    #[test]
    fn test_connection_failure_kind() {
        let err: RouterError = BackendError::ConnectionFailed {
            key: RegistryKey::Tenant(TenantId::new("acme")),
            uri: "db://host/tenant_acme".to_string(),
            message: "refused".to_string(),
            source: None,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("tenant:acme"));
    }

    #[test]
    fn test_unknown_strategy_display() {
        let err = ConfigError::UnknownStrategy {
            strategy: "schema".to_string(),
        };
        assert_eq!(err.to_string(), "unknown isolation strategy: 'schema'");
        assert_eq!(RouterError::from(err).kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not-found");
        assert_eq!(ErrorKind::Unavailable.to_string(), "unavailable");
    }
}

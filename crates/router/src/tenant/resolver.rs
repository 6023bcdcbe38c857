//! Tenant resolution from the operation context.
//!
//! Provides the [`TenantResolver`] trait and the header-based implementation
//! used by default.

use std::fmt::Debug;

use http::header::HeaderName;

use super::context::{OperationContext, X_TENANT_ID};
use super::id::TenantId;
use crate::error::{ConfigError, TenantError};

/// Extracts the tenant identity from an operation context.
///
/// Resolution has no side effects and must succeed before the router touches
/// storage.
pub trait TenantResolver: Send + Sync + Debug {
    /// Resolves the tenant for this operation.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::MissingTenantContext`] if the context does not
    /// identify a tenant.
    fn resolve(&self, context: &OperationContext) -> Result<TenantId, TenantError>;
}

/// Reads the tenant id from a request header (default `x-tenant-id`).
///
/// The header value is passed through unchanged; only emptiness is rejected.
#[derive(Debug, Clone)]
pub struct HeaderTenantResolver {
    header: HeaderName,
}

impl HeaderTenantResolver {
    /// Creates a resolver reading the default `x-tenant-id` header.
    pub fn new() -> Self {
        Self {
            header: X_TENANT_ID.clone(),
        }
    }

    /// Creates a resolver reading a custom header.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTenantHeader`] if `header` is not a valid
    /// header name.
    pub fn with_header(header: &str) -> Result<Self, ConfigError> {
        let header = HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
            ConfigError::InvalidTenantHeader {
                header: header.to_string(),
            }
        })?;
        Ok(Self { header })
    }

    /// Returns the header this resolver reads.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for HeaderTenantResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantResolver for HeaderTenantResolver {
    fn resolve(&self, context: &OperationContext) -> Result<TenantId, TenantError> {
        let missing = || TenantError::MissingTenantContext {
            field: self.header.as_str().to_string(),
        };

        let value = context
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(missing)?;

        TenantId::parse(value).map_err(|_| missing())
    }
}

//! Tenant identifier type.
//!
//! This module defines the [`TenantId`] type, an opaque non-empty identifier
//! for tenants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TenantError;

/// An opaque tenant identifier.
///
/// The router never interprets a tenant id: it is copied onto every record
/// created under it, used as a registry key for per-database isolation, and
/// embedded into namespace names for per-collection isolation.
///
/// # Examples
///
/// ```
/// use tenant_router::tenant::TenantId;
///
/// let tenant = TenantId::new("acme");
/// assert_eq!(tenant.as_str(), "acme");
///
/// assert!(TenantId::parse("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant ID from a string the caller knows to be non-empty.
    ///
    /// Use [`TenantId::parse`] for external input.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses a tenant ID from external input, rejecting empty values.
    ///
    /// Whitespace-only input counts as empty. The value is otherwise kept
    /// exactly as given.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::MissingTenantContext`] if `id` is empty.
    pub fn parse(id: impl Into<String>) -> Result<Self, TenantError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TenantError::MissingTenantContext {
                field: "tenantId".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantId::parse(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_creation() {
        let tenant = TenantId::new("my-tenant");
        assert_eq!(tenant.as_str(), "my-tenant");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(TenantId::parse("").is_err());
        assert!(TenantId::parse("   ").is_err());
        assert!("".parse::<TenantId>().is_err());
    }

    #[test]
    fn test_parse_keeps_value_untouched() {
        let tenant = TenantId::parse(" Acme Corp ").unwrap();
        assert_eq!(tenant.as_str(), " Acme Corp ");
    }

    #[test]
    fn test_serde_roundtrip() {
        let tenant = TenantId::new("acme");
        let json = serde_json::to_string(&tenant).unwrap();
        assert_eq!(json, "\"acme\"");

        let parsed: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tenant);
    }

    #[test]
    fn test_debug_and_display() {
        let tenant = TenantId::new("acme");
        assert_eq!(tenant.to_string(), "acme");
        assert_eq!(format!("{:?}", tenant), "TenantId(acme)");
    }
}

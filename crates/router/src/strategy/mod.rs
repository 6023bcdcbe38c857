//! Tenant isolation strategies.
//!
//! A strategy decides, for a tenant and a logical entity name, which physical
//! connection serves the operation and which namespace inside it holds the
//! data. Two strategies are supported:
//!
//! - [`IsolationStrategy::PerDatabase`] - Separate database per tenant
//! - [`IsolationStrategy::PerCollection`] - One shared database, one
//!   collection per (entity, tenant) pair
//!
//! # Choosing a Strategy
//!
//! | Strategy | Isolation | Connections | Namespace |
//! |----------|-----------|-------------|-----------|
//! | Per-Database | Physical | One per active tenant | `<entity>` |
//! | Per-Collection | Logical | One shared | `<entity>_<tenant>` |
//!
//! Whatever the strategy, the repository still filters every query by
//! `tenantId`, so a misrouted namespace can never return another tenant's
//! records.
//!
//! # Example
//!
//! ```
//! use tenant_router::registry::RegistryKey;
//! use tenant_router::strategy::{IsolationStrategy, PerDatabaseStrategy};
//! use tenant_router::tenant::TenantId;
//!
//! let tenant = TenantId::new("acme");
//!
//! let shared = IsolationStrategy::PerCollection;
//! assert_eq!(shared.registry_key(&tenant), RegistryKey::Shared);
//! assert_eq!(shared.namespace(&tenant, "Order"), "Order_acme");
//!
//! let per_db = IsolationStrategy::PerDatabase(PerDatabaseStrategy::with_prefix("tenant_"));
//! assert_eq!(per_db.registry_key(&tenant), RegistryKey::Tenant(tenant.clone()));
//! assert_eq!(per_db.namespace(&tenant, "Order"), "Order");
//! assert_eq!(
//!     per_db.target_uri("db://host", &RegistryKey::Tenant(tenant)),
//!     "db://host/tenant_acme"
//! );
//! ```

mod per_database;

pub use per_database::{
    MAX_DB_NAME_LEN, PerDatabaseStrategy, RESERVED_DB_NAME_CHARS, TenantDbNameFn,
};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::NamespaceStore;
use crate::error::{ConfigError, RouterResult, TenantError};
use crate::registry::{ConnectionHandle, ConnectionRegistry, RegistryKey, TargetUriFn};
use crate::tenant::TenantId;

/// Strategy names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One physical database per tenant.
    PerDatabase,
    /// One shared database with per-tenant collections.
    PerCollection,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::PerDatabase => write!(f, "per_database"),
            StrategyKind::PerCollection => write!(f, "per_collection"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_database" | "per-database" | "database" => Ok(StrategyKind::PerDatabase),
            "per_collection" | "per-collection" | "collection" => Ok(StrategyKind::PerCollection),
            _ => Err(ConfigError::UnknownStrategy {
                strategy: s.to_string(),
            }),
        }
    }
}

/// The isolation strategy of a router. Fixed for the router's lifetime.
#[derive(Debug, Clone)]
pub enum IsolationStrategy {
    /// Each tenant has a separate database.
    PerDatabase(PerDatabaseStrategy),

    /// All tenants share one database; each (entity, tenant) pair gets its
    /// own collection.
    PerCollection,
}

impl fmt::Display for IsolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

impl IsolationStrategy {
    /// Builds a strategy from its configuration name.
    ///
    /// `per_database` needs a way to name tenant databases; pass `None` for
    /// `per_collection`.
    ///
    /// # Errors
    ///
    /// * `ConfigError::UnknownStrategy` - `name` is not a known strategy.
    /// * `ConfigError::MissingTenantDbName` - `per_database` without naming.
    pub fn from_name(
        name: &str,
        per_database: Option<PerDatabaseStrategy>,
    ) -> Result<Self, ConfigError> {
        match name.parse::<StrategyKind>()? {
            StrategyKind::PerDatabase => per_database
                .map(IsolationStrategy::PerDatabase)
                .ok_or(ConfigError::MissingTenantDbName),
            StrategyKind::PerCollection => Ok(IsolationStrategy::PerCollection),
        }
    }

    /// Returns the kind of this strategy.
    pub fn kind(&self) -> StrategyKind {
        match self {
            IsolationStrategy::PerDatabase(_) => StrategyKind::PerDatabase,
            IsolationStrategy::PerCollection => StrategyKind::PerCollection,
        }
    }

    /// Returns the registry key serving `tenant`.
    pub fn registry_key(&self, tenant: &TenantId) -> RegistryKey {
        match self {
            IsolationStrategy::PerDatabase(_) => RegistryKey::Tenant(tenant.clone()),
            IsolationStrategy::PerCollection => RegistryKey::Shared,
        }
    }

    /// Returns the physical namespace holding `entity` records of `tenant`.
    pub fn namespace(&self, tenant: &TenantId, entity: &str) -> String {
        match self {
            IsolationStrategy::PerDatabase(_) => entity.to_string(),
            IsolationStrategy::PerCollection => format!("{}_{}", entity, tenant),
        }
    }

    /// Returns the URI to connect to for `key`, relative to `base_uri`.
    pub fn target_uri(&self, base_uri: &str, key: &RegistryKey) -> String {
        match (self, key) {
            (IsolationStrategy::PerDatabase(naming), RegistryKey::Tenant(tenant)) => {
                naming.target_uri(base_uri, tenant)
            }
            _ => base_uri.to_string(),
        }
    }

    /// Returns a target-uri function suitable for a [`ConnectionRegistry`].
    pub fn target_uri_fn(&self, base_uri: impl Into<String>) -> TargetUriFn {
        let strategy = self.clone();
        let base_uri = base_uri.into();
        Arc::new(move |key: &RegistryKey| strategy.target_uri(&base_uri, key))
    }

    /// Checks that `tenant` can be routed under this strategy.
    ///
    /// Per-database routing puts the tenant's database name into the target
    /// URI, so the name must pass
    /// [`PerDatabaseStrategy::checked_database_name`]. Per-collection routing
    /// never puts the tenant into a URI.
    pub fn check_tenant(&self, tenant: &TenantId) -> Result<(), TenantError> {
        match self {
            IsolationStrategy::PerDatabase(naming) => {
                naming.checked_database_name(tenant).map(|_| ())
            }
            IsolationStrategy::PerCollection => Ok(()),
        }
    }

    /// Resolves the physical target of one operation.
    ///
    /// This is the only place where a connection is acquired for data access.
    /// The result is never cached.
    ///
    /// # Errors
    ///
    /// * `TenantError::InvalidDatabaseName` - The tenant cannot name a
    ///   database; nothing is connected.
    /// * `BackendError` - Connection failures from the registry.
    pub async fn resolve_target(
        &self,
        registry: &ConnectionRegistry,
        tenant: &TenantId,
        entity: &str,
    ) -> RouterResult<PhysicalTarget> {
        self.check_tenant(tenant)?;
        let key = self.registry_key(tenant);
        let connection = registry.get_connection(&key).await?;
        Ok(PhysicalTarget {
            connection,
            namespace: self.namespace(tenant, entity),
        })
    }
}

/// The (connection, namespace) pair an operation runs against.
#[derive(Debug, Clone)]
pub struct PhysicalTarget {
    connection: ConnectionHandle,
    namespace: String,
}

impl PhysicalTarget {
    /// Returns the connection handle.
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Returns the physical namespace name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the CRUD primitive for this target.
    pub fn store(&self) -> Arc<dyn NamespaceStore> {
        self.connection.namespace(&self.namespace)
    }
}

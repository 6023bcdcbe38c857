//! Multi-Tenant Data Access Router
//!
//! This crate decides where a tenant's data physically lives and makes sure
//! every operation is scoped to the tenant that issued it. It sits between
//! request handling and a document store: callers pass an entity name, their
//! data and an operation context; the router resolves the tenant, picks the
//! physical database and collection, and runs the operation with the tenant
//! filter applied.
//!
//! # Features
//!
//! - **Two isolation strategies**: database-per-tenant and collection-per-tenant
//! - **Lazy connections**: one connection per registry key, opened on first use
//!   and closed exactly once at shutdown
//! - **Isolation by construction**: `tenantId` is forced on create and always
//!   part of the filter on read, update and delete
//! - **Tenant-scoped users**: user management with pluggable password hashing
//! - **Graceful shutdown**: admission stops, in-flight work drains, then
//!   connections close
//!
//! # Backend Features
//!
//! - `memory` (default) - In-process document store
//! - `mongodb` - MongoDB via the official driver
//!
//! # Architecture
//!
//! - [`tenant`] - Tenant identity, operation context and resolution
//! - [`core`] - Storage traits consumed by the router
//! - [`registry`] - Connection cache keyed by tenant or shared key
//! - [`strategy`] - Isolation strategies (per-database, per-collection)
//! - [`repository`] - Tenant-scoped CRUD over registered entities
//! - [`users`] - Tenant-scoped user directory
//! - [`error`] - Error types for all operations
//! - [`backends`] - Storage backend implementations
//!
//! # Quick Start
//!
//! ```
//! # #[cfg(feature = "memory")]
//! # fn main() {
//! use std::sync::Arc;
//! use tenant_router::backends::memory::MemoryConnector;
//! use tenant_router::repository::EntitySchema;
//! use tenant_router::tenant::OperationContext;
//! use tenant_router::{RouterConfig, TenantRouter};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let config = RouterConfig {
//!     strategy: "per_database".to_string(),
//!     base_uri: "mem://host".to_string(),
//!     tenant_db_prefix: Some("tenant_".to_string()),
//!     ..Default::default()
//! };
//! let router = TenantRouter::builder(config, Arc::new(MemoryConnector::new()))
//!     .entity(EntitySchema::new("Order").require("amount"))
//!     .build()
//!     .unwrap();
//!
//! let acme = OperationContext::for_tenant("acme").unwrap();
//! let globex = OperationContext::for_tenant("globex").unwrap();
//!
//! let data = json!({"amount": 10}).as_object().cloned().unwrap();
//! let order = router.create("Order", data, &acme).await.unwrap();
//! let id = order.id().unwrap();
//!
//! // The owner can read it; another tenant cannot even see it
//! assert!(router.read("Order", id, &acme).await.is_ok());
//! assert!(router.read("Order", id, &globex).await.unwrap_err().is_not_found());
//!
//! router.shutdown().await;
//! # });
//! # }
//! # #[cfg(not(feature = "memory"))]
//! # fn main() {}
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod registry;
pub mod repository;
mod router;
pub mod strategy;
pub mod tenant;
pub mod users;

// Re-export commonly used types at crate root
pub use config::RouterConfig;
pub use error::{ErrorKind, RouterError, RouterResult};
pub use router::{TenantRouter, TenantRouterBuilder};
pub use tenant::{OperationContext, TenantId};

// Re-export core traits
pub use core::{BackendKind, NamespaceStore, StorageConnection, StorageConnector};

pub use registry::{ConnectionHandle, ConnectionRegistry, RegistryKey};
pub use repository::{EntitySchema, Record, TenantRepository};
pub use strategy::{IsolationStrategy, PhysicalTarget, StrategyKind};
pub use users::{NewUser, PasswordHasher, User, UserDirectory, UserUpdate};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Shared helpers for router integration tests.
//!
//! Every test runs against the in-memory backend so that connect and close
//! calls can be counted and stored documents inspected directly.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;

use tenant_router::backends::memory::MemoryConnector;
use tenant_router::core::Document;
use tenant_router::repository::EntitySchema;
use tenant_router::tenant::OperationContext;
use tenant_router::users::PasswordHasher;
use tenant_router::{RouterConfig, TenantRouter};

/// Base URI used by per-collection routers.
pub const SHARED_URI: &str = "mem://host";

/// Base URI used by per-database routers.
pub const DB_BASE_URI: &str = "db://host";

/// Creates an operation context carrying `id` in the tenant header.
pub fn create_tenant(id: &str) -> OperationContext {
    OperationContext::for_tenant(id).expect("valid tenant header value")
}

/// Converts a JSON object literal into a document.
pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("JSON object")
}

pub fn per_collection_config() -> RouterConfig {
    RouterConfig {
        strategy: "per_collection".to_string(),
        base_uri: SHARED_URI.to_string(),
        ..RouterConfig::for_testing()
    }
}

pub fn per_database_config() -> RouterConfig {
    RouterConfig {
        strategy: "per_database".to_string(),
        base_uri: DB_BASE_URI.to_string(),
        tenant_db_prefix: Some("tenant_".to_string()),
        ..RouterConfig::for_testing()
    }
}

/// Entity schemas registered on every test router.
pub fn test_entities() -> Vec<EntitySchema> {
    vec![
        EntitySchema::new("Order").require("amount"),
        EntitySchema::new("AuditEvent").without_timestamps(),
        EntitySchema::tenant(),
    ]
}

/// Builds a router over `connector` with the test entities and user support.
pub fn create_router(config: RouterConfig, connector: Arc<MemoryConnector>) -> TenantRouter {
    TenantRouter::builder(config, connector)
        .entities(test_entities())
        .password_hasher(Arc::new(ReversingHasher))
        .build()
        .expect("Failed to build router")
}

/// A deterministic stand-in for a real password hash.
#[derive(Debug)]
pub struct ReversingHasher;

impl PasswordHasher for ReversingHasher {
    fn hash(&self, plain: &str) -> String {
        format!("hashed:{}", plain.chars().rev().collect::<String>())
    }

    fn verify(&self, plain: &str, hash: &str) -> bool {
        self.hash(plain) == hash
    }
}

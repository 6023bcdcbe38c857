//! Tests for tenant data isolation.
//!
//! These tests verify that every repository operation is confined to the
//! caller's tenant under both isolation strategies, and that caller-supplied
//! identity fields can never move a record into another tenant.

#![cfg(feature = "memory")]

mod common;

use std::sync::Arc;

use serde_json::json;

use tenant_router::backends::memory::MemoryConnector;
use tenant_router::core::Filter;
use tenant_router::error::{ErrorKind, RouterError, TenantError, ValidationError};
use tenant_router::tenant::OperationContext;

use common::{
    DB_BASE_URI, SHARED_URI, create_router, create_tenant, doc, per_collection_config,
    per_database_config,
};

// ============================================================================
// Per-Collection Scenario
// ============================================================================

/// Tenant A's order lands in `Order_A` and is invisible to tenant B.
#[tokio::test]
async fn test_per_collection_scenario() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector.clone());

    let tenant_a = create_tenant("A");
    let tenant_b = create_tenant("B");

    let created = router
        .create("Order", doc(json!({"amount": 10})), &tenant_a)
        .await
        .unwrap();
    let id = created.id().unwrap().to_string();
    assert_eq!(created.tenant_id(), Some("A"));

    // Stored in the tenant's own collection on the shared database
    let stored = connector.documents(SHARED_URI, "Order_A");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("tenantId"), Some(&json!("A")));
    assert_eq!(stored[0].get("amount"), Some(&json!(10)));

    // Owner can read it
    let read = router.read("Order", &id, &tenant_a).await.unwrap();
    assert_eq!(read.get("amount"), Some(&json!(10)));

    // Another tenant gets NotFound
    let err = router.read("Order", &id, &tenant_b).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // One shared connection for both tenants
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(router.registry().open_count(), 1);
}

// ============================================================================
// Per-Database Scenario
// ============================================================================

/// Tenant X's first create opens `db://host/tenant_X`; later creates reuse it.
#[tokio::test]
async fn test_per_database_scenario() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_database_config(), connector.clone());

    let tenant_x = create_tenant("X");

    router
        .create("Order", doc(json!({"amount": 1})), &tenant_x)
        .await
        .unwrap();
    assert_eq!(connector.connect_count_for("db://host/tenant_X"), 1);

    router
        .create("Order", doc(json!({"amount": 2})), &tenant_x)
        .await
        .unwrap();
    assert_eq!(connector.connect_count_for("db://host/tenant_X"), 1);
    assert_eq!(connector.connect_count(), 1);

    // The namespace is the bare entity name inside the tenant database
    assert_eq!(connector.namespaces("db://host/tenant_X"), vec!["Order"]);
    assert_eq!(connector.documents("db://host/tenant_X", "Order").len(), 2);
}

/// Each tenant gets its own database and connection.
#[tokio::test]
async fn test_per_database_separates_tenants() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_database_config(), connector.clone());

    let tenant_x = create_tenant("X");
    let tenant_y = create_tenant("Y");

    let created = router
        .create("Order", doc(json!({"amount": 5})), &tenant_x)
        .await
        .unwrap();
    let id = created.id().unwrap();

    let err = router.read("Order", id, &tenant_y).await.unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(connector.connect_count(), 2);
    assert!(connector.documents("db://host/tenant_Y", "Order").is_empty());
    assert_eq!(
        router.registry().open_count(),
        2,
        "one connection per active tenant"
    );
    assert!(!connector.connected_uris().iter().any(|u| u == DB_BASE_URI));
}

// ============================================================================
// Cross-Tenant Access Tests
// ============================================================================

/// Update and delete from another tenant fail and leave the record untouched.
#[tokio::test]
async fn test_cross_tenant_update_and_delete() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector.clone());

    let tenant_a = create_tenant("A");
    let tenant_b = create_tenant("B");

    let created = router
        .create("Order", doc(json!({"amount": 10})), &tenant_a)
        .await
        .unwrap();
    let id = created.id().unwrap();

    let err = router
        .update("Order", id, doc(json!({"amount": 99})), &tenant_b)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = router.delete("Order", id, &tenant_b).await.unwrap_err();
    assert!(err.is_not_found());

    let read = router.read("Order", id, &tenant_a).await.unwrap();
    assert_eq!(read.get("amount"), Some(&json!(10)));
}

/// Under per-database isolation the same holds, even with matching ids.
#[tokio::test]
async fn test_cross_tenant_access_per_database() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_database_config(), connector);

    let tenant_a = create_tenant("A");
    let tenant_b = create_tenant("B");

    let created = router
        .create("Order", doc(json!({"amount": 10})), &tenant_a)
        .await
        .unwrap();
    let id = created.id().unwrap();

    assert!(router.read("Order", id, &tenant_b).await.unwrap_err().is_not_found());
    assert!(
        router
            .update("Order", id, doc(json!({"amount": 0})), &tenant_b)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(router.delete("Order", id, &tenant_b).await.unwrap_err().is_not_found());
}

/// A missing record and another tenant's record look the same.
#[tokio::test]
async fn test_absent_and_foreign_are_indistinguishable() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector);

    let tenant_a = create_tenant("A");
    let tenant_b = create_tenant("B");

    let created = router
        .create("Order", doc(json!({"amount": 10})), &tenant_a)
        .await
        .unwrap();

    let foreign = router
        .read("Order", created.id().unwrap(), &tenant_b)
        .await
        .unwrap_err();
    let absent = router.read("Order", "no-such-id", &tenant_b).await.unwrap_err();

    assert_eq!(foreign.kind(), absent.kind());
    assert!(matches!(foreign, RouterError::Record(_)));
}

// ============================================================================
// Id Forgery Tests
// ============================================================================

/// A forged tenantId on create is overwritten with the resolved tenant.
#[tokio::test]
async fn test_create_ignores_forged_tenant() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector.clone());

    let tenant_a = create_tenant("A");
    let tenant_b = create_tenant("B");

    let created = router
        .create(
            "Order",
            doc(json!({"amount": 10, "tenantId": "B"})),
            &tenant_a,
        )
        .await
        .unwrap();
    assert_eq!(created.tenant_id(), Some("A"));

    assert!(connector.documents(SHARED_URI, "Order_B").is_empty());
    assert!(
        router
            .read("Order", created.id().unwrap(), &tenant_b)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

/// A caller-supplied _id is replaced by a generated one.
#[tokio::test]
async fn test_create_generates_id() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector);

    let tenant = create_tenant("A");

    let first = router
        .create("Order", doc(json!({"_id": "chosen", "amount": 1})), &tenant)
        .await
        .unwrap();
    let second = router
        .create("Order", doc(json!({"_id": "chosen", "amount": 2})), &tenant)
        .await
        .unwrap();

    assert_ne!(first.id(), Some("chosen"));
    assert_ne!(first.id(), second.id());
}

/// Update never changes tenantId or _id.
#[tokio::test]
async fn test_update_keeps_identity() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector);

    let tenant_a = create_tenant("A");
    let tenant_b = create_tenant("B");

    let created = router
        .create("Order", doc(json!({"amount": 10})), &tenant_a)
        .await
        .unwrap();
    let id = created.id().unwrap();

    let updated = router
        .update(
            "Order",
            id,
            doc(json!({"amount": 11, "tenantId": "B", "_id": "other"})),
            &tenant_a,
        )
        .await
        .unwrap();

    assert_eq!(updated.tenant_id(), Some("A"));
    assert_eq!(updated.id(), Some(id));
    assert_eq!(updated.get("amount"), Some(&json!(11)));
    assert!(router.read("Order", id, &tenant_b).await.is_err());
}

/// An update carrying only identity fields changes nothing and returns the record.
#[tokio::test]
async fn test_update_with_only_identity_fields() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector);

    let tenant = create_tenant("A");
    let created = router
        .create("Order", doc(json!({"amount": 10})), &tenant)
        .await
        .unwrap();

    let unchanged = router
        .update("Order", created.id().unwrap(), doc(json!({"tenantId": "B"})), &tenant)
        .await
        .unwrap();
    assert_eq!(unchanged, created);
}

// ============================================================================
// find_one Tests
// ============================================================================

/// find_one always applies the caller's tenant, whatever the criteria say.
#[tokio::test]
async fn test_find_one_overrides_tenant_criterion() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector);

    let tenant_a = create_tenant("A");
    let tenant_b = create_tenant("B");

    router
        .create("Order", doc(json!({"amount": 10, "ref": "x"})), &tenant_a)
        .await
        .unwrap();
    router
        .create("Order", doc(json!({"amount": 20, "ref": "x"})), &tenant_b)
        .await
        .unwrap();

    let found = router
        .find_one("Order", Filter::new().eq("ref", "x").eq("tenantId", "A"), &tenant_b)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.tenant_id(), Some("B"));
    assert_eq!(found.get("amount"), Some(&json!(20)));

    let missing = router
        .find_one("Order", Filter::new().eq("ref", "y"), &tenant_a)
        .await
        .unwrap();
    assert!(missing.is_none());
}

// ============================================================================
// Lifecycle of a Record
// ============================================================================

/// Create, read, update and delete within one tenant.
#[tokio::test]
async fn test_crud_round_trip() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_database_config(), connector);

    let tenant = create_tenant("acme");

    let created = router
        .create("Order", doc(json!({"amount": 10, "note": "first"})), &tenant)
        .await
        .unwrap();
    let id = created.id().unwrap();
    assert!(created.created_at().is_some());
    assert_eq!(created.created_at(), created.updated_at());

    let updated = router
        .update("Order", id, doc(json!({"note": "second"})), &tenant)
        .await
        .unwrap();
    assert_eq!(updated.get("note"), Some(&json!("second")));
    assert_eq!(updated.get("amount"), Some(&json!(10)));
    assert!(updated.updated_at() >= created.updated_at());
    assert_eq!(updated.created_at(), created.created_at());

    let deleted = router.delete("Order", id, &tenant).await.unwrap();
    assert_eq!(deleted.id(), Some(id));

    assert!(router.read("Order", id, &tenant).await.unwrap_err().is_not_found());
    assert!(router.delete("Order", id, &tenant).await.unwrap_err().is_not_found());
}

/// Schemas without timestamps get no createdAt/updatedAt.
#[tokio::test]
async fn test_schema_without_timestamps() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector);

    let tenant = create_tenant("A");
    let created = router
        .create("AuditEvent", doc(json!({"action": "login"})), &tenant)
        .await
        .unwrap();

    assert!(created.get("createdAt").is_none());
    assert!(created.get("updatedAt").is_none());
}

// ============================================================================
// Rejection Before Storage Access
// ============================================================================

/// Without a tenant header nothing touches storage.
#[tokio::test]
async fn test_missing_tenant_rejected() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_database_config(), connector.clone());

    let no_tenant = OperationContext::new();

    let err = router
        .create("Order", doc(json!({"amount": 1})), &no_tenant)
        .await
        .unwrap_err();
    assert!(err.is_missing_tenant());
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    assert!(router.read("Order", "1", &no_tenant).await.unwrap_err().is_missing_tenant());
    assert!(
        router
            .find_one("Order", Filter::new(), &no_tenant)
            .await
            .unwrap_err()
            .is_missing_tenant()
    );

    assert_eq!(connector.connect_count(), 0);
}

/// A blank tenant header is as good as none.
#[tokio::test]
async fn test_blank_tenant_rejected() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector.clone());

    let blank = create_tenant("  ");
    let err = router.read("Order", "1", &blank).await.unwrap_err();
    assert!(err.is_missing_tenant());
    assert_eq!(connector.connect_count(), 0);
}

/// Per-database tenants whose ids would rewrite the connection URI are
/// refused, so they can never share the database of the tenant they mimic.
#[tokio::test]
async fn test_unsafe_tenant_id_cannot_reach_another_database() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_database_config(), connector.clone());

    router
        .create("Order", doc(json!({"amount": 1})), &create_tenant("victim"))
        .await
        .unwrap();

    for id in ["victim?appName=evil", "victim?x=1", "a/b", "victim/../admin"] {
        let err = router
            .create("Order", doc(json!({"amount": 2})), &create_tenant(id))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RouterError::Tenant(TenantError::InvalidDatabaseName { .. })),
            "expected rejection for {:?}, got {:?}",
            id,
            err
        );
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    assert_eq!(connector.connected_uris(), vec![format!("{}/tenant_victim", DB_BASE_URI)]);
    assert_eq!(connector.documents(&format!("{}/tenant_victim", DB_BASE_URI), "Order").len(), 1);
}

/// The same ids are fine under per-collection routing, where they never
/// reach a URI.
#[tokio::test]
async fn test_unusual_tenant_id_per_collection() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector.clone());

    let created = router
        .create("Order", doc(json!({"amount": 1})), &create_tenant("a/b"))
        .await
        .unwrap();
    assert_eq!(created.tenant_id(), Some("a/b"));
    assert_eq!(connector.connected_uris(), vec![SHARED_URI]);
}

/// Unregistered entities fail before any connection is opened.
#[tokio::test]
async fn test_unknown_entity_rejected() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_database_config(), connector.clone());

    let tenant = create_tenant("A");
    let err = router
        .create("Invoice", doc(json!({"total": 1})), &tenant)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RouterError::Validation(ValidationError::UnknownEntity { ref entity }) if entity == "Invoice"
    ));
    assert_eq!(connector.connect_count(), 0);
}

/// Required fields are enforced on create.
#[tokio::test]
async fn test_missing_required_field() {
    let connector = Arc::new(MemoryConnector::new());
    let router = create_router(per_collection_config(), connector.clone());

    let tenant = create_tenant("A");
    let err = router
        .create("Order", doc(json!({"note": "no amount"})), &tenant)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RouterError::Validation(ValidationError::MissingRequiredField { ref field, .. }) if field == "amount"
    ));
    assert!(connector.documents(SHARED_URI, "Order_A").is_empty());
}

// ============================================================================
// Concurrent Tenants
// ============================================================================

/// Many tenants writing concurrently each see only their own records.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tenants_stay_isolated() {
    let connector = Arc::new(MemoryConnector::new());
    let router = Arc::new(create_router(per_database_config(), connector.clone()));

    let tenants: Vec<String> = (0..8).map(|i| format!("t{}", i)).collect();
    let mut tasks = Vec::new();

    for tenant in &tenants {
        for n in 0..20 {
            let router = Arc::clone(&router);
            let tenant = tenant.clone();
            tasks.push(tokio::spawn(async move {
                let ctx = create_tenant(&tenant);
                router
                    .create("Order", doc(json!({"amount": n})), &ctx)
                    .await
                    .map(|record| (tenant, record))
            }));
        }
    }

    for task in tasks {
        let (tenant, record) = task.await.unwrap().unwrap();
        assert_eq!(record.tenant_id(), Some(tenant.as_str()));
    }

    assert_eq!(connector.connect_count(), tenants.len());
    for tenant in &tenants {
        let uri = format!("{}/tenant_{}", DB_BASE_URI, tenant);
        let docs = connector.documents(&uri, "Order");
        assert_eq!(docs.len(), 20);
        assert!(docs.iter().all(|d| d.get("tenantId") == Some(&json!(tenant))));
    }
}

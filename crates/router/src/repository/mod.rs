//! Tenant-scoped CRUD.
//!
//! [`TenantRepository`] is the data surface of the router. Every operation
//! resolves the caller's tenant, looks up the entity schema, resolves the
//! physical target through the isolation strategy and then runs against the
//! storage engine with the tenant filter applied.
//!
//! # Isolation
//!
//! - `create` always writes the resolved tenant into `tenantId` and generates
//!   `_id`, whatever the caller sent.
//! - `read`, `update` and `delete` filter by both `_id` and `tenantId`. A
//!   record owned by another tenant is reported as `NotFound`, exactly like a
//!   record that does not exist.
//! - `update` never changes `tenantId` or `_id`.
//! - `find_one` always adds the tenant filter, replacing any caller value.

mod record;
mod schema;

pub use record::{CREATED_AT_FIELD, Record, UPDATED_AT_FIELD};
pub use schema::{EntityRegistry, EntitySchema};

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::{Document, Filter, ID_FIELD, TENANT_FIELD};
use crate::error::{RecordError, RouterResult};
use crate::registry::ConnectionRegistry;
use crate::strategy::{IsolationStrategy, PhysicalTarget};
use crate::tenant::{OperationContext, TenantId, TenantResolver};

/// Everything an operation needs once its tenant and target are known.
struct Route<'a> {
    tenant: TenantId,
    schema: &'a EntitySchema,
    target: PhysicalTarget,
}

/// The tenant-scoped CRUD surface.
#[derive(Debug)]
pub struct TenantRepository {
    resolver: Arc<dyn TenantResolver>,
    strategy: IsolationStrategy,
    registry: Arc<ConnectionRegistry>,
    entities: EntityRegistry,
}

impl TenantRepository {
    /// Creates a repository.
    pub fn new(
        resolver: Arc<dyn TenantResolver>,
        strategy: IsolationStrategy,
        registry: Arc<ConnectionRegistry>,
        entities: EntityRegistry,
    ) -> Self {
        Self {
            resolver,
            strategy,
            registry,
            entities,
        }
    }

    /// Returns the isolation strategy.
    pub fn strategy(&self) -> &IsolationStrategy {
        &self.strategy
    }

    /// Returns the registered entities.
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Creates a record owned by the caller's tenant.
    ///
    /// Caller-supplied `_id` and `tenantId` values are discarded.
    ///
    /// # Errors
    ///
    /// * `TenantError::MissingTenantContext` - No tenant in the context
    /// * `TenantError::InvalidDatabaseName` - Per-database routing cannot name
    ///   the tenant's database
    /// * `ValidationError::UnknownEntity` - `entity` is not registered
    /// * `ValidationError::MissingRequiredField` - A required field is absent
    /// * `BackendError` - Connection or storage failure
    pub async fn create(
        &self,
        entity: &str,
        data: Document,
        ctx: &OperationContext,
    ) -> RouterResult<Record> {
        let route = self.route(entity, ctx).await?;
        let mut doc = data;

        self.strip_forged_tenant(&mut doc, &route.tenant, entity);
        doc.remove(ID_FIELD);
        doc.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
        doc.insert(
            TENANT_FIELD.to_string(),
            Value::String(route.tenant.as_str().to_string()),
        );
        if route.schema.timestamps {
            let now = Value::String(Utc::now().to_rfc3339());
            doc.insert(CREATED_AT_FIELD.to_string(), now.clone());
            doc.insert(UPDATED_AT_FIELD.to_string(), now);
        }
        route.schema.validate(&doc)?;

        let stored = route.target.store().insert(doc).await?;
        let record = Record::from_document(stored);
        debug!(
            tenant = %route.tenant,
            entity = entity,
            id = record.id().unwrap_or_default(),
            "Created record"
        );
        Ok(record)
    }

    /// Reads a record by id within the caller's tenant.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::NotFound` if no record with this id belongs to
    /// the caller's tenant.
    pub async fn read(&self, entity: &str, id: &str, ctx: &OperationContext) -> RouterResult<Record> {
        let route = self.route(entity, ctx).await?;
        let filter = scoped_filter(id, &route.tenant);

        route
            .target
            .store()
            .find_one(&filter)
            .await?
            .map(Record::from_document)
            .ok_or_else(|| not_found(entity, id))
    }

    /// Applies `updates` to a record within the caller's tenant and returns the
    /// record after the update.
    ///
    /// `tenantId` and `_id` keys in `updates` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::NotFound` under the same rule as [`read`](Self::read).
    pub async fn update(
        &self,
        entity: &str,
        id: &str,
        updates: Document,
        ctx: &OperationContext,
    ) -> RouterResult<Record> {
        let route = self.route(entity, ctx).await?;
        let filter = scoped_filter(id, &route.tenant);
        let mut changes = updates;

        self.strip_forged_tenant(&mut changes, &route.tenant, entity);
        changes.remove(ID_FIELD);

        let store = route.target.store();
        let updated = if changes.is_empty() {
            store.find_one(&filter).await?
        } else {
            if route.schema.timestamps {
                changes.insert(
                    UPDATED_AT_FIELD.to_string(),
                    Value::String(Utc::now().to_rfc3339()),
                );
            }
            store.find_one_and_update(&filter, changes).await?
        };

        let record = updated
            .map(Record::from_document)
            .ok_or_else(|| not_found(entity, id))?;
        debug!(tenant = %route.tenant, entity = entity, id = id, "Updated record");
        Ok(record)
    }

    /// Deletes a record within the caller's tenant and returns it.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::NotFound` under the same rule as [`read`](Self::read).
    pub async fn delete(&self, entity: &str, id: &str, ctx: &OperationContext) -> RouterResult<Record> {
        let route = self.route(entity, ctx).await?;
        let filter = scoped_filter(id, &route.tenant);

        let record = route
            .target
            .store()
            .find_one_and_delete(&filter)
            .await?
            .map(Record::from_document)
            .ok_or_else(|| not_found(entity, id))?;
        debug!(tenant = %route.tenant, entity = entity, id = id, "Deleted record");
        Ok(record)
    }

    /// Returns the first record in the caller's tenant matching `criteria`.
    ///
    /// A `tenantId` criterion is always replaced by the caller's tenant.
    pub async fn find_one(
        &self,
        entity: &str,
        criteria: Filter,
        ctx: &OperationContext,
    ) -> RouterResult<Option<Record>> {
        let route = self.route(entity, ctx).await?;
        let filter = criteria.eq(TENANT_FIELD, route.tenant.as_str());

        let found = route.target.store().find_one(&filter).await?;
        Ok(found.map(Record::from_document))
    }

    /// Resolves tenant, schema and physical target for one operation.
    async fn route<'a>(&'a self, entity: &str, ctx: &OperationContext) -> RouterResult<Route<'a>> {
        let tenant = self.resolver.resolve(ctx)?;
        let schema = self.entities.get(entity)?;
        let target = self
            .strategy
            .resolve_target(&self.registry, &tenant, entity)
            .await?;

        debug!(
            tenant = %tenant,
            entity = entity,
            key = %target.connection().key(),
            namespace = target.namespace(),
            correlation_id = ctx.correlation_id().unwrap_or_default(),
            "Routing operation"
        );

        Ok(Route {
            tenant,
            schema,
            target,
        })
    }

    /// Removes a caller-supplied `tenantId`, logging when it names another tenant.
    fn strip_forged_tenant(&self, doc: &mut Document, tenant: &TenantId, entity: &str) {
        if let Some(supplied) = doc.remove(TENANT_FIELD)
            && supplied.as_str() != Some(tenant.as_str())
        {
            warn!(
                tenant = %tenant,
                entity = entity,
                supplied = %supplied,
                "Ignoring caller-supplied tenantId"
            );
        }
    }
}

fn scoped_filter(id: &str, tenant: &TenantId) -> Filter {
    Filter::new()
        .eq(ID_FIELD, id)
        .eq(TENANT_FIELD, tenant.as_str())
}

fn not_found(entity: &str, id: &str) -> crate::error::RouterError {
    RecordError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
    .into()
}

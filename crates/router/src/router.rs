//! The tenant router facade.
//!
//! [`TenantRouter`] wires the resolver, strategy, connection registry,
//! repository and user directory together from a [`RouterConfig`], admits
//! operations while running, and shuts down gracefully.
//!
//! # Example
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
//! let router = TenantRouter::builder(RouterConfig::default(), Arc::new(MemoryConnector::new()))
//!     .entity(EntitySchema::new("Order"))
//!     .build()
//!     .unwrap();
//!
//! let ctx = OperationContext::for_tenant("A").unwrap();
//! let data = json!({"amount": 10}).as_object().cloned().unwrap();
//! let order = router.create("Order", data, &ctx).await.unwrap();
//! assert_eq!(order.tenant_id(), Some("A"));
//!
//! router.shutdown().await;
//! # });
//! # }
//! # #[cfg(not(feature = "memory"))]
//! # fn main() {}
//! ```

use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, OnceCell};
use tracing::{info, warn};

use crate::config::RouterConfig;
use crate::core::{Document, Filter, StorageConnector};
use crate::error::{ConfigError, RouterError, RouterResult};
use crate::registry::ConnectionRegistry;
use crate::repository::{EntityRegistry, EntitySchema, Record, TenantRepository};
use crate::strategy::{IsolationStrategy, PerDatabaseStrategy};
use crate::tenant::{HeaderTenantResolver, OperationContext, TenantId, TenantResolver};
use crate::users::{NewUser, PasswordHasher, USER_ENTITY, User, UserDirectory, UserUpdate};

/// Admits operations until closed and tracks how many are in flight.
#[derive(Debug, Default)]
struct AdmissionGate {
    closed: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
}

/// Held for the duration of one admitted operation.
struct Permit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}

impl AdmissionGate {
    fn enter(&self) -> RouterResult<Permit<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            self.leave();
            return Err(RouterError::ShuttingDown);
        }
        Ok(Permit { gate: self })
    }

    fn leave(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 && self.closed.load(Ordering::SeqCst) {
            self.drained.notify_waiters();
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once no admitted operation is running.
    async fn wait_drained(&self) {
        loop {
            let mut notified = pin!(self.drained.notified());
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Builder for [`TenantRouter`].
pub struct TenantRouterBuilder {
    config: RouterConfig,
    connector: Arc<dyn StorageConnector>,
    entities: Vec<EntitySchema>,
    db_name: Option<PerDatabaseStrategy>,
    resolver: Option<Arc<dyn TenantResolver>>,
    hasher: Option<Arc<dyn PasswordHasher>>,
}

impl fmt::Debug for TenantRouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantRouterBuilder")
            .field("config", &self.config)
            .field("connector", &self.connector)
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}

impl TenantRouterBuilder {
    /// Registers an entity schema.
    pub fn entity(mut self, schema: EntitySchema) -> Self {
        self.entities.push(schema);
        self
    }

    /// Registers several entity schemas.
    pub fn entities(mut self, schemas: impl IntoIterator<Item = EntitySchema>) -> Self {
        self.entities.extend(schemas);
        self
    }

    /// Sets the tenant database naming function for per-database isolation.
    ///
    /// Takes precedence over `tenant_db_prefix` in the configuration.
    pub fn tenant_db_name<F>(mut self, db_name: F) -> Self
    where
        F: Fn(&TenantId) -> String + Send + Sync + 'static,
    {
        self.db_name = Some(PerDatabaseStrategy::new(db_name));
        self
    }

    /// Replaces the header-based tenant resolver.
    pub fn resolver(mut self, resolver: Arc<dyn TenantResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Enables user management with `hasher`.
    ///
    /// Registers the `User` entity unless a schema for it was supplied.
    pub fn password_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Builds the router.
    ///
    /// # Errors
    ///
    /// * `ConfigError::MissingBaseUri` - Empty base URI
    /// * `ConfigError::UnknownStrategy` - Unrecognized strategy name
    /// * `ConfigError::MissingTenantDbName` - Per-database without naming
    /// * `ConfigError::InvalidTenantHeader` - Bad tenant header name
    /// * `ConfigError::DuplicateEntity` - An entity was registered twice
    /// * `ConfigError::Invalid` - Zero connect timeout
    pub fn build(self) -> Result<TenantRouter, ConfigError> {
        let config = self.config;

        if config.base_uri.trim().is_empty() {
            return Err(ConfigError::MissingBaseUri);
        }
        if config.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "connect timeout must be greater than 0".to_string(),
            });
        }

        let naming = self.db_name.or_else(|| config.per_database_naming());
        let strategy = IsolationStrategy::from_name(&config.strategy, naming)?;

        let resolver: Arc<dyn TenantResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HeaderTenantResolver::with_header(&config.tenant_header)?),
        };

        let mut entities = EntityRegistry::from_schemas(self.entities)?;
        if self.hasher.is_some() && !entities.contains(USER_ENTITY) {
            entities.register(EntitySchema::user())?;
        }
        let entity_names: Vec<String> = entities.names().into_iter().map(str::to_string).collect();

        let registry = Arc::new(ConnectionRegistry::new(
            self.connector,
            strategy.target_uri_fn(config.base_uri.clone()),
            config.connect_options(),
        ));
        let repository = Arc::new(TenantRepository::new(
            resolver,
            strategy.clone(),
            Arc::clone(&registry),
            entities,
        ));
        let users = match self.hasher {
            Some(hasher) => Some(UserDirectory::new(Arc::clone(&repository), hasher)?),
            None => None,
        };

        info!(
            strategy = %strategy,
            entities = ?entity_names,
            users = users.is_some(),
            "Tenant router ready"
        );

        Ok(TenantRouter {
            repository,
            registry,
            users,
            gate: AdmissionGate::default(),
            shutdown: OnceCell::new(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }
}

/// The multi-tenant data access router.
#[derive(Debug)]
pub struct TenantRouter {
    repository: Arc<TenantRepository>,
    registry: Arc<ConnectionRegistry>,
    users: Option<UserDirectory>,
    gate: AdmissionGate,
    shutdown: OnceCell<()>,
    shutdown_timeout: Duration,
}

impl TenantRouter {
    /// Starts building a router over `connector`.
    pub fn builder(config: RouterConfig, connector: Arc<dyn StorageConnector>) -> TenantRouterBuilder {
        TenantRouterBuilder {
            config,
            connector,
            entities: Vec::new(),
            db_name: None,
            resolver: None,
            hasher: None,
        }
    }

    /// Returns the isolation strategy.
    pub fn strategy(&self) -> &IsolationStrategy {
        self.repository.strategy()
    }

    /// Returns the connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Returns the tenant-scoped repository, bypassing admission control.
    pub fn repository(&self) -> &TenantRepository {
        &self.repository
    }

    /// Returns `true` while operations are admitted.
    pub fn is_accepting(&self) -> bool {
        !self.gate.is_closed()
    }

    /// Returns the number of operations currently running.
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// See [`TenantRepository::create`].
    pub async fn create(
        &self,
        entity: &str,
        data: Document,
        ctx: &OperationContext,
    ) -> RouterResult<Record> {
        let _permit = self.gate.enter()?;
        self.repository.create(entity, data, ctx).await
    }

    /// See [`TenantRepository::read`].
    pub async fn read(&self, entity: &str, id: &str, ctx: &OperationContext) -> RouterResult<Record> {
        let _permit = self.gate.enter()?;
        self.repository.read(entity, id, ctx).await
    }

    /// See [`TenantRepository::update`].
    pub async fn update(
        &self,
        entity: &str,
        id: &str,
        updates: Document,
        ctx: &OperationContext,
    ) -> RouterResult<Record> {
        let _permit = self.gate.enter()?;
        self.repository.update(entity, id, updates, ctx).await
    }

    /// See [`TenantRepository::delete`].
    pub async fn delete(&self, entity: &str, id: &str, ctx: &OperationContext) -> RouterResult<Record> {
        let _permit = self.gate.enter()?;
        self.repository.delete(entity, id, ctx).await
    }

    /// See [`TenantRepository::find_one`].
    pub async fn find_one(
        &self,
        entity: &str,
        criteria: Filter,
        ctx: &OperationContext,
    ) -> RouterResult<Option<Record>> {
        let _permit = self.gate.enter()?;
        self.repository.find_one(entity, criteria, ctx).await
    }

    /// See [`UserDirectory::create_user`].
    pub async fn create_user(&self, user: NewUser, ctx: &OperationContext) -> RouterResult<User> {
        let _permit = self.gate.enter()?;
        self.users()?.create_user(user, ctx).await
    }

    /// See [`UserDirectory::read_user`].
    pub async fn read_user(&self, id: &str, ctx: &OperationContext) -> RouterResult<User> {
        let _permit = self.gate.enter()?;
        self.users()?.read_user(id, ctx).await
    }

    /// See [`UserDirectory::update_user`].
    pub async fn update_user(
        &self,
        id: &str,
        changes: UserUpdate,
        ctx: &OperationContext,
    ) -> RouterResult<User> {
        let _permit = self.gate.enter()?;
        self.users()?.update_user(id, changes, ctx).await
    }

    /// See [`UserDirectory::delete_user`].
    pub async fn delete_user(&self, id: &str, ctx: &OperationContext) -> RouterResult<User> {
        let _permit = self.gate.enter()?;
        self.users()?.delete_user(id, ctx).await
    }

    /// See [`UserDirectory::find_by_username`].
    pub async fn find_user_by_username(
        &self,
        username: &str,
        ctx: &OperationContext,
    ) -> RouterResult<Option<User>> {
        let _permit = self.gate.enter()?;
        self.users()?.find_by_username(username, ctx).await
    }

    /// See [`UserDirectory::verify_credentials`].
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
        ctx: &OperationContext,
    ) -> RouterResult<Option<User>> {
        let _permit = self.gate.enter()?;
        self.users()?.verify_credentials(username, password, ctx).await
    }

    /// Stops admitting operations, waits for running ones to finish and
    /// closes every connection.
    ///
    /// Waiting is bounded by the configured shutdown timeout; connections are
    /// closed once it expires even if operations are still running. Calling
    /// this more than once, or concurrently, shuts down only once.
    pub async fn shutdown(&self) {
        self.shutdown.get_or_init(|| self.run_shutdown()).await;
    }

    async fn run_shutdown(&self) {
        self.gate.close();
        info!(in_flight = self.gate.in_flight(), "Router stopped admitting operations");

        if tokio::time::timeout(self.shutdown_timeout, self.gate.wait_drained())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.gate.in_flight(),
                timeout_ms = self.shutdown_timeout.as_millis(),
                "Drain timed out, closing connections with operations still running"
            );
        }

        let closed = self.registry.close_all().await;
        info!(connections_closed = closed, "Router shut down");
    }

    fn users(&self) -> RouterResult<&UserDirectory> {
        self.users.as_ref().ok_or_else(|| {
            ConfigError::Invalid {
                message: "user management requires a password hasher".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_admits_until_closed() {
        let gate = AdmissionGate::default();

        let permit = gate.enter().unwrap();
        assert_eq!(gate.in_flight(), 1);
        drop(permit);
        assert_eq!(gate.in_flight(), 0);

        gate.close();
        assert!(gate.is_closed());
        assert!(matches!(gate.enter(), Err(RouterError::ShuttingDown)));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_drained_returns_when_idle() {
        let gate = AdmissionGate::default();
        gate.close();
        gate.wait_drained().await;
    }

    #[tokio::test]
    async fn test_wait_drained_waits_for_permits() {
        let gate = Arc::new(AdmissionGate::default());

        let holder = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _permit = gate.enter().unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        gate.close();

        tokio::time::timeout(Duration::from_secs(1), gate.wait_drained())
            .await
            .unwrap();
        assert_eq!(gate.in_flight(), 0);
        holder.await.unwrap();
    }
}

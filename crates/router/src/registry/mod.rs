//! Connection registry.
//!
//! The [`ConnectionRegistry`] is the only component that opens, caches and
//! closes connections to physical storage. Everyone else asks it for a
//! [`ConnectionHandle`] by [`RegistryKey`].
//!
//! # Lifecycle
//!
//! ```text
//! unopened --get_connection--> open --close_all--> closed
//! ```
//!
//! Each key gets its own slot. The first caller for a key runs the connect
//! while concurrent callers for the same key wait on the slot, so at most one
//! connection is ever opened per key. A failed or cancelled connect leaves the
//! slot empty and the next caller retries. After [`ConnectionRegistry::close_all`]
//! the registry stays closed.
//!
//! # Example
//!
//! ```ignore
//! let registry = ConnectionRegistry::new(connector, target_uri, ConnectOptions::default());
//!
//! let handle = registry.get_connection(&RegistryKey::Shared).await?;
//! let again = registry.get_connection(&RegistryKey::Shared).await?;
//! assert!(handle.same_connection(&again));
//!
//! registry.close_all().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::core::{ConnectOptions, NamespaceStore, StorageConnection, StorageConnector};
use crate::error::BackendError;
use crate::tenant::TenantId;

/// Key under which a connection is cached.
///
/// Per-collection isolation shares one connection under [`RegistryKey::Shared`];
/// per-database isolation keys connections by tenant. Keeping the two apart in
/// the type means no tenant id can alias the shared connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryKey {
    /// The single connection shared by all tenants.
    Shared,
    /// A tenant's dedicated connection.
    Tenant(TenantId),
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKey::Shared => write!(f, "shared"),
            RegistryKey::Tenant(id) => write!(f, "tenant:{}", id),
        }
    }
}

/// Computes the target URI for a registry key.
pub type TargetUriFn = Arc<dyn Fn(&RegistryKey) -> String + Send + Sync>;

/// A cached, reusable handle to an open connection.
///
/// Handles are cheap to clone; all clones share the one connection owned by
/// the registry.
#[derive(Clone)]
pub struct ConnectionHandle {
    key: RegistryKey,
    connection: Arc<dyn StorageConnection>,
}

impl ConnectionHandle {
    /// Returns the key this handle is cached under.
    pub fn key(&self) -> &RegistryKey {
        &self.key
    }

    /// Returns the URI the connection was opened against.
    pub fn target_uri(&self) -> &str {
        self.connection.target_uri()
    }

    /// Returns the CRUD primitive for a namespace on this connection.
    pub fn namespace(&self, name: &str) -> Arc<dyn NamespaceStore> {
        self.connection.namespace(name)
    }

    /// Returns `true` if both handles share the same underlying connection.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("key", &self.key)
            .field("target_uri", &self.connection.target_uri())
            .finish()
    }
}

type Slot = Arc<OnceCell<ConnectionHandle>>;

/// Owns and caches connections to physical storage targets.
pub struct ConnectionRegistry {
    connector: Arc<dyn StorageConnector>,
    target_uri: TargetUriFn,
    options: ConnectOptions,
    slots: RwLock<HashMap<RegistryKey, Slot>>,
    closed: AtomicBool,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connector", &self.connector)
            .field("options", &self.options)
            .field("slots", &self.slots.read().len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Creates a registry that opens connections through `connector`.
    ///
    /// `target_uri` maps each key to the URI passed to the connector.
    pub fn new(
        connector: Arc<dyn StorageConnector>,
        target_uri: TargetUriFn,
        options: ConnectOptions,
    ) -> Self {
        Self {
            connector,
            target_uri,
            options,
            slots: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the connection for `key`, opening it on first use.
    ///
    /// # Errors
    ///
    /// * `BackendError::ConnectionFailed` - The connect call failed or timed
    ///   out. Nothing is cached, so a later call retries.
    /// * `BackendError::RegistryClosed` - [`close_all`](Self::close_all) has run.
    pub async fn get_connection(&self, key: &RegistryKey) -> Result<ConnectionHandle, BackendError> {
        let slot = self.slot(key)?;
        if let Some(handle) = slot.get() {
            return Ok(handle.clone());
        }

        let handle = slot.get_or_try_init(|| self.open(key)).await?;
        Ok(handle.clone())
    }

    /// Closes every open connection exactly once and empties the cache.
    ///
    /// Calling this again is a no-op. Close failures are logged and do not
    /// stop the remaining connections from being closed. Returns the number of
    /// connections closed by this call.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(RegistryKey, Slot)> = {
            let mut slots = self.slots.write();
            self.closed.store(true, Ordering::SeqCst);
            slots.drain().collect()
        };

        let mut closed = 0;
        for (key, slot) in drained {
            // Waits for a connect still running on this slot; never starts one.
            let settled = slot
                .get_or_try_init(|| async { Err::<ConnectionHandle, _>(BackendError::RegistryClosed) })
                .await;

            let Ok(handle) = settled else {
                continue;
            };

            match handle.connection.close().await {
                Ok(()) => info!(key = %key, uri = %handle.target_uri(), "Connection closed"),
                Err(err) => warn!(key = %key, error = %err, "Failed to close connection cleanly"),
            }
            closed += 1;
        }

        if closed > 0 {
            info!(closed, "Connection registry closed");
        }
        closed
    }

    /// Returns `true` once [`close_all`](Self::close_all) has started.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns the number of open connections in the cache.
    pub fn open_count(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Returns the keys with an open connection.
    pub fn open_keys(&self) -> Vec<RegistryKey> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns the slot for `key`, creating an empty one if needed.
    fn slot(&self, key: &RegistryKey) -> Result<Slot, BackendError> {
        if self.is_closed() {
            return Err(BackendError::RegistryClosed);
        }

        if let Some(slot) = self.slots.read().get(key) {
            return Ok(Arc::clone(slot));
        }

        let mut slots = self.slots.write();
        // close_all flips the flag under this lock
        if self.is_closed() {
            return Err(BackendError::RegistryClosed);
        }
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    /// Opens a new connection for `key`. Runs at most once at a time per slot.
    async fn open(&self, key: &RegistryKey) -> Result<ConnectionHandle, BackendError> {
        if self.is_closed() {
            return Err(BackendError::RegistryClosed);
        }

        let uri = (self.target_uri)(key);
        debug!(key = %key, uri = %uri, backend = %self.connector.kind(), "Opening connection");

        let attempt = self.connector.connect(&uri, &self.options);
        let connection = match tokio::time::timeout(self.options.connect_timeout, attempt).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(err)) => {
                warn!(key = %key, uri = %uri, error = %err, "Connection failed");
                return Err(BackendError::ConnectionFailed {
                    key: key.clone(),
                    uri,
                    message: err.to_string(),
                    source: Some(Box::new(err)),
                });
            }
            Err(_) => {
                let timeout_ms = self.options.connect_timeout.as_millis();
                warn!(key = %key, uri = %uri, timeout_ms, "Connection timed out");
                return Err(BackendError::ConnectionFailed {
                    key: key.clone(),
                    uri,
                    message: format!("timed out after {}ms", timeout_ms),
                    source: None,
                });
            }
        };

        info!(key = %key, uri = %uri, "Connection opened");
        Ok(ConnectionHandle {
            key: key.clone(),
            connection,
        })
    }
}

//! In-process document store.
//!
//! Databases are keyed by target URI and outlive individual connections, so
//! reconnecting to the same URI sees the same data. The connector records
//! every connect attempt and close call, and can be told to fail or delay
//! connects, which makes it the backend of choice for tests.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tenant_router::backends::memory::MemoryConnector;
//! use tenant_router::core::{ConnectOptions, Filter, StorageConnector};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let connector = MemoryConnector::new();
//! let conn = connector.connect("mem://host/app", &ConnectOptions::default()).await.unwrap();
//!
//! let orders = conn.namespace("Order");
//! let doc = json!({"_id": "1", "amount": 10}).as_object().cloned().unwrap();
//! orders.insert(doc).await.unwrap();
//!
//! let found = orders.find_one(&Filter::new().eq("_id", "1")).await.unwrap();
//! assert!(found.is_some());
//! assert_eq!(connector.connect_count(), 1);
//! # });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::core::{
    BackendKind, ConnectOptions, Document, Filter, ID_FIELD, NamespaceStore, StorageConnection,
    StorageConnector,
};
use crate::error::BackendError;

const BACKEND_NAME: &str = "memory";

type Collection = Arc<RwLock<Vec<Document>>>;

/// One database: namespace name to documents.
#[derive(Debug, Default)]
struct MemoryDatabase {
    namespaces: RwLock<HashMap<String, Collection>>,
}

impl MemoryDatabase {
    fn collection(&self, name: &str) -> Collection {
        if let Some(collection) = self.namespaces.read().get(name) {
            return Arc::clone(collection);
        }
        Arc::clone(self.namespaces.write().entry(name.to_string()).or_default())
    }
}

/// Connector for the in-memory store.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    databases: RwLock<HashMap<String, Arc<MemoryDatabase>>>,
    connect_log: Mutex<Vec<String>>,
    close_calls: Arc<AtomicUsize>,
    failures_pending: AtomicUsize,
    connect_delay: Mutex<Option<Duration>>,
}

impl MemoryConnector {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Delays every connect attempt by `delay` (`None` to disable).
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *self.connect_delay.lock() = delay;
    }

    /// Returns the number of connect attempts, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.connect_log.lock().len()
    }

    /// Returns the number of connect attempts against `uri`.
    pub fn connect_count_for(&self, uri: &str) -> usize {
        self.connect_log.lock().iter().filter(|u| *u == uri).count()
    }

    /// Returns every URI a connect was attempted against, in order.
    pub fn connected_uris(&self) -> Vec<String> {
        self.connect_log.lock().clone()
    }

    /// Returns the number of `close` calls across all connections.
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Returns the namespace names that exist in the database at `uri`.
    pub fn namespaces(&self, uri: &str) -> Vec<String> {
        let Some(db) = self.databases.read().get(uri).cloned() else {
            return Vec::new();
        };
        let mut names: Vec<String> = db.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a snapshot of the documents in `namespace` at `uri`.
    pub fn documents(&self, uri: &str, namespace: &str) -> Vec<Document> {
        let Some(db) = self.databases.read().get(uri).cloned() else {
            return Vec::new();
        };
        let Some(collection) = db.namespaces.read().get(namespace).cloned() else {
            return Vec::new();
        };
        let docs = collection.read().clone();
        docs
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn database(&self, uri: &str) -> Arc<MemoryDatabase> {
        if let Some(db) = self.databases.read().get(uri) {
            return Arc::clone(db);
        }
        Arc::clone(self.databases.write().entry(uri.to_string()).or_default())
    }
}

#[async_trait]
impl StorageConnector for MemoryConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn connect(
        &self,
        target_uri: &str,
        _options: &ConnectOptions,
    ) -> Result<Arc<dyn StorageConnection>, BackendError> {
        self.connect_log.lock().push(target_uri.to_string());

        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_failure() {
            return Err(BackendError::Internal {
                backend_name: BACKEND_NAME.to_string(),
                message: format!("connection to {} refused", target_uri),
                source: None,
            });
        }

        Ok(Arc::new(MemoryConnection {
            uri: target_uri.to_string(),
            database: self.database(target_uri),
            closed: Arc::new(AtomicBool::new(false)),
            close_calls: Arc::clone(&self.close_calls),
        }))
    }
}

/// An open connection to one in-memory database.
pub struct MemoryConnection {
    uri: String,
    database: Arc<MemoryDatabase>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("uri", &self.uri)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl MemoryConnection {
    /// Returns `true` once the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageConnection for MemoryConnection {
    fn target_uri(&self) -> &str {
        &self.uri
    }

    fn namespace(&self, name: &str) -> Arc<dyn NamespaceStore> {
        Arc::new(MemoryNamespace {
            name: name.to_string(),
            uri: self.uri.clone(),
            documents: self.database.collection(name),
            closed: Arc::clone(&self.closed),
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Documents of one namespace, seen through one connection.
struct MemoryNamespace {
    name: String,
    uri: String,
    documents: Collection,
    closed: Arc<AtomicBool>,
}

impl MemoryNamespace {
    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::ConnectionClosed {
                uri: self.uri.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NamespaceStore for MemoryNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, doc: Document) -> Result<Document, BackendError> {
        self.ensure_open()?;
        let mut documents = self.documents.write();

        if let Some(id) = doc.get(ID_FIELD)
            && documents.iter().any(|d| d.get(ID_FIELD) == Some(id))
        {
            return Err(BackendError::QueryError {
                namespace: self.name.clone(),
                message: format!("duplicate key: _id {}", id),
            });
        }

        documents.push(doc.clone());
        Ok(doc)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, BackendError> {
        self.ensure_open()?;
        let documents = self.documents.read();
        Ok(documents.iter().find(|d| filter.matches(d)).cloned())
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        changes: Document,
    ) -> Result<Option<Document>, BackendError> {
        self.ensure_open()?;
        let mut documents = self.documents.write();
        let Some(doc) = documents.iter_mut().find(|d| filter.matches(d)) else {
            return Ok(None);
        };
        for (field, value) in changes {
            doc.insert(field, value);
        }
        Ok(Some(doc.clone()))
    }

    async fn find_one_and_delete(&self, filter: &Filter) -> Result<Option<Document>, BackendError> {
        self.ensure_open()?;
        let mut documents = self.documents.write();
        let position = documents.iter().position(|d| filter.matches(d));
        Ok(position.map(|index| documents.remove(index)))
    }
}

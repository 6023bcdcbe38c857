//! Storage primitives consumed by the router.
//!
//! The router does not execute queries itself. It consumes three traits from
//! whichever storage engine is plugged in:
//!
//! - [`StorageConnector`] opens a connection to a target URI
//! - [`StorageConnection`] is an open connection that hands out namespaces
//! - [`NamespaceStore`] runs single-document CRUD against one namespace
//!
//! # Example
//!
//! ```ignore
//! use tenant_router::core::{Filter, StorageConnector, ConnectOptions};
//!
//! async fn example(connector: &dyn StorageConnector) -> Result<(), BackendError> {
//!     let conn = connector.connect("db://host/tenant_acme", &ConnectOptions::default()).await?;
//!     let orders = conn.namespace("Order");
//!     let found = orders.find_one(&Filter::new().eq("_id", "42")).await?;
//!     conn.close().await
//! }
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use super::backend::{BackendKind, ConnectOptions};
use super::document::{Document, Filter};
use crate::error::BackendError;

/// Opens connections to physical storage targets.
#[async_trait]
pub trait StorageConnector: Send + Sync + Debug {
    /// Returns the kind of backend this connector talks to.
    fn kind(&self) -> BackendKind;

    /// Opens a connection to `target_uri`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the target is unreachable or refuses the
    /// connection.
    async fn connect(
        &self,
        target_uri: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn StorageConnection>, BackendError>;
}

/// An open connection to one physical target (a database or a cluster).
#[async_trait]
pub trait StorageConnection: Send + Sync + Debug {
    /// Returns the URI this connection was opened against.
    fn target_uri(&self) -> &str;

    /// Returns the CRUD primitive for a namespace (collection/table).
    fn namespace(&self, name: &str) -> Arc<dyn NamespaceStore>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the backend reports a failure while
    /// shutting the connection down.
    async fn close(&self) -> Result<(), BackendError>;
}

/// Single-document operations against one namespace.
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// Returns the namespace name.
    fn name(&self) -> &str;

    /// Inserts a document and returns it as stored.
    async fn insert(&self, doc: Document) -> Result<Document, BackendError>;

    /// Returns the first document matching `filter`.
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, BackendError>;

    /// Sets the fields in `changes` on the first match and returns the
    /// document after the update.
    async fn find_one_and_update(
        &self,
        filter: &Filter,
        changes: Document,
    ) -> Result<Option<Document>, BackendError>;

    /// Removes the first match and returns it.
    async fn find_one_and_delete(&self, filter: &Filter) -> Result<Option<Document>, BackendError>;
}

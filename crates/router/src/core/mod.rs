//! Storage abstractions consumed by the router.
//!
//! This module provides the interfaces the router needs from a storage
//! engine, and nothing more:
//!
//! - [`StorageConnector`] - Opens connections to physical targets
//! - [`StorageConnection`] - Open handle that exposes namespaces
//! - [`NamespaceStore`] - Single-document CRUD on one namespace
//! - [`Document`] / [`Filter`] - The data exchanged with those traits
//!
//! # Example: Implementing a Backend
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use tenant_router::core::{BackendKind, ConnectOptions, StorageConnection, StorageConnector};
//! use tenant_router::error::BackendError;
//!
//! #[derive(Debug)]
//! struct MyConnector;
//!
//! #[async_trait]
//! impl StorageConnector for MyConnector {
//!     fn kind(&self) -> BackendKind {
//!         BackendKind::Custom("my-backend")
//!     }
//!
//!     async fn connect(
//!         &self,
//!         target_uri: &str,
//!         options: &ConnectOptions,
//!     ) -> Result<Arc<dyn StorageConnection>, BackendError> {
//!         todo!()
//!     }
//! }
//! ```

pub mod backend;
pub mod document;
pub mod storage;

pub use backend::{BackendKind, ConnectOptions};
pub use document::{Document, Filter, ID_FIELD, TENANT_FIELD};
pub use storage::{NamespaceStore, StorageConnection, StorageConnector};

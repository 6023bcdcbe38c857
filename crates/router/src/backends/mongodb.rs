//! MongoDB backend.
//!
//! Each connection owns one [`Client`] bound to the database named in the
//! target URI path, or to the connector's fallback database when the URI has
//! none. Namespaces map to collections.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{self, Bson, doc};
use mongodb::options::{ClientOptions, ReturnDocument};
use mongodb::{Client, Collection, Database};
use serde_json::Value;
use tracing::debug;

use crate::core::{
    BackendKind, ConnectOptions, Document, Filter, NamespaceStore, StorageConnection,
    StorageConnector,
};
use crate::error::BackendError;

/// Database used when the target URI names none.
pub const DEFAULT_DATABASE: &str = "router";

/// Connector for MongoDB deployments.
#[derive(Debug, Clone)]
pub struct MongoConnector {
    fallback_database: String,
}

impl Default for MongoConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MongoConnector {
    /// Creates a connector that falls back to [`DEFAULT_DATABASE`].
    pub fn new() -> Self {
        Self {
            fallback_database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Sets the database used when the target URI names none.
    pub fn with_fallback_database(mut self, name: impl Into<String>) -> Self {
        self.fallback_database = name.into();
        self
    }
}

#[async_trait]
impl StorageConnector for MongoConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDB
    }

    async fn connect(
        &self,
        target_uri: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn StorageConnection>, BackendError> {
        let mut client_options = ClientOptions::parse(target_uri).await?;
        client_options.connect_timeout = Some(options.connect_timeout);
        client_options.server_selection_timeout = Some(options.connect_timeout);
        if let Some(app_name) = &options.app_name {
            client_options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(client_options)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(&self.fallback_database));

        // Fail at connect time rather than on the first query.
        database.run_command(doc! { "ping": 1 }).await?;
        debug!(uri = target_uri, database = database.name(), "MongoDB connection ready");

        Ok(Arc::new(MongoConnection {
            uri: target_uri.to_string(),
            client,
            database,
        }))
    }
}

/// An open MongoDB connection bound to one database.
pub struct MongoConnection {
    uri: String,
    client: Client,
    database: Database,
}

impl fmt::Debug for MongoConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConnection")
            .field("uri", &self.uri)
            .field("database", &self.database.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageConnection for MongoConnection {
    fn target_uri(&self) -> &str {
        &self.uri
    }

    fn namespace(&self, name: &str) -> Arc<dyn NamespaceStore> {
        Arc::new(MongoNamespace {
            name: name.to_string(),
            collection: self.database.collection::<bson::Document>(name),
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

struct MongoNamespace {
    name: String,
    collection: Collection<bson::Document>,
}

#[async_trait]
impl NamespaceStore for MongoNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, doc: Document) -> Result<Document, BackendError> {
        self.collection.insert_one(to_bson(&doc)?).await?;
        Ok(doc)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, BackendError> {
        let found = self
            .collection
            .find_one(to_bson(filter.as_document())?)
            .await?;
        found.map(from_bson).transpose()
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        changes: Document,
    ) -> Result<Option<Document>, BackendError> {
        let update = doc! { "$set": to_bson(&changes)? };
        let updated = self
            .collection
            .find_one_and_update(to_bson(filter.as_document())?, update)
            .return_document(ReturnDocument::After)
            .await?;
        updated.map(from_bson).transpose()
    }

    async fn find_one_and_delete(&self, filter: &Filter) -> Result<Option<Document>, BackendError> {
        let deleted = self
            .collection
            .find_one_and_delete(to_bson(filter.as_document())?)
            .await?;
        deleted.map(from_bson).transpose()
    }
}

fn to_bson(doc: &Document) -> Result<bson::Document, BackendError> {
    bson::to_document(doc).map_err(|e| BackendError::SerializationError {
        message: e.to_string(),
    })
}

fn from_bson(doc: bson::Document) -> Result<Document, BackendError> {
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::SerializationError {
            message: format!("expected a document, got {}", other),
        }),
    }
}

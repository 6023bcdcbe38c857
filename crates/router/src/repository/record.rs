//! Records returned by the repository.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Document, ID_FIELD, TENANT_FIELD};

/// Field holding the creation timestamp (RFC 3339).
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Field holding the last-modified timestamp (RFC 3339).
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A tenant-owned record as stored.
///
/// Records produced by the repository always carry `_id` and `tenantId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    document: Document,
}

impl Record {
    /// Wraps a stored document.
    pub fn from_document(document: Document) -> Self {
        Self { document }
    }

    /// Returns the record's `_id`.
    pub fn id(&self) -> Option<&str> {
        self.document.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Returns the owning tenant.
    pub fn tenant_id(&self) -> Option<&str> {
        self.document.get(TENANT_FIELD).and_then(Value::as_str)
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.document.get(field)
    }

    /// Returns when the record was created, if timestamps are kept.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(CREATED_AT_FIELD)
    }

    /// Returns when the record was last modified, if timestamps are kept.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(UPDATED_AT_FIELD)
    }

    fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        let raw = self.document.get(field)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Returns the underlying document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consumes the record and returns the underlying document.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Deserializes the record into a typed value.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.document.clone()))
    }
}

impl From<Document> for Record {
    fn from(document: Document) -> Self {
        Self::from_document(document)
    }
}

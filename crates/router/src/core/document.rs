//! Document and filter types exchanged with storage backends.

use serde_json::{Map, Value};

/// A schemaless JSON document as stored by a backend.
pub type Document = Map<String, Value>;

/// Field holding a record's identity.
pub const ID_FIELD: &str = "_id";

/// Field holding the owning tenant of a record.
pub const TENANT_FIELD: &str = "tenantId";

/// An equality filter: a document matches when every listed field is equal.
///
/// # Examples
///
/// ```
/// use tenant_router::core::Filter;
/// use serde_json::json;
///
/// let filter = Filter::new().eq("_id", "42").eq("tenantId", "acme");
///
/// let doc = json!({"_id": "42", "tenantId": "acme", "amount": 10});
/// assert!(filter.matches(doc.as_object().unwrap()));
///
/// let other = json!({"_id": "42", "tenantId": "globex"});
/// assert!(!filter.matches(other.as_object().unwrap()));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Document,
}

impl Filter {
    /// Creates an empty filter (matches every document).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition, replacing any previous one on `field`.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    /// Returns the value a field must equal, if constrained.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.conditions.get(field)
    }

    /// Returns the conditions as a document.
    pub fn as_document(&self) -> &Document {
        &self.conditions
    }

    /// Returns `true` if `doc` satisfies every condition.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

impl From<Document> for Filter {
    fn from(conditions: Document) -> Self {
        Self { conditions }
    }
}

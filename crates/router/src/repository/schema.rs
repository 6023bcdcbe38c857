//! Entity schemas and the registry of entities a repository serves.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Document;
use crate::error::{ConfigError, ValidationError};

/// Describes one logical entity (e.g. `Order`, `User`).
///
/// # Example
///
/// ```
/// use tenant_router::repository::EntitySchema;
///
/// let order = EntitySchema::new("Order").require("amount");
/// assert_eq!(order.name, "Order");
/// assert!(order.timestamps);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Logical entity name, used to derive namespace names.
    pub name: String,

    /// Fields that must be present and non-null on create.
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Whether `createdAt`/`updatedAt` are maintained.
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

fn default_true() -> bool {
    true
}

impl EntitySchema {
    /// Creates a schema with no required fields and timestamps enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_fields: Vec::new(),
            timestamps: true,
        }
    }

    /// Adds a required field.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    /// Disables timestamp maintenance.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Schema of the built-in `User` entity.
    pub fn user() -> Self {
        Self::new("User").require("username").require("password")
    }

    /// Schema of the tenant descriptor entity.
    pub fn tenant() -> Self {
        Self::new("Tenant").require("name")
    }

    /// Checks that every required field is present and non-null.
    pub fn validate(&self, doc: &Document) -> Result<(), ValidationError> {
        for field in &self.required_fields {
            if matches!(doc.get(field), None | Some(Value::Null)) {
                return Err(ValidationError::MissingRequiredField {
                    entity: self.name.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The set of entities a repository accepts.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    schemas: HashMap<String, EntitySchema>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of schemas.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateEntity` if a name appears twice.
    pub fn from_schemas(schemas: impl IntoIterator<Item = EntitySchema>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// Registers a schema.
    pub fn register(&mut self, schema: EntitySchema) -> Result<(), ConfigError> {
        if schema.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "entity name must not be empty".to_string(),
            });
        }
        if self.schemas.contains_key(&schema.name) {
            return Err(ConfigError::DuplicateEntity { entity: schema.name });
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Looks up a schema by entity name.
    pub fn get(&self, entity: &str) -> Result<&EntitySchema, ValidationError> {
        self.schemas
            .get(entity)
            .ok_or_else(|| ValidationError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    /// Returns `true` if `entity` is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.schemas.contains_key(entity)
    }

    /// Returns the registered entity names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

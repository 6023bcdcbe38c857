//! Tenant-scoped user management.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{NewUser, PasswordHasher, User, UserUpdate};
use crate::core::Filter;
use crate::error::{ConfigError, RecordError, RouterResult, ValidationError};
use crate::repository::TenantRepository;
use crate::tenant::OperationContext;

/// Entity name under which users are stored.
pub const USER_ENTITY: &str = "User";

const DEFAULT_EMAIL_PATTERN: &str = r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$";

/// User operations, all scoped to the caller's tenant.
///
/// Every call goes through the [`TenantRepository`], so a user created under
/// one tenant can never be read, changed, deleted or authenticated through
/// another.
#[derive(Debug)]
pub struct UserDirectory {
    repository: Arc<TenantRepository>,
    hasher: Arc<dyn PasswordHasher>,
    email_pattern: Regex,
}

impl UserDirectory {
    /// Creates a directory over `repository`, hashing with `hasher`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `User` is not a registered entity.
    pub fn new(
        repository: Arc<TenantRepository>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, ConfigError> {
        Self::with_email_pattern(repository, hasher, DEFAULT_EMAIL_PATTERN)
    }

    /// Creates a directory that validates emails against `pattern`.
    pub fn with_email_pattern(
        repository: Arc<TenantRepository>,
        hasher: Arc<dyn PasswordHasher>,
        pattern: &str,
    ) -> Result<Self, ConfigError> {
        if !repository.entities().contains(USER_ENTITY) {
            return Err(ConfigError::Invalid {
                message: format!("entity '{}' must be registered to manage users", USER_ENTITY),
            });
        }
        let email_pattern = Regex::new(pattern).map_err(|e| ConfigError::Invalid {
            message: format!("invalid email pattern: {}", e),
        })?;

        Ok(Self {
            repository,
            hasher,
            email_pattern,
        })
    }

    /// Creates a user in the caller's tenant.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidRecord` - Empty username/password or bad email
    /// * `RecordError::AlreadyExists` - The username or email is taken in this tenant
    pub async fn create_user(&self, new_user: NewUser, ctx: &OperationContext) -> RouterResult<User> {
        non_empty("username", &new_user.username)?;
        non_empty("password", &new_user.password)?;
        if let Some(email) = &new_user.email {
            self.validate_email(email)?;
        }
        self.ensure_unique("username", &new_user.username, None, ctx).await?;
        if let Some(email) = &new_user.email {
            self.ensure_unique("email", email, None, ctx).await?;
        }

        let mut doc = Map::new();
        doc.insert("username".to_string(), Value::String(new_user.username));
        doc.insert(
            "password".to_string(),
            Value::String(self.hasher.hash(&new_user.password)),
        );
        if let Some(email) = new_user.email {
            doc.insert("email".to_string(), Value::String(email));
        }
        doc.insert("roles".to_string(), roles_value(new_user.roles));

        let record = self.repository.create(USER_ENTITY, doc, ctx).await?;
        let user: User = record.to_typed()?;
        info!(tenant = %user.tenant_id, user_id = %user.id, username = %user.username, "Created user");
        Ok(user)
    }

    /// Reads a user by id.
    pub async fn read_user(&self, id: &str, ctx: &OperationContext) -> RouterResult<User> {
        let record = self.repository.read(USER_ENTITY, id, ctx).await?;
        Ok(record.to_typed()?)
    }

    /// Looks a user up by username.
    pub async fn find_by_username(
        &self,
        username: &str,
        ctx: &OperationContext,
    ) -> RouterResult<Option<User>> {
        let filter = Filter::new().eq("username", username);
        match self.repository.find_one(USER_ENTITY, filter, ctx).await? {
            Some(record) => Ok(Some(record.to_typed()?)),
            None => Ok(None),
        }
    }

    /// Applies `changes` to a user. A new password is hashed before storage.
    ///
    /// # Errors
    ///
    /// * `RecordError::NotFound` - No such user in this tenant
    /// * `RecordError::AlreadyExists` - The new username or email is taken
    pub async fn update_user(
        &self,
        id: &str,
        changes: UserUpdate,
        ctx: &OperationContext,
    ) -> RouterResult<User> {
        let mut doc = Map::new();

        if let Some(username) = changes.username {
            non_empty("username", &username)?;
            self.ensure_unique("username", &username, Some(id), ctx).await?;
            doc.insert("username".to_string(), Value::String(username));
        }
        if let Some(password) = changes.password {
            non_empty("password", &password)?;
            doc.insert("password".to_string(), Value::String(self.hasher.hash(&password)));
        }
        if let Some(email) = changes.email {
            self.validate_email(&email)?;
            self.ensure_unique("email", &email, Some(id), ctx).await?;
            doc.insert("email".to_string(), Value::String(email));
        }
        if let Some(roles) = changes.roles {
            doc.insert("roles".to_string(), roles_value(roles));
        }

        let record = self.repository.update(USER_ENTITY, id, doc, ctx).await?;
        Ok(record.to_typed()?)
    }

    /// Deletes a user and returns it.
    pub async fn delete_user(&self, id: &str, ctx: &OperationContext) -> RouterResult<User> {
        let record = self.repository.delete(USER_ENTITY, id, ctx).await?;
        let user: User = record.to_typed()?;
        info!(tenant = %user.tenant_id, user_id = %user.id, "Deleted user");
        Ok(user)
    }

    /// Checks a username/password pair within the caller's tenant.
    ///
    /// Returns the user when the password matches and `None` otherwise,
    /// including when the username does not exist in this tenant.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
        ctx: &OperationContext,
    ) -> RouterResult<Option<User>> {
        let Some(user) = self.find_by_username(username, ctx).await? else {
            debug!(username = username, "Credential check for unknown user");
            return Ok(None);
        };

        if self.hasher.verify(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            debug!(tenant = %user.tenant_id, username = username, "Credential check failed");
            Ok(None)
        }
    }

    fn validate_email(&self, email: &str) -> Result<(), ValidationError> {
        if self.email_pattern.is_match(email) {
            Ok(())
        } else {
            Err(ValidationError::InvalidRecord {
                entity: USER_ENTITY.to_string(),
                message: format!("invalid email address: '{}'", email),
            })
        }
    }

    /// Fails if another user in the tenant already has `value` in `field`.
    ///
    /// Users without the field never collide, so an absent email is not a
    /// duplicate of another absent email.
    async fn ensure_unique(
        &self,
        field: &str,
        value: &str,
        except_id: Option<&str>,
        ctx: &OperationContext,
    ) -> RouterResult<()> {
        let filter = Filter::new().eq(field, value);
        match self.repository.find_one(USER_ENTITY, filter, ctx).await? {
            Some(existing) if existing.id() != except_id => Err(RecordError::AlreadyExists {
                entity: USER_ENTITY.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidRecord {
            entity: USER_ENTITY.to_string(),
            message: format!("{} must not be empty", field),
        });
    }
    Ok(())
}

fn roles_value(roles: Vec<String>) -> Value {
    Value::Array(roles.into_iter().map(Value::String).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_email_pattern() {
        let pattern = Regex::new(DEFAULT_EMAIL_PATTERN).unwrap();

        assert!(pattern.is_match("alice@example.com"));
        assert!(pattern.is_match("Alice.Smith+tag@Mail.Example.IO"));
        assert!(pattern.is_match("ops_team%eu@corp-mail.example.org"));

        assert!(!pattern.is_match("a@b.c"));
        assert!(!pattern.is_match("a#b!@x.io"));
        assert!(!pattern.is_match("alice@example"));
        assert!(!pattern.is_match("alice example@x.io"));
        assert!(!pattern.is_match("not-an-email"));
    }
}

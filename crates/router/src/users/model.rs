//! User records and their input types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// A stored user.
///
/// `password` holds the one-way hash produced by the directory's
/// [`PasswordHasher`](super::PasswordHasher), never the plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Record identity.
    #[serde(rename = "_id")]
    pub id: String,

    /// Owning tenant.
    #[serde(rename = "tenantId")]
    pub tenant_id: TenantId,

    /// Login name, unique within the tenant.
    pub username: String,

    /// Password hash.
    #[serde(rename = "password")]
    pub password_hash: String,

    /// Contact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Granted role names.
    #[serde(default)]
    pub roles: Vec<String>,

    /// When the user was created.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the user was last modified.
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Returns `true` if the user holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Input for creating a user.
///
/// # Example
///
/// ```
/// use tenant_router::users::NewUser;
///
/// let user = NewUser::new("alice", "s3cret")
///     .with_email("alice@example.com")
///     .with_role("admin");
/// assert_eq!(user.roles, vec!["admin"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
    /// Contact address.
    #[serde(default)]
    pub email: Option<String>,
    /// Granted role names.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl NewUser {
    /// Creates the input with a username and plaintext password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: None,
            roles: Vec::new(),
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Changes to apply to an existing user. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserUpdate {
    /// New login name.
    #[serde(default)]
    pub username: Option<String>,
    /// New plaintext password.
    #[serde(default)]
    pub password: Option<String>,
    /// New email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Replacement role set.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

impl UserUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a new username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets a new password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets a new email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Replaces the role set.
    #[must_use]
    pub fn roles(mut self, roles: Vec<String>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Returns `true` if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.email.is_none() && self.roles.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_from_stored_document() {
        let user: User = serde_json::from_value(json!({
            "_id": "u1",
            "tenantId": "acme",
            "username": "alice",
            "password": "hashed:pw",
            "roles": ["admin"],
            "createdAt": "2024-05-01T10:00:00+00:00",
        }))
        .unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(user.tenant_id.as_str(), "acme");
        assert_eq!(user.password_hash, "hashed:pw");
        assert!(user.email.is_none());
        assert!(user.created_at.is_some());
        assert!(user.updated_at.is_none());
    }

    #[test]
    fn test_has_role() {
        let user: User = serde_json::from_value(json!({
            "_id": "u1",
            "tenantId": "acme",
            "username": "alice",
            "password": "h",
            "roles": ["editor"],
        }))
        .unwrap();

        assert!(user.has_role("editor"));
        assert!(!user.has_role("admin"));
    }

    #[test]
    fn test_user_update_is_empty() {
        assert!(UserUpdate::new().is_empty());
        assert!(!UserUpdate::new().email("a@b.co").is_empty());
    }
}

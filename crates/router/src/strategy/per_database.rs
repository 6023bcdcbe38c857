//! Database-per-tenant naming.
//!
//! Each tenant gets its own database. The database name is produced by a
//! naming function, either supplied by the caller or built from a prefix and
//! suffix, and appended to the base URI.
//!
//! Database names land in the URI path, so a name that could escape it (a
//! `/`, `?` or `#`) or that the storage engine would not accept is rejected
//! by [`PerDatabaseStrategy::checked_database_name`] before any connect.

use std::fmt;
use std::sync::Arc;

use crate::error::TenantError;
use crate::tenant::TenantId;

/// Characters that may not appear in a tenant database name.
pub const RESERVED_DB_NAME_CHARS: &[char] = &['/', '\\', '.', '"', '$', '?', '#', ' ', '\0'];

/// Longest accepted database name, in bytes.
pub const MAX_DB_NAME_LEN: usize = 63;

/// Maps a tenant to its database name.
pub type TenantDbNameFn = Arc<dyn Fn(&TenantId) -> String + Send + Sync>;

/// Per-database isolation settings.
///
/// # Example
///
/// ```
/// use tenant_router::strategy::PerDatabaseStrategy;
/// use tenant_router::tenant::TenantId;
///
/// let naming = PerDatabaseStrategy::with_prefix("tenant_");
/// assert_eq!(naming.database_name(&TenantId::new("acme")), "tenant_acme");
///
/// let custom = PerDatabaseStrategy::new(|t: &TenantId| format!("{}-db", t.as_str()));
/// assert_eq!(
///     custom.target_uri("mongodb://host:27017/?w=majority", &TenantId::new("acme")),
///     "mongodb://host:27017/acme-db?w=majority"
/// );
/// ```
#[derive(Clone)]
pub struct PerDatabaseStrategy {
    db_name: TenantDbNameFn,
}

impl fmt::Debug for PerDatabaseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerDatabaseStrategy").finish_non_exhaustive()
    }
}

impl PerDatabaseStrategy {
    /// Creates a strategy with a custom database naming function.
    pub fn new<F>(db_name: F) -> Self
    where
        F: Fn(&TenantId) -> String + Send + Sync + 'static,
    {
        Self {
            db_name: Arc::new(db_name),
        }
    }

    /// Names databases `<prefix><tenant>`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_affixes(prefix, "")
    }

    /// Names databases `<prefix><tenant><suffix>`.
    pub fn with_affixes(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let suffix = suffix.into();
        Self::new(move |tenant| format!("{}{}{}", prefix, tenant.as_str(), suffix))
    }

    /// Returns the database name for `tenant`.
    pub fn database_name(&self, tenant: &TenantId) -> String {
        (self.db_name)(tenant)
    }

    /// Returns the database name for `tenant` if it is safe to connect to.
    ///
    /// # Errors
    ///
    /// Returns `TenantError::InvalidDatabaseName` if the name is empty, too
    /// long, or contains a reserved or control character.
    pub fn checked_database_name(&self, tenant: &TenantId) -> Result<String, TenantError> {
        let name = self.database_name(tenant);
        let invalid = |reason: String| TenantError::InvalidDatabaseName {
            tenant: tenant.as_str().to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("database name is empty".to_string()));
        }
        if name.len() > MAX_DB_NAME_LEN {
            return Err(invalid(format!(
                "database name exceeds {} bytes",
                MAX_DB_NAME_LEN
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| RESERVED_DB_NAME_CHARS.contains(c) || c.is_control())
        {
            return Err(invalid(format!("reserved character {:?} in '{}'", c, name)));
        }
        Ok(name)
    }

    /// Returns `<base_uri>/<database name>`.
    ///
    /// A trailing slash on the base is not doubled, and the database name is
    /// placed before any query string. The name is not checked here; callers
    /// routing tenant data go through
    /// [`checked_database_name`](Self::checked_database_name) first.
    pub fn target_uri(&self, base_uri: &str, tenant: &TenantId) -> String {
        let db_name = self.database_name(tenant);
        match base_uri.split_once('?') {
            Some((base, query)) => {
                format!("{}/{}?{}", base.trim_end_matches('/'), db_name, query)
            }
            None => format!("{}/{}", base_uri.trim_end_matches('/'), db_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_naming() {
        let naming = PerDatabaseStrategy::with_prefix("tenant_");
        assert_eq!(naming.database_name(&TenantId::new("X")), "tenant_X");
    }

    #[test]
    fn test_affix_naming() {
        let naming = PerDatabaseStrategy::with_affixes("t_", "_db");
        assert_eq!(naming.database_name(&TenantId::new("acme")), "t_acme_db");
    }

    #[test]
    fn test_target_uri_joins_path() {
        let naming = PerDatabaseStrategy::with_prefix("tenant_");
        let tenant = TenantId::new("X");
        assert_eq!(naming.target_uri("db://host", &tenant), "db://host/tenant_X");
        assert_eq!(naming.target_uri("db://host/", &tenant), "db://host/tenant_X");
    }

    #[test]
    fn test_target_uri_keeps_query() {
        let naming = PerDatabaseStrategy::with_prefix("tenant_");
        let uri = naming.target_uri("mongodb://h:27017/?retryWrites=true", &TenantId::new("a"));
        assert_eq!(uri, "mongodb://h:27017/tenant_a?retryWrites=true");
    }

    #[test]
    fn test_checked_name_accepts_plain_ids() {
        let naming = PerDatabaseStrategy::with_prefix("tenant_");
        assert_eq!(
            naming.checked_database_name(&TenantId::new("acme-01")).unwrap(),
            "tenant_acme-01"
        );
    }

    /// Ids that would rewrite the URI never produce a database name.
    #[test]
    fn test_checked_name_rejects_uri_syntax() {
        let naming = PerDatabaseStrategy::with_prefix("tenant_");

        for id in ["victim?x=1", "victim?appName=evil", "a/b", "victim/../admin", "a#frag"] {
            let err = naming.checked_database_name(&TenantId::new(id)).unwrap_err();
            assert!(
                matches!(err, TenantError::InvalidDatabaseName { ref tenant, .. } if tenant == id),
                "expected rejection for {:?}",
                id
            );
        }
    }

    #[test]
    fn test_checked_name_rejects_engine_reserved() {
        let naming = PerDatabaseStrategy::with_prefix("tenant_");

        for id in ["a.b", "a b", "a$b", "a\\b", "a\"b", "a\0b", "a\nb"] {
            assert!(naming.checked_database_name(&TenantId::new(id)).is_err(), "{:?}", id);
        }
    }

    #[test]
    fn test_checked_name_length_limit() {
        let naming = PerDatabaseStrategy::with_prefix("tenant_");
        let long = "x".repeat(MAX_DB_NAME_LEN);
        assert!(naming.checked_database_name(&TenantId::new(&long)).is_err());

        let fits = "x".repeat(MAX_DB_NAME_LEN - "tenant_".len());
        assert!(naming.checked_database_name(&TenantId::new(&fits)).is_ok());
    }

    /// A custom naming function is checked too.
    #[test]
    fn test_checked_name_applies_to_custom_naming() {
        let naming = PerDatabaseStrategy::new(|t: &TenantId| format!("{}.db", t.as_str()));
        assert!(naming.checked_database_name(&TenantId::new("acme")).is_err());
    }

    #[test]
    fn test_custom_naming_function() {
        let naming = PerDatabaseStrategy::new(|t: &TenantId| t.as_str().to_uppercase());
        assert_eq!(naming.database_name(&TenantId::new("acme")), "ACME");
    }
}

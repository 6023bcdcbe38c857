//! Router configuration.
//!
//! [`RouterConfig`] can be built programmatically, parsed from command line
//! flags, read from environment variables, or deserialized (e.g. from a JSON
//! file). A custom tenant database naming function cannot be expressed here;
//! pass one to [`TenantRouterBuilder::tenant_db_name`](crate::TenantRouterBuilder::tenant_db_name)
//! instead of setting a prefix.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ROUTER_STRATEGY` | per_collection | Isolation strategy (`per_database` or `per_collection`) |
//! | `ROUTER_BASE_URI` | mem://localhost | Base storage URI |
//! | `ROUTER_TENANT_DB_PREFIX` | (none) | Prefix of per-tenant database names |
//! | `ROUTER_TENANT_DB_SUFFIX` | (empty) | Suffix of per-tenant database names |
//! | `ROUTER_TENANT_HEADER` | x-tenant-id | Header carrying the tenant id |
//! | `ROUTER_CONNECT_TIMEOUT_MS` | 5000 | Connect timeout (milliseconds) |
//! | `ROUTER_SHUTDOWN_TIMEOUT_MS` | 30000 | Drain timeout on shutdown (milliseconds) |
//! | `ROUTER_APP_NAME` | (none) | Application name reported to the backend |
//! | `ROUTER_LOG_LEVEL` | info | Log level |
//!
//! # Example
//!
//! ```rust
//! use tenant_router::RouterConfig;
//!
//! let config = RouterConfig {
//!     strategy: "per_database".to_string(),
//!     base_uri: "mongodb://localhost:27017".to_string(),
//!     tenant_db_prefix: Some("tenant_".to_string()),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use clap::Parser;
use http::HeaderName;
use serde::{Deserialize, Serialize};

use crate::core::ConnectOptions;
use crate::strategy::{PerDatabaseStrategy, StrategyKind};

/// Configuration of a [`TenantRouter`](crate::TenantRouter).
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "tenant-router")]
#[command(about = "Multi-tenant data access router")]
pub struct RouterConfig {
    /// Isolation strategy (per_database or per_collection).
    #[arg(long, env = "ROUTER_STRATEGY", default_value = "per_collection")]
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Base storage URI.
    #[arg(long, env = "ROUTER_BASE_URI", default_value = "mem://localhost")]
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Prefix of per-tenant database names.
    #[arg(long, env = "ROUTER_TENANT_DB_PREFIX")]
    #[serde(default)]
    pub tenant_db_prefix: Option<String>,

    /// Suffix of per-tenant database names.
    #[arg(long, env = "ROUTER_TENANT_DB_SUFFIX", default_value = "")]
    #[serde(default)]
    pub tenant_db_suffix: String,

    /// Header carrying the tenant id.
    #[arg(long, env = "ROUTER_TENANT_HEADER", default_value = "x-tenant-id")]
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,

    /// Connect timeout in milliseconds.
    #[arg(long, env = "ROUTER_CONNECT_TIMEOUT_MS", default_value = "5000")]
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Drain timeout on shutdown in milliseconds.
    #[arg(long, env = "ROUTER_SHUTDOWN_TIMEOUT_MS", default_value = "30000")]
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Application name reported to the backend.
    #[arg(long, env = "ROUTER_APP_NAME")]
    #[serde(default)]
    pub app_name: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "ROUTER_LOG_LEVEL", default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_strategy() -> String {
    "per_collection".to_string()
}

fn default_base_uri() -> String {
    "mem://localhost".to_string()
}

fn default_tenant_header() -> String {
    "x-tenant-id".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            base_uri: default_base_uri(),
            tenant_db_prefix: None,
            tenant_db_suffix: String::new(),
            tenant_header: default_tenant_header(),
            connect_timeout_ms: default_connect_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            app_name: None,
            log_level: default_log_level(),
        }
    }
}

impl RouterConfig {
    /// Creates a configuration from environment variables.
    pub fn from_env() -> Self {
        // Try to parse from environment, falling back to defaults
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the shutdown drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Returns the options passed to every connect call.
    pub fn connect_options(&self) -> ConnectOptions {
        let options = ConnectOptions::default().with_connect_timeout(self.connect_timeout());
        match &self.app_name {
            Some(name) => options.with_app_name(name.clone()),
            None => options,
        }
    }

    /// Returns the per-database naming built from the prefix, if one is set.
    pub fn per_database_naming(&self) -> Option<PerDatabaseStrategy> {
        self.tenant_db_prefix
            .as_ref()
            .map(|prefix| PerDatabaseStrategy::with_affixes(prefix.clone(), self.tenant_db_suffix.clone()))
    }

    /// Validates the configuration and returns every problem found.
    ///
    /// A per-database strategy without a prefix is reported here, even though
    /// a naming function supplied to the builder would also satisfy it.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match self.strategy.parse::<StrategyKind>() {
            Ok(StrategyKind::PerDatabase) if self.tenant_db_prefix.is_none() => {
                errors.push("per_database strategy requires a tenant database prefix".to_string());
            }
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }

        if self.base_uri.trim().is_empty() {
            errors.push("Base URI cannot be empty".to_string());
        }

        if HeaderName::try_from(self.tenant_header.as_str()).is_err() {
            errors.push(format!("Invalid tenant header name: '{}'", self.tenant_header));
        }

        if self.connect_timeout_ms == 0 {
            errors.push("Connect timeout cannot be 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// Uses the in-memory store's URI scheme and short timeouts.
    pub fn for_testing() -> Self {
        Self {
            strategy: default_strategy(),
            base_uri: "mem://test".to_string(),
            tenant_db_prefix: Some("tenant_".to_string()),
            tenant_db_suffix: String::new(),
            tenant_header: default_tenant_header(),
            connect_timeout_ms: 1000,
            shutdown_timeout_ms: 1000,
            app_name: None,
            log_level: "debug".to_string(),
        }
    }
}

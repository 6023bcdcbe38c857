//! Backend identification and connection options.

use std::time::Duration;

/// Identifies the type of storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process document store.
    Memory,
    /// MongoDB (document store).
    MongoDB,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::MongoDB => write!(f, "mongodb"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Options passed to every connect call.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Application name reported to the backend, where supported.
    pub app_name: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(5000),
            app_name: None,
        }
    }
}

impl ConnectOptions {
    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }
}

//! Per-operation context.
//!
//! [`OperationContext`] is the opaque object handed to every repository call
//! by the calling layer. The router only reads the tenant-identifying header
//! out of it; everything else is carried along for logging.

use http::header::{HeaderName, HeaderValue, InvalidHeaderValue};
use http::request::Parts;
use http::HeaderMap;

/// Default header carrying the tenant identifier.
pub static X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");

/// Header carrying an optional correlation id.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Inbound metadata for a single data operation.
///
/// # Examples
///
/// ```
/// use tenant_router::tenant::OperationContext;
///
/// let ctx = OperationContext::for_tenant("acme").unwrap()
///     .with_correlation_id("req-123");
/// assert_eq!(ctx.header("x-tenant-id"), Some("acme"));
/// assert_eq!(ctx.correlation_id(), Some("req-123"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    headers: HeaderMap,
    correlation_id: Option<String>,
}

impl OperationContext {
    /// Creates an empty context. Operations with it fail tenant resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from inbound headers.
    ///
    /// An `x-request-id` header, when present, becomes the correlation id.
    pub fn from_headers(headers: HeaderMap) -> Self {
        let correlation_id = headers
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            headers,
            correlation_id,
        }
    }

    /// Creates a context carrying the tenant in the default `x-tenant-id` header.
    ///
    /// # Errors
    ///
    /// Fails if `tenant` cannot be represented as a header value.
    pub fn for_tenant(tenant: &str) -> Result<Self, InvalidHeaderValue> {
        Self::new().with_header(X_TENANT_ID.clone(), tenant)
    }

    /// Adds (or replaces) a header.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be represented as a header value.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self, InvalidHeaderValue> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }

    /// Sets the correlation id used in log events.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Returns a header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns all headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the correlation id, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

impl From<HeaderMap> for OperationContext {
    fn from(headers: HeaderMap) -> Self {
        Self::from_headers(headers)
    }
}

impl From<&Parts> for OperationContext {
    fn from(parts: &Parts) -> Self {
        Self::from_headers(parts.headers.clone())
    }
}

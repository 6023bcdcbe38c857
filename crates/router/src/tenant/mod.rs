//! Tenant identity and resolution.
//!
//! Every repository operation starts here: the [`TenantResolver`] turns the
//! caller's [`OperationContext`] into a [`TenantId`] before any storage is
//! touched. There is no operation that proceeds without one.
//!
//! # Examples
//!
//! ```
//! use tenant_router::tenant::{HeaderTenantResolver, OperationContext, TenantResolver};
//!
//! let resolver = HeaderTenantResolver::new();
//!
//! let ctx = OperationContext::for_tenant("acme").unwrap();
//! assert_eq!(resolver.resolve(&ctx).unwrap().as_str(), "acme");
//!
//! // No tenant header: resolution fails
//! assert!(resolver.resolve(&OperationContext::new()).is_err());
//! ```

mod context;
mod id;
mod resolver;

pub use context::{OperationContext, X_REQUEST_ID, X_TENANT_ID};
pub use id::TenantId;
pub use resolver::{HeaderTenantResolver, TenantResolver};

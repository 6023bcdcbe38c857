//! Storage backend implementations.
//!
//! This module contains implementations of the storage traits in
//! [`crate::core`]. Each backend is gated behind a feature flag.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | `memory` (default) | In-process document store for tests and local runs |
//! | MongoDB | `mongodb` | Document store via the official driver |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "mongodb")]
//! use tenant_router::backends::mongodb::MongoConnector;
//!
//! # #[cfg(feature = "mongodb")]
//! # fn example() {
//! let connector = MongoConnector::new().with_fallback_database("app");
//! # }
//! ```

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;

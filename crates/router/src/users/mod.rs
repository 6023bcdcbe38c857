//! Tenant-scoped users.
//!
//! Users are ordinary records of the `User` entity, so they inherit the
//! repository's isolation rules. Password hashing is delegated to a
//! [`PasswordHasher`] supplied by the caller.

mod directory;
mod model;

pub use directory::{USER_ENTITY, UserDirectory};
pub use model::{NewUser, User, UserUpdate};

use std::fmt::Debug;

/// One-way password hashing.
///
/// Implementations wrap a real algorithm (bcrypt, argon2, ...). The directory
/// only ever stores the output of [`hash`](Self::hash).
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hashes a plaintext password.
    fn hash(&self, plain: &str) -> String;

    /// Returns `true` if `plain` matches `hash`.
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

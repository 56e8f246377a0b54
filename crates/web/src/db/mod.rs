//! Typed access to the document collections.
//!
//! # Collections
//!
//! - `users/{uid}` - role record linking an identity to `admin` or a business
//! - `businesses/{id}` - tenants and their reward policy
//! - `customers/{id}` - enrolled customers and their stamp counts
//! - `events/{id}` - activity written by the pass service (read-only here)
//!
//! Field names are the camelCase names the store already uses.

pub mod businesses;
pub mod customers;
pub mod events;
pub mod users;

use thiserror::Error;

use crate::services::store::StoreError;

pub use businesses::BusinessRepository;
pub use customers::CustomerRepository;
pub use events::EventRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

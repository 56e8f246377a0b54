//! Identity provider abstraction.
//!
//! Only password sign-in is exposed. Creating credentials from this service
//! would replace the signed-in session, so business logins are provisioned
//! by the loyalty backend instead.

pub mod firebase;
pub mod memory;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use stampcard_core::UserId;

pub use firebase::FirebaseIdentity;
pub use memory::MemoryIdentity;

/// Errors returned by an [`IdentityProvider`].
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Unknown email or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Too many failed attempts; the provider is refusing sign-ins for now.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// The account exists but is disabled.
    #[error("account disabled")]
    Disabled,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an unexpected error.
    #[error("identity provider error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: UserId,
    pub email: String,
}

/// Authentication service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password.
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Identity, IdentityError>;
}

//! CLI command implementations.

pub mod business;
pub mod user;

use stampcard_web::config::{ConfigError, FirebaseConfig};
use stampcard_web::services::store::{FirestoreStore, StoreError};
use thiserror::Error;

/// Errors opening the document store.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Open the Firestore project named by the environment.
///
/// # Errors
///
/// Returns an error if the Firebase settings are missing or invalid.
pub fn connect() -> Result<FirestoreStore, ConnectError> {
    dotenvy::dotenv().ok();
    let config = FirebaseConfig::from_env()?;
    tracing::info!(project_id = %config.project_id, "Connecting to Firestore");
    Ok(FirestoreStore::new(&config)?)
}

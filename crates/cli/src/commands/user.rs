//! Role record commands.
//!
//! # Usage
//!
//! ```bash
//! sc-cli user grant --uid abc123 -e admin@example.com -r admin
//! sc-cli user grant --uid def456 -r business -b kess
//! sc-cli user show --uid abc123
//! ```

use stampcard_core::{BusinessId, Role, UserId, UserRecord};
use stampcard_web::db::{RepositoryError, UserRepository};
use stampcard_web::services::store::DocumentStore;
use thiserror::Error;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, business")]
    InvalidRole(String),

    /// Business role without a business id.
    #[error("The business role needs --business-id")]
    MissingBusinessId,

    /// Admin role with a business id.
    #[error("The admin role does not take --business-id")]
    UnexpectedBusinessId,

    /// Empty uid.
    #[error("uid must not be empty")]
    EmptyUid,

    /// Store error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Build a role record from command-line arguments.
///
/// # Errors
///
/// Returns a `UserError` if the role is unknown or the business id does not
/// fit the role.
pub fn role_record(
    uid: &str,
    email: Option<String>,
    role: &str,
    business_id: Option<String>,
) -> Result<UserRecord, UserError> {
    let uid = uid.trim();
    if uid.is_empty() {
        return Err(UserError::EmptyUid);
    }
    let role: Role = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let business_id = business_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty());

    let business_id = match (role, business_id) {
        (Role::Business, None) => return Err(UserError::MissingBusinessId),
        (Role::Admin, Some(_)) => return Err(UserError::UnexpectedBusinessId),
        (_, id) => id.map(BusinessId::new),
    };

    Ok(UserRecord {
        uid: UserId::new(uid),
        email,
        role,
        business_id,
    })
}

/// Create or replace the role record of `uid`.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or the write fails.
pub async fn grant(
    store: &dyn DocumentStore,
    uid: &str,
    email: Option<String>,
    role: &str,
    business_id: Option<String>,
) -> Result<(), UserError> {
    let record = role_record(uid, email, role, business_id)?;
    UserRepository::new(store).put(&record).await?;

    match &record.business_id {
        Some(business_id) => tracing::info!(
            "Granted {} to {} for business {}",
            record.role,
            record.uid,
            business_id
        ),
        None => tracing::info!("Granted {} to {}", record.role, record.uid),
    }
    Ok(())
}

/// Print the role record of `uid`.
///
/// # Errors
///
/// Returns an error if the read fails.
pub async fn show(store: &dyn DocumentStore, uid: &str) -> Result<(), UserError> {
    match UserRepository::new(store).get(&UserId::new(uid)).await? {
        Some(record) => tracing::info!(
            "{}: role={} email={} business={}",
            record.uid,
            record.role,
            record.email.as_deref().unwrap_or("-"),
            record.business_id.as_ref().map_or("-", BusinessId::as_str)
        ),
        None => tracing::warn!("No role record for {uid}"),
    }
    Ok(())
}

//! Creating a business and provisioning its login.

use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::SecretString;
use thiserror::Error;

use stampcard_core::BusinessId;
use stampcard_core::validation::{BusinessForm, BusinessFormError};

use crate::db::{BusinessRepository, RepositoryError};
use crate::services::backend::{BackendError, LoyaltyBackend};
use crate::services::store::DocumentStore;

const TEMPORARY_PASSWORD_LENGTH: usize = 12;

/// Errors that stop a business from being created.
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Invalid(#[from] BusinessFormError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A business that was written to the store.
#[derive(Debug)]
pub struct Onboarded {
    pub business_id: BusinessId,
    pub login_email: String,
    /// Outcome of the login provisioning call. The business document stays
    /// even when this failed.
    pub login: Result<(), BackendError>,
    /// Set only when the password was generated here; the admin has no
    /// other way to learn it.
    pub generated_password: Option<SecretString>,
}

/// Generate a random alphanumeric password.
#[must_use]
pub fn temporary_password() -> SecretString {
    let password: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LENGTH)
        .map(char::from)
        .collect();
    SecretString::from(password)
}

/// Validate the form, write the business, then ask the backend to create
/// its login.
///
/// Nothing is written unless validation passes. The password is the form
/// value, else `default_password`, else a random one.
///
/// # Errors
///
/// Returns `OnboardingError::Invalid` for a rejected form (including a
/// missing backend), or `OnboardingError::Repository` if the write fails.
pub async fn create_business(
    store: &dyn DocumentStore,
    backend: Option<&dyn LoyaltyBackend>,
    form: &BusinessForm,
    default_password: Option<&SecretString>,
) -> Result<Onboarded, OnboardingError> {
    let valid = form.validate(backend.is_some())?;
    let Some(backend) = backend else {
        return Err(BusinessFormError::BackendNotConfigured.into());
    };

    let business_id = BusinessRepository::new(store).create(&valid.business).await?;
    tracing::info!(business_id = %business_id, name = %valid.business.name, "Business created");

    let (password, generated_password) = match valid
        .password
        .map(SecretString::from)
        .or_else(|| default_password.cloned())
    {
        Some(password) => (password, None),
        None => {
            let password = temporary_password();
            (password.clone(), Some(password))
        }
    };

    let login = backend
        .create_business_user(&business_id, &valid.login_email, &password)
        .await;
    if let Err(e) = &login {
        tracing::warn!(business_id = %business_id, error = %e, "Business login provisioning failed");
    }

    Ok(Onboarded {
        business_id,
        login_email: valid.login_email.into_inner(),
        login,
        generated_password,
    })
}

//! Public enrollment: a customer joins a business's loyalty program.

use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use stampcard_core::{BusinessId, CustomerId, NewCustomer};

use crate::db::{CustomerRepository, RepositoryError};
use crate::services::store::DocumentStore;

/// How long a used submission id is remembered.
const SUBMISSION_TTL: Duration = Duration::from_secs(30 * 60);
const MAX_REMEMBERED_SUBMISSIONS: u64 = 100_000;

/// The enrollment form as posted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentForm {
    #[serde(default)]
    pub submission_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub birthday: String,
}

/// Errors that stop an enrollment.
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EnrollmentForm {
    /// Trimmed customer fields, or the first empty one.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::MissingField` naming the first empty field.
    pub fn to_customer(&self, business_id: &BusinessId) -> Result<NewCustomer, EnrollmentError> {
        let field = |value: &str, label: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(EnrollmentError::MissingField(label))
            } else {
                Ok(value.to_owned())
            }
        };
        Ok(NewCustomer {
            name: field(&self.name, "Name")?,
            email: field(&self.email, "Email")?,
            phone: field(&self.phone, "Phone")?,
            birthday: field(&self.birthday, "Birthday")?,
            business_id: business_id.clone(),
        })
    }
}

/// Remembers submission ids that already produced a customer.
#[derive(Clone)]
pub struct SubmissionGuard {
    used: Cache<String, ()>,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            used: Cache::builder()
                .max_capacity(MAX_REMEMBERED_SUBMISSIONS)
                .time_to_live(SUBMISSION_TTL)
                .build(),
        }
    }

    /// A fresh id to embed in a rendered form.
    #[must_use]
    pub fn issue(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Mark `id` as used. Returns `false` if it was already used.
    ///
    /// An empty id is always accepted.
    pub async fn claim(&self, id: &str) -> bool {
        if id.is_empty() {
            return true;
        }
        self.used
            .entry(id.to_owned())
            .or_insert(())
            .await
            .is_fresh()
    }

    /// Release a claim whose write failed so the form can be resubmitted.
    pub async fn release(&self, id: &str) {
        self.used.invalidate(id).await;
    }
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrolled {
    /// A new customer was written.
    Created { customer_id: CustomerId, email: String },
    /// The submission id was already used; nothing was written.
    Duplicate { email: String },
}

/// Create the customer for a submitted form, at most once per submission id.
///
/// # Errors
///
/// Returns `EnrollmentError::MissingField` for an incomplete form, or
/// `EnrollmentError::Repository` if the write fails.
pub async fn enroll(
    store: &dyn DocumentStore,
    guard: &SubmissionGuard,
    business_id: &BusinessId,
    form: &EnrollmentForm,
) -> Result<Enrolled, EnrollmentError> {
    let customer = form.to_customer(business_id)?;

    if !guard.claim(&form.submission_id).await {
        tracing::info!(business_id = %business_id, "Duplicate enrollment submission ignored");
        return Ok(Enrolled::Duplicate {
            email: customer.email,
        });
    }

    match CustomerRepository::new(store).create(&customer).await {
        Ok(customer_id) => {
            tracing::info!(business_id = %business_id, customer_id = %customer_id, "Customer enrolled");
            Ok(Enrolled::Created {
                customer_id,
                email: customer.email,
            })
        }
        Err(e) => {
            guard.release(&form.submission_id).await;
            Err(e.into())
        }
    }
}

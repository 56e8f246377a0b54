//! Client for the loyalty (pass-generation) backend.
//!
//! Two calls are made from this service:
//!
//! - `POST {base}/api/admin/createBusinessUser` with
//!   `{businessId, email, password}` provisions a business login
//! - `POST {base}/api/stamp/{businessId}/{email}` (no body) issues a stamp
//!
//! Neither is retried. Any non-2xx status is a failure; the response body,
//! if any, is kept as the error message.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use stampcard_core::{BusinessId, Email, links};

/// Errors returned by a [`LoyaltyBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("backend error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Operations delegated to the loyalty backend.
#[async_trait]
pub trait LoyaltyBackend: Send + Sync {
    /// Base URL, used to build pass download links.
    fn base_url(&self) -> &str;

    /// Create the login for a newly created business.
    async fn create_business_user(
        &self,
        business_id: &BusinessId,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), BackendError>;

    /// Issue one stamp to the customer with this email.
    async fn issue_stamp(&self, business_id: &BusinessId, email: &str) -> Result<(), BackendError>;
}

/// Loyalty backend reached over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBusinessUserRequest<'a> {
    business_id: &'a str,
    email: &'a str,
    password: &'a str,
}

impl HttpBackend {
    /// Create a new client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: base_url.trim_end_matches('/').to_owned(),
            }),
        })
    }

    async fn check(response: reqwest::Response) -> Result<(), BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl LoyaltyBackend for HttpBackend {
    fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[instrument(skip(self, password), fields(business_id = %business_id))]
    async fn create_business_user(
        &self,
        business_id: &BusinessId,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), BackendError> {
        let response = self
            .inner
            .client
            .post(links::create_business_user_url(&self.inner.base_url))
            .json(&CreateBusinessUserRequest {
                business_id: business_id.as_str(),
                email: email.as_str(),
                password: password.expose_secret(),
            })
            .send()
            .await?;
        Self::check(response).await
    }

    #[instrument(skip(self), fields(business_id = %business_id))]
    async fn issue_stamp(&self, business_id: &BusinessId, email: &str) -> Result<(), BackendError> {
        let response = self
            .inner
            .client
            .post(links::stamp_url(&self.inner.base_url, business_id, email))
            .send()
            .await?;
        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let backend = HttpBackend::new("https://api.example.com/").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(backend.base_url(), "https://api.example.com");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(CreateBusinessUserRequest {
            business_id: "b1",
            email: "owner@kess.io",
            password: "Tq7!vR2mLp",
        })
        .unwrap_or_default();
        assert_eq!(body["businessId"], "b1");
        assert_eq!(body["email"], "owner@kess.io");
        assert_eq!(body["password"], "Tq7!vR2mLp");
    }
}

//! Firebase Authentication via the Identity Toolkit REST API.
//!
//! - Endpoint: `POST https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=...`
//! - Errors come back as `400` with `error.message` set to a code such as
//!   `INVALID_LOGIN_CREDENTIALS` or `TOO_MANY_ATTEMPTS_TRY_LATER : ...`.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stampcard_core::UserId;

use super::{Identity, IdentityError, IdentityProvider};
use crate::config::FirebaseConfig;

const PRODUCTION_ROOT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Firebase Authentication client.
#[derive(Clone)]
pub struct FirebaseIdentity {
    inner: Arc<FirebaseIdentityInner>,
}

struct FirebaseIdentityInner {
    client: reqwest::Client,
    sign_in_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseIdentity {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, IdentityError> {
        let root = config.auth_emulator_host.as_ref().map_or_else(
            || PRODUCTION_ROOT.to_owned(),
            |h| format!("http://{h}/identitytoolkit.googleapis.com/v1"),
        );
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            inner: Arc::new(FirebaseIdentityInner {
                client,
                sign_in_url: format!("{root}/accounts:signInWithPassword"),
                api_key: config.api_key.clone(),
            }),
        })
    }
}

/// Map an Identity Toolkit error code to an [`IdentityError`].
fn classify_error(status: u16, message: &str) -> IdentityError {
    // Codes may carry a suffix: "TOO_MANY_ATTEMPTS_TRY_LATER : Access ..."
    let code = message.split_whitespace().next().unwrap_or_default();
    match code {
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" | "INVALID_EMAIL" => {
            IdentityError::InvalidCredentials
        }
        "TOO_MANY_ATTEMPTS_TRY_LATER" => IdentityError::TooManyAttempts,
        "USER_DISABLED" => IdentityError::Disabled,
        _ => IdentityError::Api {
            status,
            message: message.to_owned(),
        },
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Identity, IdentityError> {
        let response = self
            .inner
            .client
            .post(&self.inner.sign_in_url)
            .query(&[("key", self.inner.api_key.expose_secret())])
            .json(&SignInRequest {
                email,
                password: password.expose_secret(),
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_error(status, &message));
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(format!("Failed to parse sign-in response: {e}")))?;

        Ok(Identity {
            uid: UserId::new(body.local_id),
            email: body.email.unwrap_or_else(|| email.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error(400, "INVALID_LOGIN_CREDENTIALS"),
            IdentityError::InvalidCredentials
        ));
        assert!(matches!(
            classify_error(400, "TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been temporarily disabled"),
            IdentityError::TooManyAttempts
        ));
        assert!(matches!(
            classify_error(400, "USER_DISABLED"),
            IdentityError::Disabled
        ));
        assert!(matches!(
            classify_error(500, "INTERNAL"),
            IdentityError::Api { status: 500, .. }
        ));
    }
}

//! In-process identity provider for development and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use stampcard_core::UserId;

use super::{Identity, IdentityError, IdentityProvider};

struct Account {
    uid: UserId,
    email: String,
    password: SecretString,
}

/// Accounts keyed by lowercased email.
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return its uid. Re-registering an email
    /// replaces the password and keeps the uid.
    pub fn add_account(&self, email: &str, password: &str) -> UserId {
        let key = email.to_lowercase();
        let mut accounts = match self.accounts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let uid = accounts
            .get(&key)
            .map_or_else(|| UserId::new(Uuid::new_v4().simple().to_string()), |a| a.uid.clone());
        accounts.insert(
            key,
            Account {
                uid: uid.clone(),
                email: email.to_owned(),
                password: SecretString::from(password.to_owned()),
            },
        );
        uid
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Identity, IdentityError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| IdentityError::Parse("identity lock poisoned".to_string()))?;
        let account = accounts
            .get(&email.to_lowercase())
            .ok_or(IdentityError::InvalidCredentials)?;
        if account.password.expose_secret() != password.expose_secret() {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(Identity {
            uid: account.uid.clone(),
            email: account.email.clone(),
        })
    }
}

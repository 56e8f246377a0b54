//! `users/{uid}` role records.

use stampcard_core::{BusinessId, Role, UserId, UserRecord};

use super::RepositoryError;
use crate::services::store::{Document, DocumentStore, Fields};

const COLLECTION: &str = "users";

fn from_document(doc: &Document) -> Result<UserRecord, RepositoryError> {
    let role = doc
        .str("role")
        .ok_or_else(|| RepositoryError::DataCorruption(format!("user {} has no role", doc.id)))?
        .parse::<Role>()
        .map_err(|e| RepositoryError::DataCorruption(format!("user {}: {e}", doc.id)))?;
    let business_id = doc
        .str("businessId")
        .filter(|s| !s.is_empty())
        .map(|s| {
            BusinessId::parse(s).map_err(|e| {
                RepositoryError::DataCorruption(format!("user {} business id: {e}", doc.id))
            })
        })
        .transpose()?;

    Ok(UserRecord {
        uid: UserId::new(doc.id.clone()),
        email: doc.string("email"),
        role,
        business_id,
    })
}

/// Repository for role records.
pub struct UserRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get the role record of an identity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the role is missing or unknown.
    pub async fn get(&self, uid: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        self.store
            .get_document(COLLECTION, uid.as_str())
            .await?
            .as_ref()
            .map(from_document)
            .transpose()
    }

    /// Create or replace a role record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn put(&self, record: &UserRecord) -> Result<(), RepositoryError> {
        let mut fields = Fields::new();
        fields.insert("uid".into(), record.uid.as_str().into());
        fields.insert("email".into(), record.email.clone().into());
        fields.insert("role".into(), record.role.as_str().into());
        if let Some(id) = &record.business_id {
            fields.insert("businessId".into(), id.as_str().into());
        }
        self.store
            .set_document(COLLECTION, record.uid.as_str(), fields)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::store::{FieldValue, MemoryStore};

    #[tokio::test]
    async fn test_round_trip_business_user() {
        let store = MemoryStore::new();
        let repo = UserRepository::new(&store);
        let record = UserRecord {
            uid: UserId::new("u1"),
            email: Some("owner@kess.io".into()),
            role: Role::Business,
            business_id: Some(BusinessId::new("b1")),
        };
        repo.put(&record).await.unwrap();
        assert_eq!(repo.get(&record.uid).await.unwrap(), Some(record));
        assert_eq!(repo.get(&UserId::new("nobody")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_role_is_corruption() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("role".into(), FieldValue::String("superuser".into()));
        store.set_document(COLLECTION, "u1", fields).await.unwrap();

        let err = UserRepository::new(&store)
            .get(&UserId::new("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}

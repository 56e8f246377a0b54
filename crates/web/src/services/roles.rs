//! Role lookup with a short-lived cache.
//!
//! Every gated request needs the signed-in identity's user record. Records
//! change rarely (only when an admin provisions a business), so successful
//! lookups are cached per uid. Failures are never cached; the next request
//! retries the store.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use stampcard_core::{UserId, UserRecord};

use crate::db::{RepositoryError, UserRepository};
use crate::services::store::DocumentStore;

const MAX_CACHED_ROLES: u64 = 10_000;

/// Outcome of resolving the user record for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleLookup {
    /// No identity in the session.
    NotSignedIn,
    /// The store could not be read.
    Failed,
    /// Signed in, but no user record exists for the uid.
    Missing,
    /// The user record.
    Found(UserRecord),
}

#[derive(Debug, thiserror::Error)]
enum LookupError {
    #[error("no user record")]
    Missing,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Cache of user records keyed by uid.
#[derive(Clone)]
pub struct RoleCache {
    cache: Cache<UserId, UserRecord>,
}

impl RoleCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_CACHED_ROLES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Resolve the user record for `uid`.
    pub async fn lookup(&self, store: &Arc<dyn DocumentStore>, uid: &UserId) -> RoleLookup {
        let store = Arc::clone(store);
        let key = uid.clone();
        let result = self
            .cache
            .try_get_with(uid.clone(), async move {
                UserRepository::new(store.as_ref())
                    .get(&key)
                    .await?
                    .ok_or(LookupError::Missing)
            })
            .await;

        match result {
            Ok(record) => RoleLookup::Found(record),
            Err(e) => match e.as_ref() {
                LookupError::Missing => RoleLookup::Missing,
                LookupError::Repository(err) => {
                    tracing::warn!(uid = %uid, error = %err, "Role lookup failed");
                    RoleLookup::Failed
                }
            },
        }
    }

    /// Forget the cached record for `uid` (logout).
    pub async fn invalidate(&self, uid: &UserId) {
        self.cache.invalidate(uid).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stampcard_core::{BusinessId, Role};

    use super::*;
    use crate::services::store::MemoryStore;

    fn store() -> Arc<dyn DocumentStore> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_missing_record_is_not_cached() {
        let store = store();
        let roles = RoleCache::new(Duration::from_secs(60));
        let uid = UserId::new("u1");

        assert_eq!(roles.lookup(&store, &uid).await, RoleLookup::Missing);

        let record = UserRecord {
            uid: uid.clone(),
            email: Some("owner@example.com".to_owned()),
            role: Role::Business,
            business_id: Some(BusinessId::new("b1")),
        };
        UserRepository::new(store.as_ref())
            .put(&record)
            .await
            .unwrap();

        assert_eq!(roles.lookup(&store, &uid).await, RoleLookup::Found(record));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let store = store();
        let roles = RoleCache::new(Duration::from_secs(60));
        let uid = UserId::new("u2");
        let mut record = UserRecord {
            uid: uid.clone(),
            email: None,
            role: Role::Business,
            business_id: Some(BusinessId::new("b1")),
        };
        let repo = UserRepository::new(store.as_ref());
        repo.put(&record).await.unwrap();
        assert_eq!(
            roles.lookup(&store, &uid).await,
            RoleLookup::Found(record.clone())
        );

        record.role = Role::Admin;
        record.business_id = None;
        repo.put(&record).await.unwrap();
        roles.invalidate(&uid).await;

        assert_eq!(roles.lookup(&store, &uid).await, RoleLookup::Found(record));
    }
}

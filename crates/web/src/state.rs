//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;

use stampcard_core::{Role, UserRecord};

use crate::config::{AppConfig, StoreBackend};
use crate::db::{RepositoryError, UserRepository};
use crate::services::backend::{BackendError, HttpBackend, LoyaltyBackend};
use crate::services::directory::DirectoryRegistry;
use crate::services::enrollment::SubmissionGuard;
use crate::services::identity::{
    FirebaseIdentity, IdentityError, IdentityProvider, MemoryIdentity,
};
use crate::services::roles::RoleCache;
use crate::services::store::{DocumentStore, FirestoreStore, MemoryStore, StoreError};

/// Errors building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),
    #[error("loyalty backend: {0}")]
    Backend(#[from] BackendError),
    #[error("seeding dev admin: {0}")]
    Seed(#[from] RepositoryError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the identity provider, the loyalty backend and the shared caches.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    backend: Option<Arc<dyn LoyaltyBackend>>,
    roles: RoleCache,
    directories: DirectoryRegistry,
    submissions: SubmissionGuard,
}

impl AppState {
    /// Build the state described by `config`.
    ///
    /// With the memory backend and a configured dev admin, the admin account
    /// and its user record are created here.
    ///
    /// # Errors
    ///
    /// Returns an error if a client fails to build or the dev admin cannot
    /// be seeded.
    pub async fn new(config: AppConfig) -> Result<Self, StateError> {
        let (store, identity): (Arc<dyn DocumentStore>, Arc<dyn IdentityProvider>) =
            match &config.store {
                StoreBackend::Firestore(firebase) => (
                    Arc::new(FirestoreStore::new(firebase)?) as Arc<dyn DocumentStore>,
                    Arc::new(FirebaseIdentity::new(firebase)?) as Arc<dyn IdentityProvider>,
                ),
                StoreBackend::Memory { dev_admin } => {
                    let store = Arc::new(MemoryStore::new());
                    let identity = Arc::new(MemoryIdentity::new());
                    if let Some(admin) = dev_admin {
                        let uid =
                            identity.add_account(&admin.email, admin.password.expose_secret());
                        UserRepository::new(store.as_ref())
                            .put(&UserRecord {
                                uid,
                                email: Some(admin.email.clone()),
                                role: Role::Admin,
                                business_id: None,
                            })
                            .await?;
                        tracing::info!(email = %admin.email, "Seeded development admin");
                    }
                    (
                        store as Arc<dyn DocumentStore>,
                        identity as Arc<dyn IdentityProvider>,
                    )
                }
            };

        let backend = match &config.loyalty_api_url {
            Some(url) => Some(Arc::new(HttpBackend::new(url)?) as Arc<dyn LoyaltyBackend>),
            None => {
                tracing::warn!("LOYALTY_API_URL not set; business creation and stamps are disabled");
                None
            }
        };

        Ok(Self::from_parts(config, store, identity, backend))
    }

    /// Assemble state from already-built collaborators.
    #[must_use]
    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        backend: Option<Arc<dyn LoyaltyBackend>>,
    ) -> Self {
        let roles = RoleCache::new(config.role_cache_ttl);
        let directories = DirectoryRegistry::new(Arc::clone(&store), config.live_poll_interval);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                identity,
                backend,
                roles,
                directories,
                submissions: SubmissionGuard::new(),
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// The document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    /// The identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// The loyalty backend, if configured.
    #[must_use]
    pub fn backend(&self) -> Option<&dyn LoyaltyBackend> {
        self.inner.backend.as_deref()
    }

    /// Cached role lookups.
    #[must_use]
    pub fn roles(&self) -> &RoleCache {
        &self.inner.roles
    }

    /// Open live directories.
    #[must_use]
    pub fn directories(&self) -> &DirectoryRegistry {
        &self.inner.directories
    }

    /// Enrollment double-submit guard.
    #[must_use]
    pub fn submissions(&self) -> &SubmissionGuard {
        &self.inner.submissions
    }
}

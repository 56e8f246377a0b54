//! Live directories shared by every viewer.
//!
//! A [`CustomerDirectory`] holds the roster of one business, fed by a live
//! query on its customers. A [`BusinessDirectory`] holds every business for
//! the admin dashboard. Both are opened on first use and kept in a
//! [`DirectoryRegistry`] until idle; dropping a directory cancels its live
//! query.
//!
//! Viewers learn about changes through a [`watch`] version counter and pull
//! a fresh [`CustomerView`] when it moves.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tokio::sync::watch;

use stampcard_core::roster::{CustomerRoster, RosterRow, RosterStats};
use stampcard_core::search;
use stampcard_core::{Business, BusinessId, Customer};

use crate::db::{BusinessRepository, RepositoryError, businesses, customers};
use crate::services::backend::{BackendError, LoyaltyBackend};
use crate::services::store::DocumentStore;
use crate::services::store::live::{self, Subscription};

/// Directories nobody has looked at for this long are closed.
const DIRECTORY_IDLE: Duration = Duration::from_secs(10 * 60);
const MAX_OPEN_DIRECTORIES: u64 = 1_000;

/// Errors opening a directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("business not found: {0}")]
    BusinessNotFound(BusinessId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State written by the live query and read by viewers.
struct Live<T> {
    value: Mutex<T>,
    error: Mutex<Option<String>>,
    version: watch::Sender<u64>,
}

impl<T> Live<T> {
    fn new(value: T) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            value: Mutex::new(value),
            error: Mutex::new(None),
            version,
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn set_error(&self, error: Option<String>) {
        *lock(&self.error) = error;
    }

    fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }
}

/// What a viewer renders for one business.
#[derive(Debug, Clone)]
pub struct CustomerView {
    pub rows: Vec<RosterRow>,
    pub stats: RosterStats,
    pub error: Option<String>,
}

/// Result of a stamp request.
#[derive(Debug)]
pub enum StampOutcome {
    /// The backend accepted the stamp.
    Issued,
    /// The backend rejected the stamp; the optimistic increment was undone.
    Failed(BackendError),
    /// No customer with that email in this business.
    UnknownCustomer,
    /// The directory closed while the request was in flight. Nothing is
    /// left to reconcile.
    Discarded,
}

/// Live roster of one business.
pub struct CustomerDirectory {
    business: Business,
    live: Arc<Live<CustomerRoster>>,
    _subscription: Subscription,
}

impl CustomerDirectory {
    /// Load the business and its customers, then follow changes.
    ///
    /// The first load is awaited so the initial page is complete.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::BusinessNotFound` if the business does not
    /// exist, or `DirectoryError::Repository` if the store cannot be read.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        business_id: &BusinessId,
        poll_interval: Duration,
    ) -> Result<Self, DirectoryError> {
        let business = BusinessRepository::new(store.as_ref())
            .get(business_id)
            .await?
            .ok_or_else(|| DirectoryError::BusinessNotFound(business_id.clone()))?;

        let query = customers::for_business_query(business_id);
        let seed = store
            .query(&query)
            .await
            .map_err(RepositoryError::from)?;

        let mut roster = CustomerRoster::new();
        roster.apply_snapshot(customers::from_documents(&seed));
        let live = Arc::new(Live::new(roster));

        let subscription = live::subscribe(store, query, poll_interval, Some(seed), {
            let live = Arc::clone(&live);
            move |result| {
                match result {
                    Ok(docs) => {
                        lock(&live.value).apply_snapshot(customers::from_documents(&docs));
                        live.set_error(None);
                    }
                    Err(e) => live.set_error(Some(e.to_string())),
                }
                live.bump();
            }
        });

        tracing::debug!(business_id = %business_id, "Customer directory opened");

        Ok(Self {
            business,
            live,
            _subscription: subscription,
        })
    }

    /// The business this directory belongs to.
    #[must_use]
    pub const fn business(&self) -> &Business {
        &self.business
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.live.version.subscribe()
    }

    /// Rows matching `query` plus stats over the whole roster.
    #[must_use]
    pub fn view(&self, query: &str) -> CustomerView {
        let roster = lock(&self.live.value);
        let rows = roster
            .rows()
            .into_iter()
            .filter(|row| search::matches(&row.customer, query))
            .collect();
        CustomerView {
            rows,
            stats: roster.stats(),
            error: self.live.error(),
        }
    }

    /// A customer of this business by document id, with stamps as
    /// displayed.
    #[must_use]
    pub fn customer(&self, id: &str) -> Option<Customer> {
        let roster = lock(&self.live.value);
        let mut customer = roster.customer(id)?.clone();
        if let Some(email) = customer.email.as_deref() {
            if let Some(stamps) = roster.displayed_stamps(email) {
                customer.stamps = stamps;
            }
        }
        Some(customer)
    }

    /// Issue one stamp with an optimistic increment.
    ///
    /// The displayed count goes up before the backend is called. On failure
    /// it returns to the exact prior value. Only a weak handle is held across
    /// the backend call: if every other handle is dropped meanwhile, the
    /// result is discarded.
    pub async fn issue_stamp(
        directory: Arc<Self>,
        backend: &dyn LoyaltyBackend,
        email: &str,
    ) -> StampOutcome {
        let Some(ticket) = lock(&directory.live.value).begin_stamp(email) else {
            return StampOutcome::UnknownCustomer;
        };
        directory.live.bump();

        let business_id = directory.business.id.clone();
        let handle: Weak<Self> = Arc::downgrade(&directory);
        drop(directory);

        let result = backend.issue_stamp(&business_id, email).await;

        let Some(directory) = handle.upgrade() else {
            tracing::debug!(business_id = %business_id, "Directory closed before stamp completed");
            return StampOutcome::Discarded;
        };

        let outcome = match result {
            Ok(()) => {
                lock(&directory.live.value).confirm(ticket);
                tracing::info!(business_id = %business_id, "Stamp issued");
                StampOutcome::Issued
            }
            Err(e) => {
                lock(&directory.live.value).roll_back(ticket);
                tracing::warn!(business_id = %business_id, error = %e, "Stamp failed, rolled back");
                StampOutcome::Failed(e)
            }
        };
        directory.live.bump();
        outcome
    }
}

/// Live list of every business, newest first.
pub struct BusinessDirectory {
    live: Arc<Live<Vec<Business>>>,
    _subscription: Subscription,
}

impl BusinessDirectory {
    /// Load all businesses, then follow changes.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Repository` if the store cannot be read.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        poll_interval: Duration,
    ) -> Result<Self, DirectoryError> {
        let query = businesses::all_query();
        let seed = store
            .query(&query)
            .await
            .map_err(RepositoryError::from)?;
        let live = Arc::new(Live::new(
            seed.iter().map(businesses::from_document).collect::<Vec<_>>(),
        ));

        let subscription = live::subscribe(store, query, poll_interval, Some(seed), {
            let live = Arc::clone(&live);
            move |result| {
                match result {
                    Ok(docs) => {
                        *lock(&live.value) = docs.iter().map(businesses::from_document).collect();
                        live.set_error(None);
                    }
                    Err(e) => live.set_error(Some(e.to_string())),
                }
                live.bump();
            }
        });

        Ok(Self {
            live,
            _subscription: subscription,
        })
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.live.version.subscribe()
    }

    /// Businesses matching `query`, in directory order.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Business> {
        search::filter(lock(&self.live.value).iter(), query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Error from the most recent refresh, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.live.error()
    }

    /// Look up one business by id.
    #[must_use]
    pub fn get(&self, id: &BusinessId) -> Option<Business> {
        lock(&self.live.value).iter().find(|b| &b.id == id).cloned()
    }
}

/// Open directories, shared across requests.
#[derive(Clone)]
pub struct DirectoryRegistry {
    store: Arc<dyn DocumentStore>,
    poll_interval: Duration,
    customers: Cache<BusinessId, Arc<CustomerDirectory>>,
    businesses: Cache<(), Arc<BusinessDirectory>>,
}

impl DirectoryRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
            customers: Cache::builder()
                .max_capacity(MAX_OPEN_DIRECTORIES)
                .time_to_idle(DIRECTORY_IDLE)
                .build(),
            businesses: Cache::builder()
                .max_capacity(1)
                .time_to_idle(DIRECTORY_IDLE)
                .build(),
        }
    }

    /// The customer directory of a business, opening it if needed.
    ///
    /// Concurrent first requests share one open.
    ///
    /// # Errors
    ///
    /// Returns the open error; it is not cached.
    pub async fn customers(
        &self,
        business_id: &BusinessId,
    ) -> Result<Arc<CustomerDirectory>, Arc<DirectoryError>> {
        let store = Arc::clone(&self.store);
        let poll = self.poll_interval;
        let id = business_id.clone();
        self.customers
            .try_get_with(business_id.clone(), async move {
                CustomerDirectory::open(store, &id, poll).await.map(Arc::new)
            })
            .await
    }

    /// The business directory, opening it if needed.
    ///
    /// # Errors
    ///
    /// Returns the open error; it is not cached.
    pub async fn businesses(&self) -> Result<Arc<BusinessDirectory>, Arc<DirectoryError>> {
        let store = Arc::clone(&self.store);
        let poll = self.poll_interval;
        self.businesses
            .try_get_with((), async move {
                BusinessDirectory::open(store, poll).await.map(Arc::new)
            })
            .await
    }
}

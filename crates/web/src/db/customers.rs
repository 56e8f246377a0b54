//! `customers/{id}` documents.

use chrono::Utc;

use stampcard_core::{BusinessId, Customer, CustomerId, NewCustomer};

use super::RepositoryError;
use crate::services::store::{Document, DocumentStore, Fields, Query};

const COLLECTION: &str = "customers";

/// Map a stored document.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if the document has no business id.
pub fn from_document(doc: &Document) -> Result<Customer, RepositoryError> {
    let business_id = doc
        .string("businessId")
        .map(BusinessId::new)
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("customer {} has no businessId", doc.id))
        })?;

    Ok(Customer {
        id: CustomerId::new(doc.id.clone()),
        name: doc.string("name"),
        email: doc.string("email"),
        phone: doc.string("phone"),
        birthday: doc.string("birthday"),
        business_id,
        stamps: doc.count("stamps").unwrap_or(0),
        rewards_earned: doc.count("rewardsEarned"),
        rewards_redeemed: doc.count("rewardsRedeemed"),
        last_stamp_at: doc.timestamp("lastStampAt"),
        last_reward_earned_at: doc.timestamp("lastRewardEarnedAt"),
        last_reward_redeemed_at: doc.timestamp("lastRewardRedeemedAt"),
        push_token: doc.string("pushToken"),
        device_library_identifier: doc.string("deviceLibraryIdentifier"),
        created_at: doc.timestamp("createdAt"),
        updated_at: doc.update_time,
    })
}

/// Map a snapshot, skipping documents that fail to decode.
#[must_use]
pub fn from_documents(docs: &[Document]) -> Vec<Customer> {
    docs.iter()
        .filter_map(|doc| match from_document(doc) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable customer");
                None
            }
        })
        .collect()
}

/// Every customer of one business.
#[must_use]
pub fn for_business_query(business_id: &BusinessId) -> Query {
    Query::collection(COLLECTION).filter_eq("businessId", business_id.as_str())
}

/// Repository for customers.
pub struct CustomerRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Enroll a customer with zero stamps.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn create(&self, customer: &NewCustomer) -> Result<CustomerId, RepositoryError> {
        let mut fields = Fields::new();
        fields.insert("name".into(), customer.name.clone().into());
        fields.insert("email".into(), customer.email.clone().into());
        fields.insert("phone".into(), customer.phone.clone().into());
        fields.insert("birthday".into(), customer.birthday.clone().into());
        fields.insert("businessId".into(), customer.business_id.as_str().into());
        fields.insert("stamps".into(), 0_i64.into());
        fields.insert("createdAt".into(), Utc::now().into());

        let id = self.store.create_document(COLLECTION, fields).await?;
        Ok(CustomerId::new(id))
    }

    /// Get one customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the document is unreadable.
    pub async fn get(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        self.store
            .get_document(COLLECTION, id.as_str())
            .await?
            .as_ref()
            .map(from_document)
            .transpose()
    }

    /// List every customer of a business (store order).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the query fails.
    pub async fn list_for_business(
        &self,
        business_id: &BusinessId,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let docs = self.store.query(&for_business_query(business_id)).await?;
        Ok(from_documents(&docs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;

    #[tokio::test]
    async fn test_create_starts_at_zero() {
        let store = MemoryStore::new();
        let repo = CustomerRepository::new(&store);
        let id = repo
            .create(&NewCustomer {
                name: "Ann".into(),
                email: "ann@example.com".into(),
                phone: "555-0100".into(),
                birthday: "1990-04-02".into(),
                business_id: BusinessId::new("b1"),
            })
            .await
            .unwrap();

        let customer = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(customer.stamps, 0);
        assert_eq!(customer.business_id.as_str(), "b1");
        assert!(customer.updated_at.is_some());
        assert!(!customer.card_installed());

        assert_eq!(repo.list_for_business(&BusinessId::new("b1")).await.unwrap().len(), 1);
        assert!(repo.list_for_business(&BusinessId::new("b2")).await.unwrap().is_empty());
    }

    #[test]
    fn test_missing_stamps_reads_zero() {
        let mut fields = Fields::new();
        fields.insert("businessId".into(), "b1".into());
        let doc = Document {
            id: "c1".into(),
            fields,
            update_time: None,
        };
        assert_eq!(from_document(&doc).unwrap().stamps, 0);
    }

    #[test]
    fn test_missing_business_is_corruption() {
        let doc = Document {
            id: "c1".into(),
            fields: Fields::new(),
            update_time: None,
        };
        assert!(from_documents(std::slice::from_ref(&doc)).is_empty());
    }
}

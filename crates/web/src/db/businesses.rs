//! `businesses/{id}` documents.

use chrono::Utc;

use stampcard_core::{Business, BusinessId, DEFAULT_BRAND_COLOR, DEFAULT_GOAL_STAMPS, NewBusiness};

use super::RepositoryError;
use crate::services::store::{Direction, Document, DocumentStore, Fields, Query};

const COLLECTION: &str = "businesses";

/// Map a stored document. Missing optional fields take their defaults.
#[must_use]
pub fn from_document(doc: &Document) -> Business {
    Business {
        id: BusinessId::new(doc.id.clone()),
        name: doc.string("name").unwrap_or_default(),
        color: doc
            .string("color")
            .unwrap_or_else(|| DEFAULT_BRAND_COLOR.to_owned()),
        goal_stamps: doc
            .count("goalStamps")
            .filter(|g| *g > 0)
            .unwrap_or(DEFAULT_GOAL_STAMPS),
        promo_message: doc.string("promoMessage"),
        logo_url: doc.string("logoUrl"),
        pass_type_identifier: doc.string("passTypeIdentifier").unwrap_or_default(),
        team_identifier: doc.string("teamIdentifier").unwrap_or_default(),
        logo_text: doc.string("logoText"),
        created_at: doc.timestamp("createdAt"),
    }
}

/// Every business, newest first.
#[must_use]
pub fn all_query() -> Query {
    Query::collection(COLLECTION).order_by("createdAt", Direction::Descending)
}

/// Repository for businesses.
pub struct BusinessRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> BusinessRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Create a business and return its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn create(&self, business: &NewBusiness) -> Result<BusinessId, RepositoryError> {
        let mut fields = Fields::new();
        fields.insert("name".into(), business.name.clone().into());
        fields.insert("color".into(), business.color.clone().into());
        fields.insert("goalStamps".into(), business.goal_stamps.into());
        fields.insert("promoMessage".into(), business.promo_message.clone().into());
        fields.insert("logoUrl".into(), business.logo_url.clone().into());
        fields.insert(
            "passTypeIdentifier".into(),
            business.pass_type_identifier.as_str().into(),
        );
        fields.insert(
            "teamIdentifier".into(),
            business.team_identifier.clone().into(),
        );
        fields.insert("logoText".into(), business.logo_text().into());
        fields.insert("logoPath".into(), business.logo_path().into());
        fields.insert("iconPath".into(), business.icon_path().into());
        fields.insert("createdAt".into(), Utc::now().into());

        let id = self.store.create_document(COLLECTION, fields).await?;
        Ok(BusinessId::new(id))
    }

    /// Get one business.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    pub async fn get(&self, id: &BusinessId) -> Result<Option<Business>, RepositoryError> {
        Ok(self
            .store
            .get_document(COLLECTION, id.as_str())
            .await?
            .as_ref()
            .map(from_document))
    }

    /// List every business, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the query fails.
    pub async fn list(&self) -> Result<Vec<Business>, RepositoryError> {
        Ok(self
            .store
            .query(&all_query())
            .await?
            .iter()
            .map(from_document)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stampcard_core::PassTypeIdentifier;

    use super::*;
    use crate::services::store::{FieldValue, MemoryStore};

    #[tokio::test]
    async fn test_create_writes_pass_fields() {
        let store = MemoryStore::new();
        let repo = BusinessRepository::new(&store);
        let id = repo
            .create(&NewBusiness {
                name: "Kess Coffee".into(),
                color: DEFAULT_BRAND_COLOR.into(),
                goal_stamps: 8,
                promo_message: Some("Free latte".into()),
                logo_url: None,
                pass_type_identifier: PassTypeIdentifier::parse("pass.com.kess").unwrap(),
                team_identifier: "TEAM1".into(),
            })
            .await
            .unwrap();

        let doc = store.get_document(COLLECTION, id.as_str()).await.unwrap().unwrap();
        assert_eq!(doc.str("logoText"), Some("Kess Coffee Loyalty"));
        assert_eq!(doc.str("logoPath"), Some("businessAssets/kess-coffee/logo.png"));
        assert_eq!(doc.fields.get("logoUrl"), Some(&FieldValue::Null));
        assert!(doc.timestamp("createdAt").is_some());

        let business = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(business.goal_stamps, 8);
        assert_eq!(business.promo_message.as_deref(), Some("Free latte"));
    }

    #[tokio::test]
    async fn test_missing_goal_defaults() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("name".into(), "Legacy".into());
        store.set_document(COLLECTION, "old", fields).await.unwrap();

        let business = BusinessRepository::new(&store)
            .get(&BusinessId::new("old"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(business.goal_stamps, DEFAULT_GOAL_STAMPS);
        assert_eq!(business.color, DEFAULT_BRAND_COLOR);
    }
}

//! `events/{id}` activity timeline (written by the pass service).

use stampcard_core::{ActivityEvent, BusinessId, EventId, EventKind};

use super::RepositoryError;
use crate::services::store::{Direction, Document, DocumentStore, Query};

const COLLECTION: &str = "events";

/// Timeline length cap.
pub const TIMELINE_LIMIT: u32 = 200;

fn from_document(doc: &Document) -> ActivityEvent {
    ActivityEvent {
        id: EventId::new(doc.id.clone()),
        business_id: BusinessId::new(doc.str("businessId").unwrap_or_default()),
        email: doc.str("email").unwrap_or_default().to_owned(),
        kind: EventKind::from_stored(doc.str("type").unwrap_or_default()),
        note: doc.string("note"),
        delta: doc.int("delta"),
        stamps_at: doc.int("stampsAt"),
        created_at: doc.timestamp("createdAt"),
    }
}

/// Repository for activity events.
pub struct EventRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> EventRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Latest events of one customer of one business, newest first.
    ///
    /// Events are keyed by the lowercased customer email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the query fails.
    pub async fn timeline(
        &self,
        business_id: &BusinessId,
        email: &str,
    ) -> Result<Vec<ActivityEvent>, RepositoryError> {
        let query = Query::collection(COLLECTION)
            .filter_eq("businessId", business_id.as_str())
            .filter_eq("email", email.to_lowercase())
            .order_by("createdAt", Direction::Descending)
            .limit(TIMELINE_LIMIT);
        Ok(self
            .store
            .query(&query)
            .await?
            .iter()
            .map(from_document)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::services::store::{FieldValue, Fields, MemoryStore};

    async fn add_event(store: &MemoryStore, email: &str, kind: &str, minutes_ago: i64) {
        let mut fields = Fields::new();
        fields.insert("businessId".into(), "b1".into());
        fields.insert("email".into(), email.into());
        fields.insert("type".into(), kind.into());
        fields.insert(
            "createdAt".into(),
            FieldValue::Timestamp(Utc::now() - Duration::minutes(minutes_ago)),
        );
        store.create_document(COLLECTION, fields).await.unwrap();
    }

    #[tokio::test]
    async fn test_timeline_newest_first_by_lowercase_email() {
        let store = MemoryStore::new();
        add_event(&store, "ann@example.com", "wallet_added", 30).await;
        add_event(&store, "ann@example.com", "stamp_issued", 10).await;
        add_event(&store, "bob@example.com", "stamp_issued", 5).await;

        let events = EventRepository::new(&store)
            .timeline(&BusinessId::new("b1"), "Ann@Example.com")
            .await
            .unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds, [EventKind::StampIssued, EventKind::WalletAdded]);
    }
}

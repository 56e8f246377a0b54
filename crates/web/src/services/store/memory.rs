//! In-process document store.
//!
//! Used by the `memory` backend and by tests. Every write broadcasts the
//! collection name so live queries refresh without polling.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{Direction, Document, DocumentStore, Fields, Query, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

type Collection = BTreeMap<String, Document>;

/// Document store backed by a map in memory.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    changes: broadcast::Sender<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn write(&self, collection: &str, id: String, fields: Fields) -> Result<(), StoreError> {
        {
            let mut collections = self
                .collections
                .write()
                .map_err(|_| StoreError::Parse("memory store lock poisoned".to_string()))?;
            let docs = collections.entry(collection.to_owned()).or_default();
            let previous = docs.get(&id).and_then(|d| d.update_time);
            let update_time = next_version(previous, Utc::now());
            docs.insert(
                id.clone(),
                Document {
                    id,
                    fields,
                    update_time: Some(update_time),
                },
            );
        }
        // No receivers is fine.
        let _ = self.changes.send(collection.to_owned());
        Ok(())
    }

    /// Number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Whether a collection has no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

/// Update times of one document strictly increase, as Firestore's do.
fn next_version(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(previous) if previous >= now => previous + TimeDelta::microseconds(1),
        _ => now,
    }
}

fn matches(doc: &Document, query: &Query) -> bool {
    query
        .filters
        .iter()
        .all(|(field, value)| doc.fields.get(field) == Some(value))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.write(collection, id.clone(), fields)?;
        Ok(id)
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.write(collection, id.to_owned(), fields)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Parse("memory store lock poisoned".to_string()))?;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = {
            let collections = self
                .collections
                .read()
                .map_err(|_| StoreError::Parse("memory store lock poisoned".to_string()))?;
            collections
                .get(&query.collection)
                .map(|c| c.values().filter(|d| matches(d, query)).cloned().collect())
                .unwrap_or_default()
        };

        if let Some((field, direction)) = &query.order_by {
            // Firestore excludes documents missing the order field.
            docs.retain(|d| d.fields.contains_key(field));
            docs.sort_by(|a, b| {
                let ord = match (a.fields.get(field), b.fields.get(field)) {
                    (Some(x), Some(y)) => x.total_cmp(y),
                    _ => std::cmp::Ordering::Equal,
                };
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit as usize);
        }
        Ok(docs)
    }

    fn changes(&self) -> Option<broadcast::Receiver<String>> {
        Some(self.changes.subscribe())
    }
}

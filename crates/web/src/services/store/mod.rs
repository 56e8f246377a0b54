//! Document store abstraction.
//!
//! The service only needs a handful of operations from its document database:
//! create a document with a store-assigned id, read one by id, run an
//! equality-filtered query, and learn when a collection changed. The
//! [`DocumentStore`] trait captures exactly that; [`FirestoreStore`] talks to
//! Firestore over REST and [`MemoryStore`] keeps everything in-process.
//!
//! Live queries are built on top of the trait in [`live`].

pub mod firestore;
pub mod live;
pub mod memory;
pub mod token;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// Errors returned by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with an error status.
    #[error("store error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The store rejected the credentials or rules denied access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A single typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Order used by in-memory `order_by`: nulls first, then by type, then by value.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        const fn rank(v: &FieldValue) -> u8 {
            match v {
                FieldValue::Null => 0,
                FieldValue::Bool(_) => 1,
                FieldValue::Integer(_) | FieldValue::Double(_) => 2,
                FieldValue::Timestamp(_) => 3,
                FieldValue::String(_) => 4,
            }
        }
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Integer(a), Self::Double(b)) => (*a as f64).total_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Double(a), Self::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Field map of a document.
pub type Fields = BTreeMap<String, FieldValue>;

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Last path segment of the document name.
    pub id: String,
    pub fields: Fields,
    /// Store-side time of the last write.
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    /// String field, if present and a string.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Non-empty string field, owned.
    #[must_use]
    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).filter(|s| !s.is_empty()).map(str::to_owned)
    }

    /// Integer field. Doubles with no fractional part are accepted.
    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(FieldValue::Integer(n)) => Some(*n),
            #[allow(clippy::cast_possible_truncation)]
            Some(FieldValue::Double(d)) if d.fract() == 0.0 => Some(*d as i64),
            _ => None,
        }
    }

    /// Non-negative integer field as `u32`, saturating.
    #[must_use]
    pub fn count(&self, key: &str) -> Option<u32> {
        self.int(key)
            .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
    }

    /// Timestamp field.
    #[must_use]
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.fields.get(key) {
            Some(FieldValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }
}

/// Sort direction of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// An equality-filtered, optionally ordered and limited collection query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    /// Field equality filters, all of which must match.
    pub filters: Vec<(String, FieldValue)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<u32>,
}

impl Query {
    /// Every document of a collection.
    #[must_use]
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Order results by a field.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Operations the service needs from its document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id and return the id.
    async fn create_document(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Create or replace the document at `collection/id`.
    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Read one document. Missing documents are `Ok(None)`.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Run a query.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Names of collections as they change, if the store can push them.
    ///
    /// Stores returning `None` are polled by live queries.
    fn changes(&self) -> Option<broadcast::Receiver<String>> {
        None
    }

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError> {
        self.query(&Query::collection("users").limit(1)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(fields: Fields) -> Document {
        Document {
            id: "d".to_owned(),
            fields,
            update_time: None,
        }
    }

    #[test]
    fn test_count_clamps_and_accepts_whole_doubles() {
        let mut fields = Fields::new();
        fields.insert("a".into(), FieldValue::Integer(-3));
        fields.insert("b".into(), FieldValue::Double(7.0));
        fields.insert("c".into(), FieldValue::Double(7.5));
        fields.insert("d".into(), FieldValue::String("7".into()));
        let d = doc(fields);
        assert_eq!(d.count("a"), Some(0));
        assert_eq!(d.count("b"), Some(7));
        assert_eq!(d.count("c"), None);
        assert_eq!(d.count("d"), None);
        assert_eq!(d.count("missing"), None);
    }

    #[test]
    fn test_string_skips_empty() {
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::String(String::new()));
        assert_eq!(doc(fields).string("name"), None);
    }

    #[test]
    fn test_total_cmp_mixed_numbers() {
        assert_eq!(
            FieldValue::Integer(2).total_cmp(&FieldValue::Double(1.5)),
            Ordering::Greater
        );
        assert_eq!(
            FieldValue::Null.total_cmp(&FieldValue::String("a".into())),
            Ordering::Less
        );
    }
}

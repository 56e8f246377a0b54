//! Firestore REST client.
//!
//! Talks to the Firestore v1 REST API. Field values travel as typed JSON
//! objects (`{"stringValue": "..."}`, `{"integerValue": "42"}`, ...); the
//! codec at the bottom of this file converts them to and from [`FieldValue`].
//!
//! # API Reference
//!
//! - Base URL: `https://firestore.googleapis.com/v1`
//! - Documents: `projects/{project}/databases/(default)/documents/{collection}/{id}`
//! - Queries: `POST .../documents:runQuery` with a `structuredQuery`
//! - Authentication: `?key=` API key, plus an optional OAuth bearer token
//!   from a [`TokenSource`]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::instrument;

use super::token::{MetadataTokens, TokenSource};
use super::{Direction, Document, DocumentStore, FieldValue, Fields, Query, StoreError};
use crate::config::FirebaseConfig;

const PRODUCTION_ROOT: &str = "https://firestore.googleapis.com/v1";

/// Firestore document store.
#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<FirestoreStoreInner>,
}

struct FirestoreStoreInner {
    client: reqwest::Client,
    /// `.../projects/{p}/databases/(default)/documents`
    documents_url: String,
    api_key: SecretString,
    tokens: TokenSource,
}

#[derive(Debug, Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(rename = "updateTime")]
    update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<RestDocument>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, StoreError> {
        let root = config
            .emulator_host
            .as_ref()
            .map_or_else(|| PRODUCTION_ROOT.to_owned(), |h| format!("http://{h}/v1"));
        let documents_url = format!(
            "{root}/projects/{}/databases/(default)/documents",
            config.project_id
        );
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        let tokens = match (&config.metadata_host, &config.access_token) {
            (Some(host), _) => TokenSource::Metadata(MetadataTokens::new(client.clone(), host)),
            (None, Some(token)) => {
                tracing::warn!("FIRESTORE_ACCESS_TOKEN is fixed and will not be refreshed");
                TokenSource::Static(token.clone())
            }
            (None, None) => TokenSource::None,
        };

        Ok(Self {
            inner: Arc::new(FirestoreStoreInner {
                client,
                documents_url,
                api_key: config.api_key.clone(),
                tokens,
            }),
        })
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        let builder = self
            .inner
            .client
            .request(method, url)
            .query(&[("key", self.inner.api_key.expose_secret())]);
        Ok(match self.inner.tokens.bearer().await? {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        })
    }

    /// Turn a non-success response into a [`StoreError`].
    async fn parse_error(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown error".to_string());
        if status == 401 || status == 403 {
            StoreError::PermissionDenied(message)
        } else {
            StoreError::Api { status, message }
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    #[instrument(skip(self, fields))]
    async fn create_document(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let url = format!("{}/{collection}", self.inner.documents_url);
        let response = self
            .request(reqwest::Method::POST, &url)
            .await?
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }
        let doc: RestDocument = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("Failed to parse document: {e}")))?;
        Ok(document_id(&doc.name).to_owned())
    }

    #[instrument(skip(self, fields))]
    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let url = format!("{}/{collection}/{id}", self.inner.documents_url);
        let response = self
            .request(reqwest::Method::PATCH, &url)
            .await?
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = format!("{}/{collection}/{id}", self.inner.documents_url);
        let response = self
            .request(reqwest::Method::GET, &url)
            .await?
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }
        let doc: RestDocument = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("Failed to parse document: {e}")))?;
        Ok(Some(decode_document(doc)))
    }

    #[instrument(skip(self), fields(collection = %query.collection))]
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}:runQuery", self.inner.documents_url);
        let response = self
            .request(reqwest::Method::POST, &url)
            .await?
            .json(&structured_query(query))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }
        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("Failed to parse query results: {e}")))?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.document)
            .map(decode_document)
            .collect())
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Last path segment of a document resource name.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn decode_document(doc: RestDocument) -> Document {
    let fields = doc
        .fields
        .iter()
        .filter_map(|(k, v)| decode_value(v).map(|fv| (k.clone(), fv)))
        .collect();
    Document {
        id: document_id(&doc.name).to_owned(),
        fields,
        update_time: doc.update_time,
    }
}

/// Encode one value as a Firestore typed value.
fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        // int64 travels as a decimal string
        FieldValue::Integer(n) => json!({ "integerValue": n.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(t) => json!({
            "timestampValue": t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
        }),
    }
}

fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode a Firestore typed value. Maps, arrays, references and geo points
/// are not used by this service and decode to `None`.
fn decode_value(value: &Value) -> Option<FieldValue> {
    let obj = value.as_object()?;
    let (kind, inner) = obj.iter().next()?;
    match kind.as_str() {
        "nullValue" => Some(FieldValue::Null),
        "booleanValue" => inner.as_bool().map(FieldValue::Bool),
        "integerValue" => match inner {
            Value::String(s) => s.parse().ok().map(FieldValue::Integer),
            other => other.as_i64().map(FieldValue::Integer),
        },
        "doubleValue" => inner.as_f64().map(FieldValue::Double),
        "stringValue" => inner.as_str().map(|s| FieldValue::String(s.to_owned())),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| FieldValue::Timestamp(t.with_timezone(&Utc))),
        _ => None,
    }
}

fn field_filter(field: &str, value: &FieldValue) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": "EQUAL",
            "value": encode_value(value),
        }
    })
}

/// Build the `runQuery` request body.
fn structured_query(query: &Query) -> Value {
    let mut sq = Map::new();
    sq.insert(
        "from".to_owned(),
        json!([{ "collectionId": query.collection }]),
    );

    match query.filters.as_slice() {
        [] => {}
        [(field, value)] => {
            sq.insert("where".to_owned(), field_filter(field, value));
        }
        many => {
            let filters: Vec<Value> = many.iter().map(|(f, v)| field_filter(f, v)).collect();
            sq.insert(
                "where".to_owned(),
                json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
            );
        }
    }

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        sq.insert(
            "orderBy".to_owned(),
            json!([{ "field": { "fieldPath": field }, "direction": direction }]),
        );
    }
    if let Some(limit) = query.limit {
        sq.insert("limit".to_owned(), json!(limit));
    }

    json!({ "structuredQuery": sq })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn firebase(access_token: Option<&str>, metadata_host: Option<&str>) -> FirebaseConfig {
        FirebaseConfig {
            project_id: "stampcard-test".to_string(),
            api_key: SecretString::from("AIzaTestKey"),
            access_token: access_token.map(SecretString::from),
            metadata_host: metadata_host.map(str::to_owned),
            emulator_host: Some("127.0.0.1:8080".to_string()),
            auth_emulator_host: None,
        }
    }

    #[test]
    fn test_metadata_tokens_take_precedence() {
        let store = FirestoreStore::new(&firebase(Some("ya29.fixed"), Some("127.0.0.1:9"))).unwrap();
        assert!(matches!(store.inner.tokens, TokenSource::Metadata(_)));

        let store = FirestoreStore::new(&firebase(Some("ya29.fixed"), None)).unwrap();
        assert!(matches!(store.inner.tokens, TokenSource::Static(_)));

        let store = FirestoreStore::new(&firebase(None, None)).unwrap();
        assert!(matches!(store.inner.tokens, TokenSource::None));
    }

    #[test]
    fn test_integer_travels_as_string() {
        assert_eq!(
            encode_value(&FieldValue::Integer(42)),
            json!({ "integerValue": "42" })
        );
        assert_eq!(
            decode_value(&json!({ "integerValue": "42" })),
            Some(FieldValue::Integer(42))
        );
    }

    #[test]
    fn test_decode_timestamp_with_nanos() {
        let v = decode_value(&json!({ "timestampValue": "2025-03-01T10:15:30.123456789Z" }));
        let Some(FieldValue::Timestamp(t)) = v else {
            panic!("expected timestamp, got {v:?}");
        };
        assert_eq!(t.timestamp(), 1_740_824_130);
    }

    #[test]
    fn test_decode_skips_unsupported() {
        assert_eq!(decode_value(&json!({ "mapValue": { "fields": {} } })), None);
        assert_eq!(decode_value(&json!("bare")), None);
    }

    #[test]
    fn test_decode_document() {
        let doc: RestDocument = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/customers/abc123",
            "fields": {
                "email": { "stringValue": "ann@example.com" },
                "stamps": { "integerValue": "4" },
                "tags": { "arrayValue": {} }
            },
            "createTime": "2025-03-01T10:00:00Z",
            "updateTime": "2025-03-01T10:15:30Z"
        }))
        .unwrap();
        let doc = decode_document(doc);
        assert_eq!(doc.id, "abc123");
        assert_eq!(doc.count("stamps"), Some(4));
        assert_eq!(doc.str("email"), Some("ann@example.com"));
        assert!(!doc.fields.contains_key("tags"));
        assert!(doc.update_time.is_some());
    }

    #[test]
    fn test_structured_query_composite() {
        let q = Query::collection("events")
            .filter_eq("businessId", "b1")
            .filter_eq("email", "ann@example.com")
            .order_by("createdAt", Direction::Descending)
            .limit(200);
        let body = structured_query(&q);
        let sq = &body["structuredQuery"];
        assert_eq!(sq["from"][0]["collectionId"], "events");
        assert_eq!(sq["where"]["compositeFilter"]["op"], "AND");
        assert_eq!(
            sq["where"]["compositeFilter"]["filters"][1]["fieldFilter"]["value"]["stringValue"],
            "ann@example.com"
        );
        assert_eq!(sq["orderBy"][0]["direction"], "DESCENDING");
        assert_eq!(sq["limit"], 200);
    }

    #[test]
    fn test_structured_query_single_filter() {
        let q = Query::collection("customers").filter_eq("businessId", "b1");
        let body = structured_query(&q);
        assert_eq!(
            body["structuredQuery"]["where"]["fieldFilter"]["field"]["fieldPath"],
            "businessId"
        );
        assert!(body["structuredQuery"].get("orderBy").is_none());
    }
}

//! Bearer tokens for Firestore REST calls.
//!
//! A fixed `FIRESTORE_ACCESS_TOKEN` is used as-is and stops working when it
//! expires (about an hour for Google OAuth tokens). On Cloud Run or GCE the
//! metadata server hands out tokens for the attached service account; those
//! are cached and fetched again shortly before they expire.

use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::StoreError;

/// Path of the default service account's token on the metadata server.
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Refetch when fewer than this many seconds remain.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Where bearer tokens come from.
pub enum TokenSource {
    /// No bearer token; security rules see an unauthenticated caller.
    None,
    /// A token supplied once at startup.
    Static(SecretString),
    /// Tokens from a metadata server, refreshed before expiry.
    Metadata(MetadataTokens),
}

impl TokenSource {
    /// Current bearer token, fetching a fresh one if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the metadata server cannot be reached or
    /// answers with something other than a token.
    pub async fn bearer(&self) -> Result<Option<SecretString>, StoreError> {
        match self {
            Self::None => Ok(None),
            Self::Static(token) => Ok(Some(token.clone())),
            Self::Metadata(tokens) => tokens.bearer().await.map(Some),
        }
    }
}

/// Token cache backed by a metadata server.
pub struct MetadataTokens {
    client: reqwest::Client,
    url: String,
    token: RwLock<Option<CachedToken>>,
}

struct CachedToken {
    access_token: SecretString,
    /// Unix timestamp when the token expires.
    expires_at: i64,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

impl CachedToken {
    fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at - REFRESH_MARGIN_SECS
    }
}

impl MetadataTokens {
    /// Token cache for the metadata server at `host` (`host[:port]`).
    #[must_use]
    pub fn new(client: reqwest::Client, host: &str) -> Self {
        Self {
            client,
            url: format!("http://{host}{METADATA_TOKEN_PATH}"),
            token: RwLock::new(None),
        }
    }

    async fn bearer(&self) -> Result<SecretString, StoreError> {
        let now = Utc::now().timestamp();
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref()
                && !token.is_expired(now)
            {
                return Ok(token.access_token.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref()
            && !token.is_expired(now)
        {
            return Ok(token.access_token.clone());
        }
        let fresh = self.fetch().await?;
        tracing::debug!(expires_at = fresh.expires_at, "Fetched Firestore access token");
        let access_token = fresh.access_token.clone();
        *slot = Some(fresh);
        Ok(access_token)
    }

    async fn fetch(&self) -> Result<CachedToken, StoreError> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::PermissionDenied(format!(
                "token request failed ({status}): {message}"
            )));
        }
        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("Failed to parse access token: {e}")))?;
        Ok(CachedToken {
            access_token: SecretString::from(body.access_token),
            expires_at: Utc::now().timestamp() + body.expires_in,
        })
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static(_) => f.write_str("Static([REDACTED])"),
            Self::Metadata(tokens) => f.debug_tuple("Metadata").field(&tokens.url).finish(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use secrecy::ExposeSecret;

    use super::*;

    /// Serve a metadata token endpoint whose tokens live `expires_in` seconds.
    async fn metadata_server(expires_in: i64) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            METADATA_TOKEN_PATH,
            get(move |headers: HeaderMap| {
                let counter = counter.clone();
                async move {
                    if headers.get("Metadata-Flavor").and_then(|v| v.to_str().ok()) != Some("Google") {
                        return StatusCode::FORBIDDEN.into_response();
                    }
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    axum::Json(serde_json::json!({
                        "access_token": format!("ya29.token-{n}"),
                        "expires_in": expires_in,
                        "token_type": "Bearer",
                    }))
                    .into_response()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (host, calls)
    }

    #[test]
    fn test_token_expires_inside_margin() {
        let token = CachedToken {
            access_token: SecretString::from("t"),
            expires_at: 1_000,
        };
        assert!(!token.is_expired(900));
        assert!(token.is_expired(940));
        assert!(token.is_expired(1_000));
        assert!(token.is_expired(2_000));
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached() {
        let (host, calls) = metadata_server(3599).await;
        let source = TokenSource::Metadata(MetadataTokens::new(reqwest::Client::new(), &host));

        let first = source.bearer().await.unwrap().unwrap();
        let second = source.bearer().await.unwrap().unwrap();

        assert_eq!(first.expose_secret(), "ya29.token-1");
        assert_eq!(second.expose_secret(), "ya29.token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiring_metadata_token_is_refetched() {
        let (host, calls) = metadata_server(30).await;
        let source = TokenSource::Metadata(MetadataTokens::new(reqwest::Client::new(), &host));

        let first = source.bearer().await.unwrap().unwrap();
        let second = source.bearer().await.unwrap().unwrap();

        assert_eq!(first.expose_secret(), "ya29.token-1");
        assert_eq!(second.expose_secret(), "ya29.token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_metadata_error_status_is_an_error() {
        let (host, _calls) = metadata_server(3599).await;
        let tokens = MetadataTokens {
            client: reqwest::Client::new(),
            url: format!("http://{host}/computeMetadata/v1/missing"),
            token: RwLock::new(None),
        };

        let err = TokenSource::Metadata(tokens).bearer().await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_static_and_absent_tokens() {
        let fixed = TokenSource::Static(SecretString::from("ya29.fixed"));
        assert_eq!(fixed.bearer().await.unwrap().unwrap().expose_secret(), "ya29.fixed");
        assert!(TokenSource::None.bearer().await.unwrap().is_none());
        assert!(!format!("{fixed:?}").contains("ya29.fixed"));
    }
}

//! Stampcard web library.
//!
//! Serves three audiences from one binary:
//! - admins, who create businesses and provision their logins
//! - businesses, who watch their customer roster and issue stamps
//! - the public, who enroll through a business's join link
//!
//! Pass generation and stamp bookkeeping live in the separate loyalty
//! service; this crate calls it over HTTP.
//!
//! [`app`] builds the full router so integration tests serve exactly what
//! the binary serves.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use middleware::{create_session_layer, request_id_middleware, security_headers_middleware};
use state::AppState;

/// Build the application router with every layer applied.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// rate limiting can fall back to the peer address.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service(
            "/static",
            ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the document store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::services::identity::MemoryIdentity;
    use crate::services::store::MemoryStore;

    fn test_app() -> Router {
        let state = AppState::from_parts(
            AppConfig::memory("http://localhost:3002", None),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryIdentity::new()),
            None,
        );
        app(state)
    }

    async fn get(uri: &str) -> axum::response::Response {
        test_app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(
            response
                .headers()
                .contains_key(header::CONTENT_SECURITY_POLICY)
        );
    }

    #[tokio::test]
    async fn test_gated_pages_redirect_to_their_login() {
        for (page, login) in [
            ("/admin/dashboard", "/admin"),
            ("/admin/pass-preview", "/admin"),
            ("/business/dashboard", "/business"),
            ("/business/customers/abc", "/business"),
        ] {
            let response = get(page).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{page}");
            assert_eq!(response.headers()[header::LOCATION], login, "{page}");
        }
    }

    #[tokio::test]
    async fn test_stream_without_session_is_unauthorized() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/business/customers/stream")
                    .header(header::ACCEPT, "text/event-stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_business_join_is_not_found() {
        assert_eq!(get("/join/nope").await.status(), StatusCode::NOT_FOUND);
    }
}

//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Liveness
//! GET  /health/ready                  - Store reachability
//!
//! # Auth
//! GET  /admin                         - Admin login page
//! POST /admin                         - Admin sign-in
//! GET  /business                      - Business login page
//! POST /business                      - Business sign-in
//! POST /logout                        - Sign out
//!
//! # Admin (requires admin role)
//! GET  /admin/dashboard               - Business list, search, create form
//! POST /admin/businesses              - Create business + provision login
//! GET  /admin/businesses/stream       - Live business rows (SSE)
//! GET  /admin/businesses/{id}/qr      - Join link QR
//! GET  /admin/pass-preview            - Pass download QR for a test email
//!
//! # Business (requires business role)
//! GET  /business/dashboard            - Customer roster, stats, search
//! GET  /business/customers/stream     - Live roster rows (SSE)
//! POST /business/customers/stamp      - Issue one stamp
//! GET  /business/customers/{id}       - Customer details and timeline
//! GET  /business/join-qr              - Join link QR
//!
//! # Public
//! GET  /join/{business_id}            - Enrollment form
//! POST /join/{business_id}            - Enroll and continue to the pass
//! ```

pub mod admin;
pub mod auth;
pub mod business;
pub mod join;

use askama::Template;
use askama_web::WebTemplate;
use axum::Router;
use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters;
use crate::middleware::auth_rate_limiter;
use crate::services::qr::QrCard;
use crate::state::AppState;

/// `?q=` search parameter shared by list pages and their streams.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Build the application router (without outer layers).
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router(&auth_rate_limiter()))
        .merge(admin::router())
        .merge(business::router())
        .merge(join::router())
}

/// Full-page QR code for a link.
#[derive(Template, WebTemplate)]
#[template(path = "qr.html")]
pub struct QrTemplate {
    pub heading: String,
    pub caption: String,
    pub card: Option<QrCard>,
    pub back_href: &'static str,
    pub logout_role: &'static str,
}

/// Server-sent event carrying `payload` as JSON.
///
/// Returns `None` (and logs) if the payload cannot be serialized.
pub fn json_event(name: &str, payload: &impl Serialize) -> Option<Event> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Event::default().event(name).data(json)),
        Err(e) => {
            tracing::error!(error = %e, event = name, "Failed to serialize stream event");
            None
        }
    }
}

/// Timestamp as shown on pages, or a dash when absent.
#[must_use]
pub fn display_time(t: Option<DateTime<Utc>>) -> String {
    t.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%b %-d, %Y %H:%M").to_string(),
    )
}

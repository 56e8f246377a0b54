//! Business area: live customer roster, stamp issuance, customer details.
//!
//! Every handler works on the shared [`CustomerDirectory`] of the signed-in
//! user's business, so all open tabs see the same optimistic counts.

use std::convert::Infallible;
use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::ACCEPT},
    response::{
        IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use stampcard_core::roster::{RosterRow, RosterStats};
use stampcard_core::{Customer, links};

use crate::db::EventRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireBusiness;
use crate::models::Flash;
use crate::routes::{QrTemplate, SearchQuery, display_time, json_event};
use crate::services::directory::{CustomerDirectory, StampOutcome};
use crate::services::qr;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/business/dashboard", get(dashboard))
        .route("/business/customers/stream", get(customer_stream))
        .route("/business/customers/stamp", post(issue_stamp))
        .route("/business/customers/{id}", get(customer_detail))
        .route("/business/join-qr", get(join_qr))
}

// =============================================================================
// Views
// =============================================================================

/// One roster row.
#[derive(Debug, Clone)]
pub struct CustomerRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub stamps: u32,
    pub issuing: bool,
    pub card_installed: bool,
    pub last_stamp: String,
}

impl From<&RosterRow> for CustomerRow {
    fn from(row: &RosterRow) -> Self {
        let c = &row.customer;
        Self {
            id: c.id.to_string(),
            name: c.display_name().to_owned(),
            email: c.email.clone().unwrap_or_default(),
            phone: c.phone.clone().unwrap_or_default(),
            stamps: c.stamps,
            issuing: row.issuing,
            card_installed: c.card_installed(),
            last_stamp: display_time(c.last_stamp_at),
        }
    }
}

/// Roster rows, rendered on their own for the live stream.
#[derive(Template)]
#[template(path = "business/_customer_rows.html")]
pub struct CustomerRowsTemplate<'a> {
    pub rows: &'a [CustomerRow],
    pub query: &'a str,
    pub stamping_enabled: bool,
}

/// Business dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "business/dashboard.html")]
pub struct DashboardTemplate {
    pub business_name: String,
    pub color: String,
    pub logo_url: Option<String>,
    pub goal_stamps: u32,
    pub stats: RosterStats,
    pub rows: Vec<CustomerRow>,
    pub query: String,
    pub join_url: String,
    pub list_error: Option<String>,
    pub stamping_enabled: bool,
    pub flash: Option<Flash>,
}

/// Payload of one `customers` stream event.
#[derive(Debug, Serialize)]
struct CustomerStreamUpdate {
    rows_html: String,
    active_customers: usize,
    total_stamps: u64,
    error: Option<String>,
}

fn customer_rows(
    directory: &CustomerDirectory,
    query: &str,
) -> (Vec<CustomerRow>, RosterStats, Option<String>) {
    let view = directory.view(query);
    (
        view.rows.iter().map(CustomerRow::from).collect(),
        view.stats,
        view.error,
    )
}

// =============================================================================
// Dashboard and stream
// =============================================================================

/// Customer roster with stats and search.
///
/// GET /business/dashboard?q=
#[instrument(skip(business, state, session), fields(business_id = %business.business_id))]
async fn dashboard(
    business: RequireBusiness,
    State(state): State<AppState>,
    session: Session,
    Query(search): Query<SearchQuery>,
) -> Result<DashboardTemplate, AppError> {
    let directory = state.directories().customers(&business.business_id).await?;
    let (rows, stats, list_error) = customer_rows(&directory, &search.q);
    let info = directory.business();

    Ok(DashboardTemplate {
        business_name: info.name.clone(),
        color: info.color.clone(),
        logo_url: info.logo_url.clone(),
        goal_stamps: info.goal_stamps,
        stats,
        rows,
        query: search.q,
        join_url: links::join_url(&state.config().base_url, &info.id),
        list_error,
        stamping_enabled: state.backend().is_some(),
        flash: Flash::take(&session).await,
    })
}

/// Live roster rows and stats. Sends the current view at once, then one
/// event per roster change.
///
/// GET /business/customers/stream?q=
async fn customer_stream(
    business: RequireBusiness,
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let directory = state.directories().customers(&business.business_id).await?;
    let stamping_enabled = state.backend().is_some();
    let mut changes = directory.watch();

    let stream = async_stream::stream! {
        loop {
            let (rows, stats, error) = customer_rows(&directory, &search.q);
            let rendered = CustomerRowsTemplate {
                rows: &rows,
                query: &search.q,
                stamping_enabled,
            }
            .render();
            match rendered {
                Ok(rows_html) => {
                    let update = CustomerStreamUpdate {
                        rows_html,
                        active_customers: stats.active_customers,
                        total_stamps: stats.total_stamps,
                        error,
                    };
                    if let Some(event) = json_event("customers", &update) {
                        yield Ok(event);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to render customer rows"),
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// =============================================================================
// Stamps
// =============================================================================

/// Stamp form data.
#[derive(Debug, Deserialize)]
pub struct StampForm {
    #[serde(default)]
    pub email: String,
}

/// JSON answer for script-driven stamp requests.
#[derive(Debug, Serialize)]
pub struct StampResponse {
    pub ok: bool,
    pub message: String,
}

fn stamp_response(outcome: Option<&StampOutcome>, email: &str) -> (StatusCode, StampResponse) {
    let (status, ok, message) = match outcome {
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            false,
            "The loyalty service URL is not configured.".to_owned(),
        ),
        Some(StampOutcome::Issued) => (StatusCode::OK, true, format!("Stamp issued to {email}")),
        Some(StampOutcome::Failed(_)) => (
            StatusCode::BAD_GATEWAY,
            false,
            "Failed to issue stamp".to_owned(),
        ),
        Some(StampOutcome::UnknownCustomer) => (
            StatusCode::NOT_FOUND,
            false,
            format!("No customer with email {email}"),
        ),
        Some(StampOutcome::Discarded) => (
            StatusCode::CONFLICT,
            false,
            "The customer list was closed before the stamp finished. Refresh to check the count."
                .to_owned(),
        ),
    };
    (status, StampResponse { ok, message })
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

/// Issue one stamp.
///
/// Answers JSON when asked for it (the dashboard script), otherwise sets a
/// notice and redirects back to the dashboard.
///
/// POST /business/customers/stamp
#[instrument(skip_all, fields(business_id = %business.business_id))]
async fn issue_stamp(
    business: RequireBusiness,
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<StampForm>,
) -> Result<Response, AppError> {
    let email = form.email.trim();
    if email.is_empty() {
        return Err(AppError::BadRequest("Customer email is required".to_owned()));
    }

    let outcome = match state.backend() {
        Some(backend) => {
            let directory: Arc<CustomerDirectory> =
                state.directories().customers(&business.business_id).await?;
            Some(CustomerDirectory::issue_stamp(directory, backend, email).await)
        }
        None => {
            tracing::warn!("Stamp requested without a loyalty service");
            None
        }
    };

    let (status, body) = stamp_response(outcome.as_ref(), email);
    if wants_json(&headers) {
        return Ok((status, Json(body)).into_response());
    }

    let flash = if body.ok {
        Flash::success(body.message)
    } else {
        Flash::error(body.message)
    };
    flash.push(&session).await;
    Ok(Redirect::to("/business/dashboard").into_response())
}

// =============================================================================
// Customer details
// =============================================================================

/// One timeline entry.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub label: String,
    pub tone: &'static str,
    pub title: String,
    pub note: Option<String>,
    pub when: String,
}

/// Customer details template.
#[derive(Template, WebTemplate)]
#[template(path = "business/customer.html")]
pub struct CustomerTemplate {
    pub business_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birthday: String,
    pub device_id: String,
    pub card_installed: bool,
    pub signed_up: String,
    pub stamps: u32,
    pub goal_stamps: u32,
    pub rewards_earned: u32,
    pub rewards_redeemed: u32,
    pub last_stamp: String,
    pub last_reward_earned: String,
    pub last_reward_redeemed: String,
    pub timeline: Vec<TimelineEntry>,
    pub timeline_error: bool,
}

impl CustomerTemplate {
    fn new(business_name: &str, goal_stamps: u32, customer: &Customer) -> Self {
        Self {
            business_name: business_name.to_owned(),
            name: customer.display_name().to_owned(),
            email: customer.email.clone().unwrap_or_default(),
            phone: customer.phone.clone().unwrap_or_default(),
            birthday: customer.birthday.clone().unwrap_or_default(),
            device_id: customer
                .device_library_identifier
                .clone()
                .unwrap_or_default(),
            card_installed: customer.card_installed(),
            signed_up: display_time(customer.created_at),
            stamps: customer.stamps,
            goal_stamps,
            rewards_earned: customer.rewards_earned_or_derived(goal_stamps),
            rewards_redeemed: customer.rewards_redeemed.unwrap_or(0),
            last_stamp: display_time(customer.last_stamp_at),
            last_reward_earned: display_time(customer.last_reward_earned_at),
            last_reward_redeemed: display_time(customer.last_reward_redeemed_at),
            timeline: Vec::new(),
            timeline_error: false,
        }
    }
}

/// Customer overview and activity timeline.
///
/// Only customers of the signed-in business are found here.
///
/// GET /business/customers/{id}
#[instrument(skip(business, state), fields(business_id = %business.business_id))]
async fn customer_detail(
    business: RequireBusiness,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<CustomerTemplate, AppError> {
    let directory = state.directories().customers(&business.business_id).await?;
    let customer = directory.customer(&id).ok_or_else(|| AppError::NotFound(id.clone()))?;
    let info = directory.business();
    let mut page = CustomerTemplate::new(&info.name, info.goal_stamps, &customer);

    match EventRepository::new(state.store().as_ref())
        .timeline(&info.id, &customer.email_key())
        .await
    {
        Ok(events) => {
            page.timeline = events
                .iter()
                .map(|e| TimelineEntry {
                    label: e.kind.label().to_owned(),
                    tone: e.kind.tone(),
                    title: e.title(),
                    note: e.note.clone(),
                    when: display_time(e.created_at),
                })
                .collect();
        }
        Err(e) => {
            tracing::warn!(customer_id = %id, error = %e, "Failed to load activity timeline");
            page.timeline_error = true;
        }
    }

    Ok(page)
}

/// QR code for the signed-in business's join link.
///
/// GET /business/join-qr
#[instrument(skip(business, state), fields(business_id = %business.business_id))]
async fn join_qr(
    business: RequireBusiness,
    State(state): State<AppState>,
) -> Result<QrTemplate, AppError> {
    let directory = state.directories().customers(&business.business_id).await?;
    let info = directory.business();
    let url = links::join_url(&state.config().base_url, &info.id);
    Ok(QrTemplate {
        heading: format!("Join {}", info.name),
        caption: "Show this at the counter so customers can sign up.".to_owned(),
        card: qr::render(&url)?,
        back_href: "/business/dashboard",
        logout_role: "business",
    })
}

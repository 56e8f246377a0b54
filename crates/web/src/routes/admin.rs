//! Admin area: business list, business creation, join and pass QR codes.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use stampcard_core::links;
use stampcard_core::validation::BusinessForm;
use stampcard_core::{Business, BusinessId};

use crate::db::BusinessRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::Flash;
use crate::routes::{QrTemplate, SearchQuery, display_time, json_event};
use crate::services::directory::BusinessDirectory;
use crate::services::onboarding::{self, Onboarded, OnboardingError};
use crate::services::qr;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/businesses", post(create_business))
        .route("/admin/businesses/stream", get(business_stream))
        .route("/admin/businesses/{id}/qr", get(join_qr))
        .route("/admin/pass-preview", get(pass_preview))
}

// =============================================================================
// Views
// =============================================================================

/// One business as listed on the dashboard.
#[derive(Debug, Clone)]
pub struct BusinessRow {
    pub id: String,
    pub name: String,
    pub color: String,
    pub goal_stamps: u32,
    pub promo_message: String,
    pub pass_type_identifier: String,
    pub join_url: String,
    pub created: String,
}

impl BusinessRow {
    fn new(business: &Business, base_url: &str) -> Self {
        Self {
            id: business.id.to_string(),
            name: business.name.clone(),
            color: business.color.clone(),
            goal_stamps: business.goal_stamps,
            promo_message: business.promo_message.clone().unwrap_or_default(),
            pass_type_identifier: business.pass_type_identifier.clone(),
            join_url: links::join_url(base_url, &business.id),
            created: display_time(business.created_at),
        }
    }
}

/// Business rows, rendered on their own for the live stream.
#[derive(Template)]
#[template(path = "admin/_business_rows.html")]
pub struct BusinessRowsTemplate<'a> {
    pub rows: &'a [BusinessRow],
    pub query: &'a str,
}

/// Admin dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub admin_email: String,
    pub flash: Option<Flash>,
    pub query: String,
    pub rows: Vec<BusinessRow>,
    pub list_error: Option<String>,
    pub form: BusinessForm,
    pub form_error: Option<String>,
    pub backend_configured: bool,
    pub default_password_set: bool,
}

/// Payload of one `businesses` stream event.
#[derive(Debug, Serialize)]
struct BusinessStreamUpdate {
    rows_html: String,
    count: usize,
    error: Option<String>,
}

fn business_rows(directory: &BusinessDirectory, query: &str, base_url: &str) -> Vec<BusinessRow> {
    directory
        .search(query)
        .iter()
        .map(|b| BusinessRow::new(b, base_url))
        .collect()
}

async fn render_dashboard(
    state: &AppState,
    admin_email: String,
    flash: Option<Flash>,
    query: String,
    form: BusinessForm,
    form_error: Option<String>,
) -> Result<DashboardTemplate, AppError> {
    let directory = state.directories().businesses().await?;
    let config = state.config();
    Ok(DashboardTemplate {
        admin_email,
        flash,
        rows: business_rows(&directory, &query, &config.base_url),
        list_error: directory.error(),
        query,
        form,
        form_error,
        backend_configured: state.backend().is_some(),
        default_password_set: config.business_default_password.is_some(),
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Business list with search and the create form.
///
/// GET /admin/dashboard?q=
#[instrument(skip(admin, state, session))]
async fn dashboard(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(search): Query<SearchQuery>,
) -> Result<DashboardTemplate, AppError> {
    render_dashboard(
        &state,
        admin.identity.email,
        Flash::take(&session).await,
        search.q,
        BusinessForm::default(),
        None,
    )
    .await
}

fn created_notice(name: &str, onboarded: &Onboarded) -> Flash {
    match &onboarded.login {
        Ok(()) => {
            let mut message = format!(
                "Created {name}. Business login: {}.",
                onboarded.login_email
            );
            if let Some(password) = &onboarded.generated_password {
                message.push_str(" Temporary password: ");
                message.push_str(password.expose_secret());
            }
            Flash::success(message)
        }
        Err(_) => Flash::error(format!(
            "Created {name}, but the login for {} could not be created. Create it manually.",
            onboarded.login_email
        )),
    }
}

/// Validate, create the business, then provision its login.
///
/// POST /admin/businesses
#[instrument(skip_all)]
async fn create_business(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<BusinessForm>,
) -> Result<Response, AppError> {
    let result = onboarding::create_business(
        state.store().as_ref(),
        state.backend(),
        &form,
        state.config().business_default_password.as_ref(),
    )
    .await;

    match result {
        Ok(onboarded) => {
            created_notice(form.name.trim(), &onboarded)
                .push(&session)
                .await;
            Ok(Redirect::to("/admin/dashboard").into_response())
        }
        Err(OnboardingError::Invalid(e)) => {
            tracing::debug!(error = %e, "Business form rejected");
            let mut form = form;
            form.password.clear();
            let page = render_dashboard(
                &state,
                admin.identity.email,
                None,
                String::new(),
                form,
                Some(e.to_string()),
            )
            .await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(OnboardingError::Repository(e)) => Err(e.into()),
    }
}

/// Live business rows for the dashboard.
///
/// GET /admin/businesses/stream?q=
async fn business_stream(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let directory = state.directories().businesses().await?;
    let base_url = state.config().base_url.clone();
    let mut changes = directory.watch();

    let stream = async_stream::stream! {
        loop {
            let rows = business_rows(&directory, &search.q, &base_url);
            let rendered = BusinessRowsTemplate { rows: &rows, query: &search.q }.render();
            match rendered {
                Ok(rows_html) => {
                    let update = BusinessStreamUpdate {
                        rows_html,
                        count: rows.len(),
                        error: directory.error(),
                    };
                    if let Some(event) = json_event("businesses", &update) {
                        yield Ok(event);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to render business rows"),
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// QR code for a business's join link.
///
/// GET /admin/businesses/{id}/qr
#[instrument(skip(_admin, state))]
async fn join_qr(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<QrTemplate, AppError> {
    let business_id = BusinessId::new(id);
    let business = BusinessRepository::new(state.store().as_ref())
        .get(&business_id)
        .await?
        .ok_or_else(|| AppError::NotFound(business_id.to_string()))?;

    let url = links::join_url(&state.config().base_url, &business.id);
    Ok(QrTemplate {
        heading: format!("Join {}", business.name),
        caption: "Customers scan this to sign up for the loyalty card.".to_owned(),
        card: qr::render(&url)?,
        back_href: "/admin/dashboard",
        logout_role: "admin",
    })
}

/// Query for the pass preview page.
#[derive(Debug, Default, Deserialize)]
pub struct PassPreviewQuery {
    #[serde(default)]
    pub business_id: String,
    #[serde(default)]
    pub email: String,
}

/// Business choice on the pass preview page.
#[derive(Debug, Clone)]
pub struct BusinessOption {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

/// Pass preview template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/pass_preview.html")]
pub struct PassPreviewTemplate {
    pub businesses: Vec<BusinessOption>,
    pub email: String,
    pub card: Option<qr::QrCard>,
    pub notice: Option<&'static str>,
}

/// Wallet pass download QR for a chosen business and test email.
///
/// GET /admin/pass-preview?business_id=&email=
#[instrument(skip(_admin, state))]
async fn pass_preview(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<PassPreviewQuery>,
) -> Result<PassPreviewTemplate, AppError> {
    let directory = state.directories().businesses().await?;
    let selected = BusinessId::new(query.business_id.trim());
    let email = query.email.trim().to_owned();

    let chosen = (!selected.as_str().is_empty())
        .then(|| directory.get(&selected))
        .flatten();
    let (card, notice) = match (chosen, email.is_empty(), state.backend()) {
        (None, _, _) | (_, true, _) => (None, None),
        (Some(_), false, None) => (None, Some("The loyalty service URL is not configured.")),
        (Some(business), false, Some(backend)) => {
            let url = links::pass_url(backend.base_url(), &business.id, &email);
            (qr::render(&url)?, None)
        }
    };

    let businesses = directory
        .search("")
        .into_iter()
        .map(|b| BusinessOption {
            selected: b.id == selected,
            id: b.id.to_string(),
            name: b.name,
        })
        .collect();

    Ok(PassPreviewTemplate {
        businesses,
        email,
        card,
        notice,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::services::backend::BackendError;

    fn business() -> Business {
        Business {
            id: BusinessId::new("kess"),
            name: "Kess Coffee".to_owned(),
            color: "#aa3300".to_owned(),
            goal_stamps: 8,
            promo_message: None,
            logo_url: None,
            pass_type_identifier: "pass.com.kess".to_owned(),
            team_identifier: "TEAM".to_owned(),
            logo_text: None,
            created_at: None,
        }
    }

    #[test]
    fn test_row_links_to_join_page() {
        let row = BusinessRow::new(&business(), "https://cards.example/");
        assert_eq!(row.join_url, "https://cards.example/join/kess");
        assert_eq!(row.promo_message, "");
    }

    #[test]
    fn test_generated_password_shown_once() {
        let onboarded = Onboarded {
            business_id: BusinessId::new("kess"),
            login_email: "owner@kess.example".to_owned(),
            login: Ok(()),
            generated_password: Some(SecretString::from("Abc123Def456".to_owned())),
        };
        let flash = created_notice("Kess Coffee", &onboarded);
        assert!(flash.message.contains("Abc123Def456"));
        assert!(flash.message.contains("owner@kess.example"));
    }

    #[test]
    fn test_login_failure_is_reported() {
        let onboarded = Onboarded {
            business_id: BusinessId::new("kess"),
            login_email: "owner@kess.example".to_owned(),
            login: Err(BackendError::Api {
                status: 409,
                message: "exists".to_owned(),
            }),
            generated_password: None,
        };
        let flash = created_notice("Kess Coffee", &onboarded);
        assert_eq!(flash.kind, crate::models::FlashKind::Error);
        assert!(flash.message.starts_with("Created Kess Coffee, but"));
    }
}

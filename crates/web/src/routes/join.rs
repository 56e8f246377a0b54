//! Public enrollment form.
//!
//! Anyone with a business's join link can sign up. A new customer starts at
//! zero stamps and is sent on to download their wallet pass.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tracing::instrument;

use stampcard_core::{Business, BusinessId, links};

use crate::db::BusinessRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::enrollment_rate_limiter;
use crate::services::enrollment::{self, Enrolled, EnrollmentError, EnrollmentForm};
use crate::state::AppState;

const SAVE_FAILED: &str = "We couldn't save your details. Please try again.";

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/join/{business_id}",
        get(form_page).merge(post(submit).layer(enrollment_rate_limiter())),
    )
}

/// Enrollment form template.
#[derive(Template, WebTemplate)]
#[template(path = "join/form.html")]
pub struct JoinTemplate {
    pub business_id: String,
    pub business_name: String,
    pub color: String,
    pub logo_url: Option<String>,
    pub promo_message: Option<String>,
    pub submission_id: String,
    pub form: EnrollmentForm,
    pub error: Option<String>,
}

impl JoinTemplate {
    fn new(business: &Business, submission_id: String) -> Self {
        Self {
            business_id: business.id.to_string(),
            business_name: business.name.clone(),
            color: business.color.clone(),
            logo_url: business.logo_url.clone(),
            promo_message: business.promo_message.clone(),
            submission_id,
            form: EnrollmentForm::default(),
            error: None,
        }
    }
}

/// Shown after enrolling when there is no pass service to send the
/// customer to.
#[derive(Template, WebTemplate)]
#[template(path = "join/done.html")]
pub struct DoneTemplate {
    pub business_name: String,
    pub color: String,
}

async fn load_business(state: &AppState, id: String) -> Result<Business, AppError> {
    BusinessRepository::new(state.store().as_ref())
        .get(&BusinessId::new(id.clone()))
        .await?
        .ok_or(AppError::NotFound(id))
}

/// GET /join/{business_id}
#[instrument(skip(state))]
async fn form_page(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
) -> Result<JoinTemplate, AppError> {
    let business = load_business(&state, business_id).await?;
    Ok(JoinTemplate::new(&business, state.submissions().issue()))
}

/// POST /join/{business_id}
#[instrument(skip_all, fields(business_id = %business_id))]
async fn submit(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
    Form(form): Form<EnrollmentForm>,
) -> Result<Response, AppError> {
    let business = load_business(&state, business_id).await?;

    let result = enrollment::enroll(
        state.store().as_ref(),
        state.submissions(),
        &business.id,
        &form,
    )
    .await;

    let (status, error) = match result {
        Ok(Enrolled::Created { email, .. } | Enrolled::Duplicate { email }) => {
            return Ok(match state.backend() {
                Some(backend) => {
                    Redirect::to(&links::pass_url(backend.base_url(), &business.id, &email))
                        .into_response()
                }
                None => DoneTemplate {
                    business_name: business.name,
                    color: business.color,
                }
                .into_response(),
            });
        }
        Err(EnrollmentError::MissingField(field)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("{field} is required."),
        ),
        Err(EnrollmentError::Repository(e)) => {
            tracing::error!(error = %e, "Failed to save enrollment");
            (StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED.to_owned())
        }
    };

    // The old id stays valid after a failed write; a missing field never
    // claimed it.
    let submission_id = if form.submission_id.is_empty() {
        state.submissions().issue()
    } else {
        form.submission_id.clone()
    };
    let page = JoinTemplate {
        form,
        error: Some(error),
        ..JoinTemplate::new(&business, submission_id)
    };
    Ok((status, page).into_response())
}

//! Authentication route handlers.
//!
//! Each area has its own login page. Signing in stores the identity in the
//! session, then the role for that area is checked; a mismatch signs the
//! user straight back out.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;

use stampcard_core::Role;

use crate::error::clear_sentry_user;
use crate::filters;
use crate::middleware::rate_limit::RateLimiterLayer;
use crate::middleware::{
    OptionalIdentity, clear_current_identity, evaluate_gate, set_current_identity,
};
use crate::models::{CurrentIdentity, Flash};
use crate::services::identity::IdentityError;
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Logout form data.
#[derive(Debug, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub role: Option<Role>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub title: &'static str,
    pub action: &'static str,
    pub email: String,
    pub error: Option<String>,
    pub flash: Option<Flash>,
}

impl LoginTemplate {
    fn new(role: Role) -> Self {
        Self {
            title: match role {
                Role::Admin => "Admin sign in",
                Role::Business => "Business sign in",
            },
            action: role.login_path(),
            email: String::new(),
            error: None,
            flash: None,
        }
    }

    fn with_error(role: Role, email: &str, error: impl Into<String>) -> Self {
        Self {
            email: email.to_owned(),
            error: Some(error.into()),
            ..Self::new(role)
        }
    }
}

/// Build the auth router. Sign-in posts share one rate limiter.
pub fn router(limiter: &RateLimiterLayer) -> Router<AppState> {
    Router::new()
        .route(
            "/admin",
            get(admin_login_page).merge(post(admin_login).layer(limiter.clone())),
        )
        .route(
            "/business",
            get(business_login_page).merge(post(business_login).layer(limiter.clone())),
        )
        .route("/logout", post(logout))
}

async fn admin_login_page(
    State(state): State<AppState>,
    session: Session,
    identity: OptionalIdentity,
) -> Response {
    login_page(&state, &session, identity, Role::Admin).await
}

async fn business_login_page(
    State(state): State<AppState>,
    session: Session,
    identity: OptionalIdentity,
) -> Response {
    login_page(&state, &session, identity, Role::Business).await
}

async fn admin_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    login(&state, &session, form, Role::Admin).await
}

async fn business_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    login(&state, &session, form, Role::Business).await
}

/// Render a login page, or skip to the dashboard if the session already
/// holds an identity with this role.
async fn login_page(
    state: &AppState,
    session: &Session,
    OptionalIdentity(identity): OptionalIdentity,
    role: Role,
) -> Response {
    if let Some(identity) = identity {
        let lookup = state.roles().lookup(state.store(), &identity.uid).await;
        if evaluate_gate(role, lookup).is_ok() {
            return Redirect::to(role.dashboard_path()).into_response();
        }
    }
    LoginTemplate {
        flash: Flash::take(session).await,
        ..LoginTemplate::new(role)
    }
    .into_response()
}

fn sign_in_error_message(error: &IdentityError) -> &'static str {
    match error {
        IdentityError::InvalidCredentials => "Invalid email or password.",
        IdentityError::TooManyAttempts => "Too many attempts. Please wait and try again.",
        IdentityError::Disabled => "This account has been disabled.",
        IdentityError::Http(_) | IdentityError::Api { .. } | IdentityError::Parse(_) => {
            "Sign-in is unavailable right now. Please try again."
        }
    }
}

/// Handle a login form submission for `role`.
async fn login(state: &AppState, session: &Session, form: LoginForm, role: Role) -> Response {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return LoginTemplate::with_error(role, email, "Email and password are required.")
            .into_response();
    }

    let password = SecretString::from(form.password);
    let identity = match state.identity().sign_in(email, &password).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(role = %role, error = %e, "Sign-in failed");
            return LoginTemplate::with_error(role, email, sign_in_error_message(&e))
                .into_response();
        }
    };

    // New session id on privilege change
    if let Err(e) = session.cycle_id().await {
        tracing::error!(error = %e, "Failed to cycle session id");
        return LoginTemplate::with_error(role, email, "Could not start a session. Please try again.")
            .into_response();
    }

    let current = CurrentIdentity {
        uid: identity.uid,
        email: identity.email,
    };
    if let Err(e) = set_current_identity(session, &current).await {
        tracing::error!(error = %e, "Failed to store identity in session");
        return LoginTemplate::with_error(role, email, "Could not start a session. Please try again.")
            .into_response();
    }

    // Role changes take effect at the next sign-in
    state.roles().invalidate(&current.uid).await;
    let lookup = state.roles().lookup(state.store(), &current.uid).await;
    match evaluate_gate(role, lookup) {
        Ok(_) => {
            tracing::info!(uid = %current.uid, role = %role, "Signed in");
            Redirect::to(role.dashboard_path()).into_response()
        }
        Err(denial) => {
            tracing::info!(uid = %current.uid, role = %role, denial = ?denial, "Signed in without access");
            if let Err(e) = clear_current_identity(session).await {
                tracing::warn!(error = %e, "Failed to clear session after denied sign-in");
            }
            LoginTemplate::with_error(
                role,
                email,
                denial
                    .notice()
                    .unwrap_or("This account does not have access to that page."),
            )
            .into_response()
        }
    }
}

/// Sign out and return to the login page of the area the user was in.
///
/// POST /logout
async fn logout(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LogoutForm>,
) -> impl IntoResponse {
    match clear_current_identity(&session).await {
        Ok(Some(identity)) => {
            state.roles().invalidate(&identity.uid).await;
            tracing::info!(uid = %identity.uid, "Signed out");
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to clear session on logout"),
    }
    clear_sentry_user();

    Redirect::to(form.role.unwrap_or(Role::Business).login_path())
}

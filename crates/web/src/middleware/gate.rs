//! Role gate for the admin and business areas.
//!
//! The decision itself is the pure [`evaluate_gate`]; the extractors gather
//! its inputs from the session and the role cache and turn a denial into a
//! redirect to the role's login page (or `401` for event streams, which
//! cannot follow redirects).

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::ACCEPT, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use stampcard_core::{BusinessId, Role, UserRecord};

use crate::error::set_sentry_user;
use crate::models::{CurrentIdentity, Flash, session_keys};
use crate::services::roles::RoleLookup;
use crate::state::AppState;

/// Why access was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    NotSignedIn,
    LookupFailed,
    MissingRecord,
    WrongRole { found: Role },
    MissingBusinessId,
}

impl Denial {
    /// Notice shown on the login page, if the user should see one.
    #[must_use]
    pub const fn notice(&self) -> Option<&'static str> {
        match self {
            Self::NotSignedIn => None,
            Self::LookupFailed => Some("We could not verify your access. Please sign in again."),
            Self::MissingRecord | Self::WrongRole { .. } | Self::MissingBusinessId => {
                Some("This account does not have access to that page.")
            }
        }
    }
}

/// Decide whether a lookup result grants `required`.
///
/// Allows only an exact role match; a business record must also carry a
/// business id. Every other outcome denies.
///
/// # Errors
///
/// Returns the [`Denial`] reason.
pub fn evaluate_gate(required: Role, lookup: RoleLookup) -> Result<UserRecord, Denial> {
    let record = match lookup {
        RoleLookup::NotSignedIn => return Err(Denial::NotSignedIn),
        RoleLookup::Failed => return Err(Denial::LookupFailed),
        RoleLookup::Missing => return Err(Denial::MissingRecord),
        RoleLookup::Found(record) => record,
    };
    if record.role != required {
        return Err(Denial::WrongRole { found: record.role });
    }
    if required == Role::Business && record.business_id.is_none() {
        return Err(Denial::MissingBusinessId);
    }
    Ok(record)
}

/// Rejection from a gate extractor.
#[derive(Debug)]
pub enum GateRejection {
    /// Redirect to a login page (HTML requests).
    RedirectToLogin(&'static str),
    /// Unauthorized response (event streams).
    Unauthorized,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(path) => Redirect::to(path).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// A request that passed the gate.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity: CurrentIdentity,
    pub record: UserRecord,
}

fn wants_event_stream(parts: &Parts) -> bool {
    parts
        .headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

async fn authorize(
    parts: &Parts,
    state: &AppState,
    required: Role,
) -> Result<SignedIn, GateRejection> {
    let session = parts.extensions.get::<Session>().cloned();
    let identity = match &session {
        Some(session) => session
            .get::<CurrentIdentity>(session_keys::CURRENT_IDENTITY)
            .await
            .ok()
            .flatten(),
        None => None,
    };

    let lookup = match &identity {
        Some(identity) => state.roles().lookup(state.store(), &identity.uid).await,
        None => RoleLookup::NotSignedIn,
    };

    let denial = match (evaluate_gate(required, lookup), identity) {
        (Ok(record), Some(identity)) => {
            set_sentry_user(&identity.uid, Some(&identity.email));
            return Ok(SignedIn { identity, record });
        }
        (Ok(_), None) => Denial::NotSignedIn,
        (Err(denial), _) => denial,
    };

    tracing::info!(path = %parts.uri.path(), role = %required, denial = ?denial, "Access denied");
    if let (Some(session), Some(notice)) = (&session, denial.notice()) {
        Flash::error(notice).push(session).await;
    }

    if wants_event_stream(parts) {
        Err(GateRejection::Unauthorized)
    } else {
        Err(GateRejection::RedirectToLogin(required.login_path()))
    }
}

/// Extractor that requires an admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", admin.identity.email)
/// }
/// ```
pub struct RequireAdmin(pub SignedIn);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = GateRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, Role::Admin).await.map(Self)
    }
}

/// Extractor that requires a business user, yielding its business id.
pub struct RequireBusiness {
    pub signed_in: SignedIn,
    pub business_id: BusinessId,
}

impl FromRequestParts<AppState> for RequireBusiness {
    type Rejection = GateRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let signed_in = authorize(parts, state, Role::Business).await?;
        let business_id = signed_in
            .record
            .business_id
            .clone()
            .ok_or(GateRejection::RedirectToLogin(Role::Business.login_path()))?;
        Ok(Self {
            signed_in,
            business_id,
        })
    }
}

/// Extractor that optionally gets the signed-in identity, without a role
/// check.
pub struct OptionalIdentity(pub Option<CurrentIdentity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentIdentity>(session_keys::CURRENT_IDENTITY)
                .await
                .ok()
                .flatten(),
            None => None,
        };
        Ok(Self(identity))
    }
}

/// Store the signed-in identity in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_identity(
    session: &Session,
    identity: &CurrentIdentity,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_IDENTITY, identity)
        .await
}

/// Remove the signed-in identity from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_identity(
    session: &Session,
) -> Result<Option<CurrentIdentity>, tower_sessions::session::Error> {
    session
        .remove::<CurrentIdentity>(session_keys::CURRENT_IDENTITY)
        .await
}

//! Session-related types.
//!
//! Types stored in the session for authentication state and one-shot
//! notices.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use stampcard_core::UserId;

/// Session-stored identity.
///
/// Set after a successful sign-in. The role is not stored here; it is
/// resolved from the user record on every gated request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentIdentity {
    /// Identity provider uid.
    pub uid: UserId,
    /// Email used to sign in.
    pub email: String,
}

/// Session keys.
pub mod keys {
    /// Key for storing the signed-in identity.
    pub const CURRENT_IDENTITY: &str = "current_identity";

    /// Key for the pending one-shot notice.
    pub const FLASH: &str = "flash";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

/// A notice shown once on the next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// CSS modifier for the notice banner.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "notice notice-success",
            FlashKind::Error => "notice notice-error",
        }
    }

    /// Store a notice for the next page. Failures are logged and dropped.
    pub async fn push(self, session: &Session) {
        if let Err(e) = session.insert(keys::FLASH, self).await {
            tracing::warn!(error = %e, "Failed to store flash message");
        }
    }

    /// Take the pending notice, if any.
    pub async fn take(session: &Session) -> Option<Self> {
        session.remove::<Self>(keys::FLASH).await.ok().flatten()
    }
}

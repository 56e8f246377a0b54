//! Validation of the admin "create business" form.
//!
//! Rules run in a fixed order and the first failure wins. Nothing here
//! touches the network; a form that fails validation never reaches the store
//! or the loyalty backend.

use serde::Deserialize;

use crate::models::{DEFAULT_BRAND_COLOR, NewBusiness};
use crate::types::{Email, EmailError, PassTypeIdentifier, PassTypeIdentifierError};

/// Raw form submission as posted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub goal_stamps: String,
    #[serde(default)]
    pub promo_message: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub pass_type_identifier: String,
    #[serde(default)]
    pub team_identifier: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// First rule a [`BusinessForm`] failed.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BusinessFormError {
    #[error("Business name is required.")]
    MissingName,
    #[error("Reward goal must be a positive whole number.")]
    InvalidGoal,
    #[error("Pass Type Identifier must start with \"pass.\" followed by a reverse domain.")]
    InvalidPassType(#[source] PassTypeIdentifierError),
    #[error("Team identifier is required.")]
    MissingTeamId,
    #[error("Business login email is required.")]
    MissingEmail,
    #[error("Business login email is not a valid email address.")]
    InvalidEmail(#[source] EmailError),
    #[error("The loyalty service URL is not configured.")]
    BackendNotConfigured,
}

/// A form that passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBusinessForm {
    pub business: NewBusiness,
    pub login_email: Email,
    /// Temporary password typed by the admin, if any.
    pub password: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_owned())
}

impl BusinessForm {
    /// Validate the form.
    ///
    /// Order: name, reward goal, pass-type identifier, team identifier, login
    /// email presence, login email format, backend configured.
    ///
    /// # Errors
    ///
    /// Returns the first [`BusinessFormError`] encountered.
    pub fn validate(&self, backend_configured: bool) -> Result<ValidBusinessForm, BusinessFormError> {
        let name = non_empty(&self.name).ok_or(BusinessFormError::MissingName)?;

        let goal_stamps = self
            .goal_stamps
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|g| *g > 0)
            .ok_or(BusinessFormError::InvalidGoal)?;

        let pass_type_identifier = PassTypeIdentifier::parse(&self.pass_type_identifier)
            .map_err(BusinessFormError::InvalidPassType)?;

        let team_identifier =
            non_empty(&self.team_identifier).ok_or(BusinessFormError::MissingTeamId)?;

        let email = non_empty(&self.email).ok_or(BusinessFormError::MissingEmail)?;
        let login_email = Email::parse(&email).map_err(BusinessFormError::InvalidEmail)?;

        if !backend_configured {
            return Err(BusinessFormError::BackendNotConfigured);
        }

        Ok(ValidBusinessForm {
            business: NewBusiness {
                name,
                color: non_empty(&self.color).unwrap_or_else(|| DEFAULT_BRAND_COLOR.to_owned()),
                goal_stamps,
                promo_message: non_empty(&self.promo_message),
                logo_url: non_empty(&self.logo_url),
                pass_type_identifier,
                team_identifier,
            },
            login_email,
            password: non_empty(&self.password),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_form() -> BusinessForm {
        BusinessForm {
            name: "Kess Coffee".to_owned(),
            color: String::new(),
            goal_stamps: "8".to_owned(),
            promo_message: "Buy 8 get 1 free".to_owned(),
            logo_url: String::new(),
            pass_type_identifier: "pass.com.kess.loyalty".to_owned(),
            team_identifier: "ABCDE12345".to_owned(),
            email: "owner@kess.example".to_owned(),
            password: String::new(),
        }
    }

    #[test]
    fn test_valid_form_applies_defaults() {
        let valid = valid_form().validate(true).unwrap();
        assert_eq!(valid.business.color, DEFAULT_BRAND_COLOR);
        assert_eq!(valid.business.goal_stamps, 8);
        assert_eq!(valid.business.logo_url, None);
        assert_eq!(valid.password, None);
        assert_eq!(valid.login_email.as_str(), "owner@kess.example");
    }

    #[test]
    fn test_bad_pass_type_blocks() {
        let mut form = valid_form();
        form.pass_type_identifier = "com.brand.loyalty".to_owned();
        assert_eq!(
            form.validate(true),
            Err(BusinessFormError::InvalidPassType(
                PassTypeIdentifierError::MissingPrefix
            ))
        );
    }

    #[test]
    fn test_goal_must_be_positive_integer() {
        for goal in ["", "0", "-3", "2.5", "ten"] {
            let mut form = valid_form();
            form.goal_stamps = goal.to_owned();
            assert_eq!(form.validate(true), Err(BusinessFormError::InvalidGoal), "{goal}");
        }
    }

    #[test]
    fn test_first_failure_wins() {
        let mut form = valid_form();
        form.name = "  ".to_owned();
        form.pass_type_identifier = "nope".to_owned();
        form.email = String::new();
        assert_eq!(form.validate(false), Err(BusinessFormError::MissingName));

        form.name = "Kess".to_owned();
        assert!(matches!(
            form.validate(false),
            Err(BusinessFormError::InvalidPassType(_))
        ));

        form.pass_type_identifier = "pass.x".to_owned();
        form.team_identifier = String::new();
        assert_eq!(form.validate(false), Err(BusinessFormError::MissingTeamId));

        form.team_identifier = "T".to_owned();
        assert_eq!(form.validate(false), Err(BusinessFormError::MissingEmail));

        form.email = "not-an-email".to_owned();
        assert!(matches!(
            form.validate(false),
            Err(BusinessFormError::InvalidEmail(_))
        ));

        form.email = "a@b.co".to_owned();
        assert_eq!(form.validate(false), Err(BusinessFormError::BackendNotConfigured));
        assert!(form.validate(true).is_ok());
    }
}

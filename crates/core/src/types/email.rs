//! Login email for a business account.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an address was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email cannot contain spaces")]
    Whitespace,
    #[error("email must look like name@domain")]
    Shape,
}

/// An email address that is at least `name@domain` shaped.
///
/// Surrounding whitespace is trimmed; casing is kept as typed. The loyalty
/// service receives the address exactly as stored here.
///
/// ```
/// use stampcard_core::Email;
///
/// assert_eq!(Email::parse(" owner@kess.example ").unwrap().as_str(), "owner@kess.example");
/// assert!(Email::parse("owner").is_err());
/// assert!(Email::parse("owner@").is_err());
/// assert!(Email::parse("o wner@kess.example").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Parse a typed-in address.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] that applies.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }
        match s.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(s.to_owned()))
            }
            _ => Err(EmailError::Shape),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        for ok in ["owner@kess.example", "a+loyalty@b.co", "Owner@Kess.Example"] {
            assert_eq!(Email::parse(ok).unwrap().as_str(), ok);
        }
    }

    #[test]
    fn test_trims_but_keeps_case() {
        let email = Email::parse("  Owner@Kess.Example\n").unwrap();
        assert_eq!(email.to_string(), "Owner@Kess.Example");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("owner kess@x.y"), Err(EmailError::Whitespace));
        assert_eq!(Email::parse("owner"), Err(EmailError::Shape));
        assert_eq!(Email::parse("@kess.example"), Err(EmailError::Shape));
        assert_eq!(Email::parse("owner@"), Err(EmailError::Shape));
        assert_eq!(Email::parse("a@b@c"), Err(EmailError::Shape));
        let long = format!("{}@kess.example", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong { max: 254 }));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Email>("\"owner@kess.example\"").is_ok());
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
    }
}

//! Apple Wallet pass-type identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Required prefix of every pass-type identifier.
pub const PASS_TYPE_PREFIX: &str = "pass.";

/// Errors that can occur when parsing a [`PassTypeIdentifier`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PassTypeIdentifierError {
    /// The identifier does not start with `pass.`.
    #[error("pass type identifier must start with \"pass.\"")]
    MissingPrefix,
    /// Nothing follows the `pass.` prefix.
    #[error("pass type identifier needs a reverse-domain after \"pass.\"")]
    EmptyDomain,
    /// The identifier contains whitespace.
    #[error("pass type identifier cannot contain whitespace")]
    Whitespace,
}

/// A pass-type identifier of the form `pass.<reverse-domain>`.
///
/// Opaque to this application; the pass-generation service uses it together
/// with the team identifier to sign wallet passes.
///
/// ```
/// use stampcard_core::PassTypeIdentifier;
///
/// assert!(PassTypeIdentifier::parse("pass.com.kess.loyalty").is_ok());
/// assert!(PassTypeIdentifier::parse("com.brand.loyalty").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PassTypeIdentifier(String);

impl PassTypeIdentifier {
    /// Parse a pass-type identifier, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not start with `pass.`, has nothing
    /// after the prefix, or contains inner whitespace.
    pub fn parse(s: &str) -> Result<Self, PassTypeIdentifierError> {
        let s = s.trim();
        let rest = s
            .strip_prefix(PASS_TYPE_PREFIX)
            .ok_or(PassTypeIdentifierError::MissingPrefix)?;
        if rest.is_empty() {
            return Err(PassTypeIdentifierError::EmptyDomain);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(PassTypeIdentifierError::Whitespace);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PassTypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

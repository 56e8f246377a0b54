//! Newtype IDs for type-safe document references.
//!
//! Document ids are assigned by the store (or by the identity provider for
//! users) and are opaque strings. Use the `define_id!` macro to create
//! wrappers that prevent accidentally mixing ids from different collections.

use thiserror::Error;

/// Maximum accepted id length.
pub const MAX_ID_LENGTH: usize = 128;

/// Errors that can occur when parsing an id from untrusted input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("id must be at most {MAX_ID_LENGTH} characters")]
    TooLong,
    /// The input contains a character outside `[A-Za-z0-9_-]`.
    #[error("id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Validate an id taken from a URL or form.
///
/// Only ASCII alphanumerics, `_` and `-` are accepted, which keeps ids safe to
/// splice into document paths.
///
/// # Errors
///
/// Returns an [`IdError`] if the input is empty, too long, or contains a
/// character outside the allowed set.
pub fn validate_id(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_ID_LENGTH {
        return Err(IdError::TooLong);
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(IdError::InvalidChar(c));
    }
    Ok(())
}

/// Macro to define a type-safe document id wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `new()` for trusted values, `parse()` for untrusted input
/// - `as_str()`, `Display` and `AsRef<str>`
///
/// # Example
///
/// ```rust
/// # use stampcard_core::define_id;
/// define_id!(StoreId);
/// define_id!(CardId);
///
/// let store_id = StoreId::new("abc");
/// let card_id = CardId::new("abc");
///
/// // These are different types, so this won't compile:
/// // let _: StoreId = card_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a trusted id (e.g. one returned by the store).
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse an id from untrusted input.
            ///
            /// # Errors
            ///
            /// Returns an error if the id is empty, too long or contains
            /// characters outside `[A-Za-z0-9_-]`.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                $crate::types::id::validate_id(s)?;
                Ok(Self(s.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard document ids
define_id!(UserId);
define_id!(BusinessId);
define_id!(CustomerId);
define_id!(EventId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_assigned_id() {
        let id = BusinessId::parse("memHPZaG9XfaYNSTcJzP").unwrap();
        assert_eq!(id.as_str(), "memHPZaG9XfaYNSTcJzP");
        assert_eq!(id.to_string(), "memHPZaG9XfaYNSTcJzP");
    }

    #[test]
    fn test_parse_rejects_path_segments() {
        assert_eq!(
            BusinessId::parse("../users"),
            Err(IdError::InvalidChar('.'))
        );
        assert_eq!(BusinessId::parse("a/b"), Err(IdError::InvalidChar('/')));
    }

    #[test]
    fn test_parse_empty_and_long() {
        assert_eq!(CustomerId::parse(""), Err(IdError::Empty));
        assert_eq!(
            CustomerId::parse(&"a".repeat(MAX_ID_LENGTH + 1)),
            Err(IdError::TooLong)
        );
    }

    #[test]
    fn test_serde_transparent() {
        let id = UserId::new("uid_123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"uid_123\"");
    }
}

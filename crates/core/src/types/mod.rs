//! Core types for Stampcard.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod pass;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use pass::{PassTypeIdentifier, PassTypeIdentifierError};
pub use role::{Role, RoleParseError};

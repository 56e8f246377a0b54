//! Session-scoped models for the web service.
//!
//! Stored documents (businesses, customers, users, events) live in
//! `stampcard_core::models`; this module only holds what the session carries.

pub mod session;

pub use session::{CurrentIdentity, Flash, FlashKind, keys as session_keys};

//! Stampcard Core - Shared domain types and logic.
//!
//! This crate provides the types used across all Stampcard components:
//! - `web` - Admin, business and public enrollment web service
//! - `cli` - Command-line tools for bootstrapping user records
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no document
//! store access, no HTTP clients. Everything here is deterministic and can be
//! unit tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, roles and pass identifiers
//! - [`models`] - Businesses, customers, user records and activity events
//! - [`validation`] - Admin "create business" form validation
//! - [`search`] - Local case-insensitive filtering
//! - [`links`] - Join, pass and stamp URL builders
//! - [`roster`] - Live customer list with optimistic stamp reconciliation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod links;
pub mod models;
pub mod roster;
pub mod search;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;

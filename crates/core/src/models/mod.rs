//! Domain records stored in the document database.
//!
//! These are validated, typed views of the `users`, `businesses`,
//! `customers` and `events` collections. Mapping to and from store fields
//! lives in the web crate's repositories.

pub mod business;
pub mod customer;
pub mod event;
pub mod user;

pub use business::{Business, DEFAULT_BRAND_COLOR, DEFAULT_GOAL_STAMPS, NewBusiness};
pub use customer::{Customer, NewCustomer};
pub use event::{ActivityEvent, EventKind};
pub use user::UserRecord;

//! External collaborators and the logic built on them.
//!
//! # Services
//!
//! - `store` - Document store trait, Firestore and in-memory impls, live queries
//! - `identity` - Password sign-in (Firebase Authentication, in-memory)
//! - `backend` - Loyalty (pass-generation) service client
//! - `roles` - Cached role lookup for the session gate
//! - `directory` - Live business and customer directories, stamp issuance
//! - `onboarding` - Business creation and login provisioning
//! - `enrollment` - Public customer enrollment
//! - `qr` - QR code rendering

pub mod backend;
pub mod directory;
pub mod enrollment;
pub mod identity;
pub mod onboarding;
pub mod qr;
pub mod roles;
pub mod store;

pub use backend::{BackendError, HttpBackend, LoyaltyBackend};
pub use directory::{
    BusinessDirectory, CustomerDirectory, CustomerView, DirectoryError, DirectoryRegistry,
    StampOutcome,
};
pub use enrollment::{Enrolled, EnrollmentError, EnrollmentForm, SubmissionGuard};
pub use identity::{Identity, IdentityError, IdentityProvider};
pub use onboarding::{Onboarded, OnboardingError};
pub use roles::{RoleCache, RoleLookup};
pub use store::{DocumentStore, StoreError};
